use crate::error::SyncError;
use crate::ledger::reader::TableLayout;
use crate::ledger::record::Record;
use crate::ledger::retry::RetryPolicy;
use crate::logging::log;
use crate::workbook::Workbook;

/// Write `records` into the top rows, first record at `start_row`, in the given order.
/// The rows must already have been vacated by the shift.
pub fn insert_top<W: Workbook + ?Sized>(
    book: &mut W,
    layout: &TableLayout,
    records: &[Record],
    retry: &RetryPolicy,
) -> Result<usize, SyncError> {
    log(format!("Inserting {} new row(s) at top...", records.len()));

    for (idx, record) in records.iter().enumerate() {
        let row = layout.row_at(idx)?;
        for (col, value) in (1..).zip(record.cells().iter()) {
            retry.set_cell(book, row, col, value)?;
        }
    }
    Ok(records.len())
}
