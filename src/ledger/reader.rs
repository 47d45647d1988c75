use crate::error::SyncError;
use crate::ledger::dates::cell_date_text;
use crate::ledger::record::StoredRow;
use crate::ledger::retry::RetryPolicy;
use crate::workbook::Workbook;

/// Where the table lives in the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLayout {
    /// First data row (1-based); the newest record sits here.
    pub start_row: u32,
    /// Scan bound: a table longer than this is reported instead of read forever.
    pub max_rows: u32,
}

impl Default for TableLayout {
    fn default() -> Self {
        Self {
            start_row: 5,
            max_rows: 1_000_000,
        }
    }
}

impl TableLayout {
    /// Absolute row of the zero-based table index `idx`.
    pub fn row_at(&self, idx: usize) -> Result<u32, SyncError> {
        offset_row(self.start_row, idx)
    }
}

/// `base + offset` as a row number, or `RowOutOfRange` when it does not fit.
pub fn offset_row(base: u32, offset: usize) -> Result<u32, SyncError> {
    u32::try_from(offset)
        .ok()
        .and_then(|offset| base.checked_add(offset))
        .ok_or(SyncError::RowOutOfRange { base, offset })
}

#[derive(Debug, Clone, Default)]
pub struct TableSnapshot {
    pub rows: Vec<StoredRow>,
}

impl TableSnapshot {
    pub fn count(&self) -> usize {
        self.rows.len()
    }

    pub fn newest(&self) -> Option<&StoredRow> {
        self.rows.first()
    }
}

/// Scan from `start_row` down to the first row whose date cell is blank.
pub fn read_table<W: Workbook + ?Sized>(
    book: &mut W,
    layout: &TableLayout,
    retry: &RetryPolicy,
) -> Result<TableSnapshot, SyncError> {
    let mut rows = Vec::new();
    loop {
        if rows.len() as u64 >= u64::from(layout.max_rows) {
            return Err(SyncError::TableTooLong {
                max_rows: layout.max_rows,
            });
        }
        let row = layout.row_at(rows.len())?;
        let first = retry.get_cell(book, row, 1)?;
        if first.is_blank() {
            break;
        }
        let mut text = |col: u32| -> Result<String, SyncError> {
            Ok(retry.get_cell(book, row, col)?.display_text())
        };
        rows.push(StoredRow {
            date: cell_date_text(&first),
            p1: text(2)?,
            p2: text(3)?,
            p3: text(4)?,
            session: text(5)?,
        });
    }
    Ok(TableSnapshot { rows })
}
