use anyhow::anyhow;
use std::str::FromStr;

use crate::error::SyncError;
use crate::ledger::reader::{TableLayout, offset_row};
use crate::ledger::record::COLUMNS;
use crate::ledger::retry::RetryPolicy;
use crate::logging::log;
use crate::workbook::{CellValue, Workbook};

/// What to do with a source row that stays unreadable after retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadFailurePolicy {
    /// Move five empty cells in its place and carry on. Lossy for that row.
    #[default]
    Blank,
    /// Stop the shift with [`SyncError::ShiftReadFailed`].
    Abort,
}

impl ReadFailurePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blank => "blank",
            Self::Abort => "abort",
        }
    }
}

impl FromStr for ReadFailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blank" => Ok(Self::Blank),
            "abort" => Ok(Self::Abort),
            other => Err(anyhow!(
                "invalid shift read failure policy `{other}`: use `blank` or `abort`"
            )),
        }
    }
}

fn read_source_row<W: Workbook + ?Sized>(
    book: &mut W,
    row: u32,
    retry: &RetryPolicy,
) -> Result<Vec<CellValue>, SyncError> {
    (1..=COLUMNS)
        .map(|col| retry.get_cell(book, row, col))
        .collect()
}

/// Move the `existing_count` table rows down by `num_new` rows.
///
/// Rows are handled bottom to top, one at a time: each source row is read
/// completely before its destination (`row + num_new`) is written, so no row is
/// overwritten before it has been copied. Only single-cell reads and retrying
/// single-cell writes are used. Returns the number of rows moved.
pub fn shift_down<W: Workbook + ?Sized>(
    book: &mut W,
    layout: &TableLayout,
    existing_count: usize,
    num_new: usize,
    retry: &RetryPolicy,
    on_read_failure: ReadFailurePolicy,
) -> Result<usize, SyncError> {
    if num_new == 0 || existing_count == 0 {
        return Ok(0);
    }
    log(format!("Shifting {existing_count} rows down by {num_new}..."));

    // The bottom destination is the largest row touched; check it before any write.
    offset_row(layout.row_at(existing_count - 1)?, num_new)?;
    for index in (0..existing_count).rev() {
        let src = layout.row_at(index)?;
        let dest = offset_row(src, num_new)?;

        let values = match read_source_row(book, src, retry) {
            Ok(values) => values,
            Err(err) => match on_read_failure {
                ReadFailurePolicy::Blank => {
                    log(format!(
                        "WARNING: row {src} unreadable ({err}); moving blanks to row {dest}"
                    ));
                    vec![CellValue::Empty; COLUMNS as usize]
                }
                ReadFailurePolicy::Abort => {
                    return Err(SyncError::ShiftReadFailed {
                        row: src,
                        reason: err.to_string(),
                    });
                }
            },
        };

        for (col, value) in (1..=COLUMNS).zip(&values) {
            retry.set_cell(book, dest, col, value)?;
        }
    }

    log("Shift complete.");
    Ok(existing_count)
}
