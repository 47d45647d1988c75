use thiserror::Error;

/// Failure reported by a workbook backend for a single cell or document operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GridError {
    /// The backend was busy or briefly unavailable; the same call may succeed later.
    #[error("transient backend error: {0}")]
    Transient(String),
    #[error("backend error: {0}")]
    Backend(String),
}

impl GridError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{op} at row {row}, column {col} failed after {attempts} attempts: {last}")]
    RetryExhausted {
        op: &'static str,
        row: u32,
        col: u32,
        attempts: u32,
        last: GridError,
    },
    #[error("{op} at row {row}, column {col} failed: {source}")]
    Cell {
        op: &'static str,
        row: u32,
        col: u32,
        #[source]
        source: GridError,
    },
    #[error("could not read source row {row} during shift: {reason}")]
    ShiftReadFailed { row: u32, reason: String },
    #[error("row {base} + {offset} is past the last addressable row")]
    RowOutOfRange { base: u32, offset: usize },
    #[error("table scan passed {max_rows} rows without reaching an empty row")]
    TableTooLong { max_rows: u32 },
    #[error("malformed payload: {0}")]
    Payload(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("secrets file invalid or unreadable: {0}")]
    SecretsInvalid(String),
    #[error("config file invalid or unreadable: {0}")]
    ConfigInvalid(String),
    #[error("workbook not found: {0}")]
    WorkbookMissing(String),
    #[error("sheet `{0}` not found in workbook")]
    SheetMissing(String),
}
