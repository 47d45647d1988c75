use std::thread;
use std::time::Duration;

use crate::error::{GridError, SyncError};
use crate::workbook::{CellValue, Workbook};

pub const DEFAULT_ATTEMPTS: u32 = 20;
pub const DEFAULT_DELAY: Duration = Duration::from_millis(200);

/// Bounded retry for single-cell backend calls.
///
/// Only [`GridError::Transient`] is retried; any other backend error is
/// returned immediately. Exhausting the budget yields
/// [`SyncError::RetryExhausted`], which the merge treats as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            delay: DEFAULT_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    pub fn run<T, F>(&self, op: &'static str, row: u32, col: u32, mut call: F) -> Result<T, SyncError>
    where
        F: FnMut() -> Result<T, GridError>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match call() {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_transient() => {
                    return Err(SyncError::Cell {
                        op,
                        row,
                        col,
                        source: err,
                    });
                }
                Err(err) if attempt >= attempts => {
                    return Err(SyncError::RetryExhausted {
                        op,
                        row,
                        col,
                        attempts,
                        last: err,
                    });
                }
                Err(_) => {
                    if !self.delay.is_zero() {
                        thread::sleep(self.delay);
                    }
                    attempt += 1;
                }
            }
        }
    }

    pub fn get_cell<W: Workbook + ?Sized>(
        &self,
        book: &mut W,
        row: u32,
        col: u32,
    ) -> Result<CellValue, SyncError> {
        self.run("read", row, col, || book.get_cell(row, col))
    }

    /// The single entry point for table mutations.
    pub fn set_cell<W: Workbook + ?Sized>(
        &self,
        book: &mut W,
        row: u32,
        col: u32,
        value: &CellValue,
    ) -> Result<(), SyncError> {
        self.run("write", row, col, || book.set_cell(row, col, value.clone()))
    }
}
