//! In-memory workbook for tests: records every cell access and can inject failures.

use anyhow::Result;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::error::GridError;
use crate::workbook::{CellValue, Workbook, WorkbookBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridOp {
    Read(u32, u32),
    Write(u32, u32),
}

#[derive(Debug, Default)]
pub struct GridState {
    pub cells: BTreeMap<(u32, u32), CellValue>,
    pub saved: Option<BTreeMap<(u32, u32), CellValue>>,
    pub ops: Vec<GridOp>,
    /// Remaining transient failures per cell for writes.
    pub write_failures: BTreeMap<(u32, u32), u32>,
    /// Rows whose reads always fail transiently.
    pub unreadable_rows: BTreeSet<u32>,
    pub opens: u32,
    pub releases: u32,
    pub saves: u32,
    pub closes: Vec<bool>,
}

impl GridState {
    pub fn with_rows(start_row: u32, rows: &[[&str; 5]]) -> Self {
        let mut state = Self::default();
        for (idx, row) in rows.iter().enumerate() {
            for (col, value) in row.iter().enumerate() {
                state.cells.insert(
                    (start_row + idx as u32, col as u32 + 1),
                    CellValue::text(*value),
                );
            }
        }
        state
    }

    pub fn row_text(&self, row: u32) -> [String; 5] {
        std::array::from_fn(|idx| {
            self.cells
                .get(&(row, idx as u32 + 1))
                .map(CellValue::display_text)
                .unwrap_or_default()
        })
    }

    pub fn writes(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, GridOp::Write(..)))
            .count()
    }
}

pub type SharedGrid = Rc<RefCell<GridState>>;

pub fn shared(state: GridState) -> SharedGrid {
    Rc::new(RefCell::new(state))
}

#[derive(Debug, Clone)]
pub struct MemoryBook {
    state: SharedGrid,
}

impl MemoryBook {
    pub fn new(state: SharedGrid) -> Self {
        Self { state }
    }
}

impl Workbook for MemoryBook {
    fn get_cell(&mut self, row: u32, col: u32) -> Result<CellValue, GridError> {
        let mut state = self.state.borrow_mut();
        if state.unreadable_rows.contains(&row) {
            return Err(GridError::Transient(format!("row {row} is locked")));
        }
        state.ops.push(GridOp::Read(row, col));
        Ok(state.cells.get(&(row, col)).cloned().unwrap_or_default())
    }

    fn set_cell(&mut self, row: u32, col: u32, value: CellValue) -> Result<(), GridError> {
        let mut state = self.state.borrow_mut();
        if let Some(remaining) = state.write_failures.get_mut(&(row, col))
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(GridError::Transient(format!("cell {row},{col} busy")));
        }
        state.ops.push(GridOp::Write(row, col));
        if value == CellValue::Empty {
            state.cells.remove(&(row, col));
        } else {
            state.cells.insert((row, col), value);
        }
        Ok(())
    }

    fn save(&mut self) -> Result<(), GridError> {
        let mut state = self.state.borrow_mut();
        state.saves += 1;
        state.saved = Some(state.cells.clone());
        Ok(())
    }

    fn close(&mut self, commit: bool) -> Result<(), GridError> {
        self.state.borrow_mut().closes.push(commit);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MemoryBackend {
    pub state: SharedGrid,
}

impl MemoryBackend {
    pub fn new(state: GridState) -> Self {
        Self {
            state: shared(state),
        }
    }
}

impl WorkbookBackend for MemoryBackend {
    type Book = MemoryBook;

    fn force_release(&mut self) -> Result<()> {
        self.state.borrow_mut().releases += 1;
        Ok(())
    }

    fn open(&mut self) -> Result<MemoryBook> {
        self.state.borrow_mut().opens += 1;
        Ok(MemoryBook::new(self.state.clone()))
    }
}
