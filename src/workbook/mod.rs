pub mod json;
pub mod lock;
#[cfg(test)]
pub mod memory;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::GridError;

/// Contents of one cell as the backend stores it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) => false,
        }
    }

    /// Trimmed display text; integral numbers render without a fraction.
    pub fn display_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.trim().to_string(),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Self::Number(n) => n.to_string(),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// An opened, exclusively held grid document addressed by 1-based row and column.
pub trait Workbook {
    fn get_cell(&mut self, row: u32, col: u32) -> Result<CellValue, GridError>;
    fn set_cell(&mut self, row: u32, col: u32, value: CellValue) -> Result<(), GridError>;
    fn save(&mut self) -> Result<(), GridError>;
    /// Release the document; `commit = false` discards anything not yet saved.
    fn close(&mut self, commit: bool) -> Result<(), GridError>;
}

pub trait WorkbookBackend {
    type Book: Workbook;

    /// Clear any stale holder of the document so `open` can take exclusive ownership.
    fn force_release(&mut self) -> Result<()>;
    fn open(&mut self) -> Result<Self::Book>;
}

#[cfg(test)]
mod tests {
    use super::CellValue;

    #[test]
    fn untagged_json_forms() {
        let cells: Vec<CellValue> =
            serde_json::from_str(r#"[null, 45658, "Mid", 7.5]"#).expect("parse cells");
        assert_eq!(
            cells,
            vec![
                CellValue::Empty,
                CellValue::Number(45658.0),
                CellValue::text("Mid"),
                CellValue::Number(7.5),
            ]
        );
    }

    #[test]
    fn display_text_drops_integral_fraction() {
        assert_eq!(CellValue::Number(7.0).display_text(), "7");
        assert_eq!(CellValue::Number(7.5).display_text(), "7.5");
        assert_eq!(CellValue::text("  3 ").display_text(), "3");
        assert!(CellValue::text("   ").is_blank());
        assert!(!CellValue::Number(0.0).is_blank());
    }
}
