use serde::Serialize;
use std::fmt;

use crate::workbook::CellValue;

/// Columns A..E: date, p1, p2, p3, session.
pub const COLUMNS: u32 = 5;
pub const HEADERS: [&str; COLUMNS as usize] = ["Date", "P1", "P2", "P3", "Session"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Session {
    Mid,
    Eve,
}

impl Session {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mid => "Mid",
            Self::Eve => "Eve",
        }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// (date, session): at most one row per key in the table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NaturalKey {
    pub date: String,
    pub session: String,
}

/// A candidate draw produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub date: String,
    pub p1: String,
    pub p2: String,
    pub p3: String,
    pub session: Session,
}

impl Record {
    pub fn key(&self) -> NaturalKey {
        NaturalKey {
            date: self.date.clone(),
            session: self.session.as_str().to_string(),
        }
    }

    pub fn cells(&self) -> [CellValue; COLUMNS as usize] {
        [
            CellValue::text(self.date.as_str()),
            CellValue::text(self.p1.as_str()),
            CellValue::text(self.p2.as_str()),
            CellValue::text(self.p3.as_str()),
            CellValue::text(self.session.as_str()),
        ]
    }
}

/// A row already in the table, as text. The session column is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredRow {
    pub date: String,
    pub p1: String,
    pub p2: String,
    pub p3: String,
    pub session: String,
}

impl StoredRow {
    pub fn key(&self) -> NaturalKey {
        NaturalKey {
            date: self.date.clone(),
            session: self.session.clone(),
        }
    }
}
