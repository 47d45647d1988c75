use chrono::{Days, NaiveDate};

use crate::workbook::CellValue;

pub const CANONICAL_FORMAT: &str = "%m/%d/%Y";

/// Day 0 of the spreadsheet serial-date convention.
fn serial_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or(NaiveDate::MIN)
}

/// Serial day number (fraction = time of day) to a calendar date.
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() {
        return None;
    }
    let days = serial.floor();
    if days.abs() > 3_000_000.0 {
        return None;
    }
    let epoch = serial_epoch();
    if days >= 0.0 {
        epoch.checked_add_days(Days::new(days as u64))
    } else {
        epoch.checked_sub_days(Days::new((-days) as u64))
    }
}

fn parse_text_date(raw: &str) -> Option<NaiveDate> {
    let four_digit_year = raw.rsplit('/').next().is_some_and(|year| year.len() == 4);
    if four_digit_year && let Ok(date) = NaiveDate::parse_from_str(raw, CANONICAL_FORMAT) {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    // ISO timestamps such as 2025-01-01T21:00:00Z.
    raw.get(..10)
        .filter(|_| raw.as_bytes().get(10) == Some(&b'T') || raw.as_bytes().get(10) == Some(&b' '))
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

/// Canonical `MM/DD/YYYY` text for a textual date; unrecognized text is returned trimmed.
pub fn canonical_date_text(raw: &str) -> String {
    let trimmed = raw.trim();
    match parse_text_date(trimmed) {
        Some(date) => date.format(CANONICAL_FORMAT).to_string(),
        None => trimmed.to_string(),
    }
}

/// Date column normalization at the storage boundary: serial numbers and text
/// both come out as canonical text.
pub fn cell_date_text(value: &CellValue) -> String {
    match value {
        CellValue::Empty => String::new(),
        CellValue::Number(serial) => serial_to_date(*serial)
            .map(|date| date.format(CANONICAL_FORMAT).to_string())
            .unwrap_or_else(|| value.display_text()),
        CellValue::Text(text) => canonical_date_text(text),
    }
}
