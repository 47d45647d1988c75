use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

use crate::error::{GridError, SyncError};
use crate::workbook::lock::{self, RELEASE_TIMEOUT, WorkbookLock};
use crate::workbook::{CellValue, Workbook, WorkbookBackend};

/// Sparse sheet: row -> column -> value. Empty cells are absent.
pub type SheetCells = BTreeMap<u32, BTreeMap<u32, CellValue>>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkbookDocument {
    #[serde(default)]
    pub sheets: BTreeMap<String, SheetCells>,
}

pub fn read_document(path: &Path) -> Result<WorkbookDocument> {
    if !path.exists() {
        return Err(SyncError::WorkbookMissing(path.display().to_string()).into());
    }
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let parsed = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(parsed)
}

/// Write via a temp file in the same directory and rename over the target.
pub fn write_document(path: &Path, doc: &WorkbookDocument) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;
    let data = serde_json::to_string_pretty(doc)?;
    let mut tmp = NamedTempFile::new_in(&parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
    tmp.write_all(data.as_bytes())?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

pub fn file_digest(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Create a workbook holding `sheet` with `headers` on `header_row`.
pub fn create_workbook(
    path: &Path,
    sheet: &str,
    header_row: Option<u32>,
    headers: &[&str],
    force: bool,
) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "workbook already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    let mut cells = SheetCells::new();
    if let Some(row) = header_row {
        let header = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (idx as u32 + 1, CellValue::text(*name)))
            .collect();
        cells.insert(row, header);
    }
    let mut doc = WorkbookDocument::default();
    doc.sheets.insert(sheet.to_string(), cells);
    write_document(path, &doc)
}

#[derive(Debug, Clone)]
pub struct JsonWorkbookBackend {
    path: PathBuf,
    sheet: String,
    host_process: Option<String>,
    release_timeout: Duration,
}

impl JsonWorkbookBackend {
    pub fn new(path: impl Into<PathBuf>, sheet: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sheet: sheet.into(),
            host_process: None,
            release_timeout: RELEASE_TIMEOUT,
        }
    }

    pub fn with_host_process(mut self, name: Option<String>) -> Self {
        self.host_process = name;
        self
    }

    fn lock_path(&self) -> PathBuf {
        lock::lock_path_for(&self.path)
    }
}

impl WorkbookBackend for JsonWorkbookBackend {
    type Book = JsonWorkbook;

    fn force_release(&mut self) -> Result<()> {
        lock::force_release(
            &self.lock_path(),
            self.host_process.as_deref(),
            self.release_timeout,
        )?;
        Ok(())
    }

    fn open(&mut self) -> Result<JsonWorkbook> {
        if !self.path.exists() {
            return Err(SyncError::WorkbookMissing(self.path.display().to_string()).into());
        }
        let held = WorkbookLock::acquire(&self.lock_path())?;
        let doc = match read_document(&self.path) {
            Ok(doc) => doc,
            Err(err) => {
                let _ = held.release();
                return Err(err);
            }
        };
        if !doc.sheets.contains_key(&self.sheet) {
            let _ = held.release();
            return Err(SyncError::SheetMissing(self.sheet.clone()).into());
        }
        Ok(JsonWorkbook {
            path: self.path.clone(),
            sheet: self.sheet.clone(),
            doc,
            lock: Some(held),
            dirty: false,
        })
    }
}

/// Busy or interrupted file I/O may clear on its own; anything else is permanent.
fn save_error(err: anyhow::Error) -> GridError {
    let transient = err
        .chain()
        .filter_map(|cause| cause.downcast_ref::<std::io::Error>())
        .any(|io| {
            matches!(
                io.kind(),
                ErrorKind::Interrupted
                    | ErrorKind::WouldBlock
                    | ErrorKind::TimedOut
                    | ErrorKind::ResourceBusy
            )
        });
    if transient {
        GridError::Transient(format!("{err:#}"))
    } else {
        GridError::Backend(format!("{err:#}"))
    }
}

#[derive(Debug)]
pub struct JsonWorkbook {
    path: PathBuf,
    sheet: String,
    doc: WorkbookDocument,
    lock: Option<WorkbookLock>,
    dirty: bool,
}

impl JsonWorkbook {
    fn cells(&self) -> Result<&SheetCells, GridError> {
        if self.lock.is_none() {
            return Err(GridError::Backend("workbook is closed".to_string()));
        }
        self.doc
            .sheets
            .get(&self.sheet)
            .ok_or_else(|| GridError::Backend(format!("sheet `{}` disappeared", self.sheet)))
    }

    fn cells_mut(&mut self) -> Result<&mut SheetCells, GridError> {
        if self.lock.is_none() {
            return Err(GridError::Backend("workbook is closed".to_string()));
        }
        let sheet = &self.sheet;
        self.doc
            .sheets
            .get_mut(sheet)
            .ok_or_else(|| GridError::Backend(format!("sheet `{sheet}` disappeared")))
    }
}

impl Workbook for JsonWorkbook {
    fn get_cell(&mut self, row: u32, col: u32) -> Result<CellValue, GridError> {
        Ok(self
            .cells()?
            .get(&row)
            .and_then(|cols| cols.get(&col))
            .cloned()
            .unwrap_or_default())
    }

    fn set_cell(&mut self, row: u32, col: u32, value: CellValue) -> Result<(), GridError> {
        let cells = self.cells_mut()?;
        if value == CellValue::Empty {
            if let Some(cols) = cells.get_mut(&row) {
                cols.remove(&col);
                if cols.is_empty() {
                    cells.remove(&row);
                }
            }
        } else {
            cells.entry(row).or_default().insert(col, value);
        }
        self.dirty = true;
        Ok(())
    }

    fn save(&mut self) -> Result<(), GridError> {
        if self.lock.is_none() {
            return Err(GridError::Backend("workbook is closed".to_string()));
        }
        write_document(&self.path, &self.doc).map_err(save_error)?;
        self.dirty = false;
        Ok(())
    }

    fn close(&mut self, commit: bool) -> Result<(), GridError> {
        if commit && self.dirty {
            self.save()?;
        }
        let Some(held) = self.lock.take() else {
            return Ok(());
        };
        held.release()
            .map_err(|err| GridError::Backend(format!("{err:#}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fixture(root: &Path) -> PathBuf {
        let path = root.join("book.json");
        create_workbook(&path, "Data", Some(4), &["Date", "P1", "P2", "P3", "Session"], false)
            .expect("create workbook");
        path
    }

    #[test]
    fn saved_cells_survive_reopen() {
        let tmp = tempdir().expect("tempdir");
        let path = fixture(tmp.path());
        let mut backend = JsonWorkbookBackend::new(&path, "Data");

        let mut book = backend.open().expect("open");
        book.set_cell(5, 1, CellValue::Number(45658.0)).expect("set date");
        book.set_cell(5, 5, CellValue::text("Mid")).expect("set session");
        book.save().expect("save");
        book.close(true).expect("close");

        let mut book = backend.open().expect("reopen");
        assert_eq!(book.get_cell(5, 1).expect("get"), CellValue::Number(45658.0));
        assert_eq!(book.get_cell(5, 5).expect("get"), CellValue::text("Mid"));
        assert_eq!(book.get_cell(4, 1).expect("get"), CellValue::text("Date"));
        assert_eq!(book.get_cell(6, 1).expect("get"), CellValue::Empty);
        book.close(false).expect("close");
    }

    #[test]
    fn close_without_commit_discards_unsaved_changes() {
        let tmp = tempdir().expect("tempdir");
        let path = fixture(tmp.path());
        let before = file_digest(&path).expect("digest");
        let mut backend = JsonWorkbookBackend::new(&path, "Data");

        let mut book = backend.open().expect("open");
        book.set_cell(5, 1, CellValue::text("01/01/2025")).expect("set");
        book.close(false).expect("close");

        assert_eq!(file_digest(&path).expect("digest"), before);
        assert!(!lock::lock_path_for(&path).exists());
    }

    #[test]
    fn open_holds_the_lock_until_close() {
        let tmp = tempdir().expect("tempdir");
        let path = fixture(tmp.path());
        let mut backend = JsonWorkbookBackend::new(&path, "Data");

        let mut book = backend.open().expect("open");
        assert!(backend.open().is_err());
        book.close(false).expect("close");
        assert!(book.get_cell(5, 1).is_err());
        backend.open().expect("reopen").close(false).expect("close");
    }

    #[test]
    fn missing_workbook_and_sheet_are_typed_errors() {
        let tmp = tempdir().expect("tempdir");
        let err = JsonWorkbookBackend::new(tmp.path().join("nope.json"), "Data")
            .open()
            .expect_err("missing");
        assert!(matches!(
            err.downcast_ref::<SyncError>(),
            Some(SyncError::WorkbookMissing(_))
        ));

        let path = fixture(tmp.path());
        let err = JsonWorkbookBackend::new(&path, "Other")
            .open()
            .expect_err("missing sheet");
        assert!(matches!(
            err.downcast_ref::<SyncError>(),
            Some(SyncError::SheetMissing(_))
        ));
        assert!(!lock::lock_path_for(&path).exists());
    }

    #[test]
    fn busy_file_errors_are_transient() {
        let busy = anyhow::Error::new(std::io::Error::from(ErrorKind::ResourceBusy))
            .context("failed to replace book.json");
        assert!(save_error(busy).is_transient());

        let denied = anyhow::Error::new(std::io::Error::from(ErrorKind::PermissionDenied));
        assert!(!save_error(denied).is_transient());
    }

    #[test]
    fn create_refuses_to_overwrite_without_force() {
        let tmp = tempdir().expect("tempdir");
        let path = fixture(tmp.path());
        assert!(create_workbook(&path, "Data", None, &[], false).is_err());
        create_workbook(&path, "Data", None, &[], true).expect("force");
        let doc = read_document(&path).expect("read");
        assert!(doc.sheets["Data"].is_empty());
    }
}
