use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::ledger::merge::MergeOutcome;
use crate::ledger::paths::LedgerPaths;
use crate::ledger::util::now_epoch_secs;
use crate::logging::log;

const AUDIT_FILE: &str = "audit.log";

/// Row counts of one completed merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MergeCounts {
    pub existing: usize,
    pub candidates: usize,
    pub accepted: usize,
    pub shifted: usize,
    pub inserted: usize,
}

/// One line of `audit.log`. `at_epoch_secs` is stamped on append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    pub at_epoch_secs: u64,
    pub phase: &'static str,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<MergeCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workbook_sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditEvent {
    fn new(phase: &'static str, status: &'static str) -> Self {
        Self {
            at_epoch_secs: 0,
            phase,
            status,
            counts: None,
            workbook_sha256: None,
            reason: None,
        }
    }

    pub fn merged(outcome: &MergeOutcome, workbook_sha256: Option<String>) -> Self {
        Self {
            counts: Some(MergeCounts {
                existing: outcome.existing_count,
                candidates: outcome.candidates,
                accepted: outcome.accepted.len(),
                shifted: outcome.shifted_rows,
                inserted: outcome.inserted_rows,
            }),
            workbook_sha256,
            ..Self::new("merge", if outcome.noop { "noop" } else { "ok" })
        }
    }

    pub fn skipped(phase: &'static str, reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::new(phase, "skipped")
        }
    }

    pub fn failed(phase: &'static str, err: &anyhow::Error) -> Self {
        Self {
            reason: Some(format!("{err:#}")),
            ..Self::new(phase, "failed")
        }
    }
}

pub fn append_event(logs_dir: &Path, mut event: AuditEvent) -> Result<()> {
    fs::create_dir_all(logs_dir)
        .with_context(|| format!("failed to create {}", logs_dir.display()))?;
    event.at_epoch_secs = now_epoch_secs()?;

    let line = format!("{}\n", serde_json::to_string(&event)?);
    let path = logs_dir.join(AUDIT_FILE);
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.write_all(line.as_bytes())?;
    Ok(())
}

/// Audit without letting a log failure abort the run.
pub fn record(paths: &LedgerPaths, event: AuditEvent) {
    if let Err(err) = append_event(&paths.logs_dir, event) {
        log(format!("audit append failed: {err:#}"));
    }
}
