use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::SyncError;
use crate::ledger::retry::RetryPolicy;
use crate::ledger::shift::ReadFailurePolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub sheet: String,
    pub start_row: u32,
    pub max_rows: u32,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            sheet: "Data".to_string(),
            start_row: 5,
            max_rows: 1_000_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 20,
            delay_ms: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShiftConfig {
    pub read_failure: String,
}

impl Default for ShiftConfig {
    fn default() -> Self {
        Self {
            read_failure: "blank".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HostConfig {
    /// Process owning the workbook that must be terminated before it is opened.
    pub process_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractorCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Kill the extractor after this many seconds; unset waits indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LedgerConfig {
    pub table: TableConfig,
    pub retry: RetryConfig,
    pub shift: ShiftConfig,
    pub host: HostConfig,
    pub extractors: Vec<ExtractorCommand>,
}

impl LedgerConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.attempts,
            Duration::from_millis(self.retry.delay_ms),
        )
    }

    pub fn read_failure_policy(&self) -> Result<ReadFailurePolicy> {
        self.shift.read_failure.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialLedgerConfig {
    table: Option<TableConfig>,
    retry: Option<RetryConfig>,
    shift: Option<ShiftConfig>,
    host: Option<HostConfig>,
    extractors: Option<Vec<ExtractorCommand>>,
}

fn env_or_u32(var: &str, fallback: u32) -> u32 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u32>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_or_optional_string(var: &str, fallback: Option<String>) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => fallback,
    }
}

fn validate(cfg: &LedgerConfig) -> Result<()> {
    if cfg.table.sheet.trim().is_empty() {
        return Err(anyhow!("invalid table sheet: cannot be empty"));
    }
    if cfg.table.start_row == 0 {
        return Err(anyhow!("invalid table start row: rows are 1-based"));
    }
    if cfg.table.max_rows == 0 {
        return Err(anyhow!("invalid table max rows: must be >= 1"));
    }
    if u64::from(cfg.table.start_row) + u64::from(cfg.table.max_rows) > u64::from(u32::MAX) {
        return Err(anyhow!(
            "invalid table bounds: start row {} + max rows {} exceeds {}",
            cfg.table.start_row,
            cfg.table.max_rows,
            u32::MAX
        ));
    }
    if cfg.retry.attempts == 0 {
        return Err(anyhow!("invalid retry attempts: must be >= 1"));
    }
    cfg.read_failure_policy()?;
    if let Some(bad) = cfg.extractors.iter().find(|e| e.program.trim().is_empty()) {
        return Err(anyhow!(
            "invalid extractor: program cannot be empty (args: {:?})",
            bad.args
        ));
    }
    Ok(())
}

fn merge_file_config(base: &mut LedgerConfig, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(path)
        .map_err(|err| SyncError::ConfigInvalid(format!("{}: {err}", path.display())))?;
    let parsed: PartialLedgerConfig = toml::from_str(&raw)
        .map_err(|err| SyncError::ConfigInvalid(format!("{}: {err}", path.display())))?;
    if let Some(table) = parsed.table {
        base.table = table;
    }
    if let Some(retry) = parsed.retry {
        base.retry = retry;
    }
    if let Some(shift) = parsed.shift {
        base.shift = shift;
    }
    if let Some(host) = parsed.host {
        base.host = host;
    }
    if let Some(extractors) = parsed.extractors {
        base.extractors = extractors;
    }
    Ok(())
}

pub fn load_config(config_file: &Path) -> Result<LedgerConfig> {
    let mut cfg = LedgerConfig::default();
    merge_file_config(&mut cfg, config_file)?;

    cfg.table.sheet = env_or_string("PICK3_SHEET", &cfg.table.sheet);
    cfg.table.start_row = env_or_u32("PICK3_START_ROW", cfg.table.start_row);
    cfg.table.max_rows = env_or_u32("PICK3_MAX_ROWS", cfg.table.max_rows);
    cfg.retry.attempts = env_or_u32("PICK3_RETRY_ATTEMPTS", cfg.retry.attempts);
    cfg.retry.delay_ms = env_or_u64("PICK3_RETRY_DELAY_MS", cfg.retry.delay_ms);
    cfg.shift.read_failure = env_or_string("PICK3_SHIFT_READ_FAILURE", &cfg.shift.read_failure);
    cfg.host.process_name = env_or_optional_string("PICK3_HOST_PROCESS", cfg.host.process_name);

    validate(&cfg)?;
    Ok(cfg)
}
