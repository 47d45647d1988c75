use anyhow::Result;

use crate::commands::CommandReport;
use crate::env_loader::unknown_env_keys;
use crate::ledger::config::load_config;
use crate::ledger::paths::resolve_paths;
use crate::ledger::reader::{TableLayout, TableSnapshot, read_table};
use crate::ledger::retry::RetryPolicy;
use crate::workbook::json::JsonWorkbookBackend;
use crate::workbook::{Workbook, WorkbookBackend};

/// Read the table without committing anything back.
fn snapshot(
    backend: &mut JsonWorkbookBackend,
    layout: &TableLayout,
    retry: &RetryPolicy,
) -> Result<TableSnapshot> {
    let mut book = backend.open()?;
    let read = read_table(&mut book, layout, retry);
    book.close(false)?;
    Ok(read?)
}

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("status");

    report.detail(format!("build_id={}", env!("BUILD_UUID")));
    report.detail(format!("home={}", paths.home.display()));
    report.detail(format!("workbook={}", paths.workbook_path.display()));
    report.detail(format!("secrets_file={}", paths.secrets_file.display()));
    report.detail(format!("config_file={}", paths.config_file.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));

    let unknown = unknown_env_keys(std::env::vars().map(|(key, _)| key));
    if !unknown.is_empty() {
        report.detail(format!("unknown_env_keys={}", unknown.join(",")));
    }

    let cfg = match load_config(&paths.config_file) {
        Ok(cfg) => cfg,
        Err(err) => {
            report.issue(format!("config invalid: {err:#}"));
            return Ok(report);
        }
    };
    report.detail(format!("sheet={}", cfg.table.sheet));
    report.detail(format!("start_row={}", cfg.table.start_row));
    report.detail(format!(
        "retry={}x{}ms",
        cfg.retry.attempts, cfg.retry.delay_ms
    ));
    report.detail(format!("shift_read_failure={}", cfg.shift.read_failure));
    report.detail(format!("extractors={}", cfg.extractors.len()));

    if !paths.secrets_file.is_file() {
        report.detail("secrets_present=false");
    }

    let layout = TableLayout {
        start_row: cfg.table.start_row,
        max_rows: cfg.table.max_rows,
    };
    let mut backend = JsonWorkbookBackend::new(&paths.workbook_path, &cfg.table.sheet);
    match snapshot(&mut backend, &layout, &cfg.retry_policy()) {
        Ok(table) => {
            report.detail(format!("rows={}", table.count()));
            match table.newest() {
                Some(row) => report.detail(format!(
                    "newest={} {} {}-{}-{}",
                    row.date, row.session, row.p1, row.p2, row.p3
                )),
                None => report.detail("newest=none"),
            }
        }
        Err(err) => report.issue(format!("workbook unreadable: {err:#}")),
    }

    Ok(report)
}
