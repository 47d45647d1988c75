use anyhow::Result;

use crate::commands::CommandReport;
use crate::ledger::config::load_config;
use crate::ledger::paths::resolve_paths;
use crate::ledger::record::HEADERS;
use crate::logging::log;
use crate::workbook::json::create_workbook;

pub fn run(force: bool) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths.config_file)?;
    let mut report = CommandReport::new("init");

    // No header when the table starts on the first row.
    let header_row = cfg.table.start_row.checked_sub(1).filter(|row| *row >= 1);
    create_workbook(
        &paths.workbook_path,
        &cfg.table.sheet,
        header_row,
        &HEADERS,
        force,
    )?;
    log(format!(
        "Created workbook {} (sheet {})",
        paths.workbook_path.display(),
        cfg.table.sheet
    ));

    report.detail(format!("workbook={}", paths.workbook_path.display()));
    report.detail(format!("sheet={}", cfg.table.sheet));
    match header_row {
        Some(row) => report.detail(format!("header_row={row}")),
        None => report.detail("header_row=none"),
    }
    report.detail(format!("start_row={}", cfg.table.start_row));
    Ok(report)
}
