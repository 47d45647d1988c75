use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::commands::CommandReport;
use crate::ledger::audit::{self, AuditEvent};
use crate::ledger::config::load_config;
use crate::ledger::extractors::run_extractors;
use crate::ledger::merge::MergeOrchestrator;
use crate::ledger::normalize::normalize;
use crate::ledger::paths::{LedgerPaths, resolve_paths};
use crate::ledger::reader::TableLayout;
use crate::ledger::record::Record;
use crate::ledger::secrets::load_endpoint;
use crate::logging::log;
use crate::source::fetch::{fetch_payload, read_payload_file};
use crate::workbook::json::{JsonWorkbookBackend, file_digest};

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub payload: Option<PathBuf>,
    pub skip_extractors: bool,
}

/// Secrets, fetch (or payload file) and normalization.
fn load_batch(
    paths: &LedgerPaths,
    opts: &SyncOptions,
    report: &mut CommandReport,
) -> Result<Vec<Record>> {
    let payload = match &opts.payload {
        Some(path) => {
            report.detail(format!("payload_file={}", path.display()));
            read_payload_file(path)?
        }
        None => {
            let endpoint = load_endpoint(&paths.secrets_file)?;
            fetch_payload(&endpoint)?
        }
    };
    Ok(normalize(&payload)?)
}

pub fn run(opts: &SyncOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths.config_file)?;
    let mut report = CommandReport::new("sync");
    report.detail(format!("workbook={}", paths.workbook_path.display()));
    report.detail(format!("sheet={}", cfg.table.sheet));

    let batch = match load_batch(&paths, opts, &mut report) {
        Ok(batch) => batch,
        Err(err) => {
            audit::record(&paths, AuditEvent::failed("fetch", &err));
            return Err(err);
        }
    };
    report.detail(format!("normalized_rows={}", batch.len()));
    if batch.is_empty() {
        log("No rows to merge.");
        audit::record(&paths, AuditEvent::skipped("merge", "feed produced no rows"));
        report.detail("merge=skipped");
        return Ok(report);
    }

    let layout = TableLayout {
        start_row: cfg.table.start_row,
        max_rows: cfg.table.max_rows,
    };
    let backend = JsonWorkbookBackend::new(&paths.workbook_path, &cfg.table.sheet)
        .with_host_process(cfg.host.process_name.clone());
    let on_read_failure = cfg.read_failure_policy()?;
    report.detail(format!("shift_read_failure={}", on_read_failure.as_str()));
    let mut merge = MergeOrchestrator::new(backend, layout)
        .with_retry(cfg.retry_policy())
        .with_read_failure_policy(on_read_failure);

    let outcome = match merge.run(&batch) {
        Ok(outcome) => outcome,
        Err(err) => {
            audit::record(&paths, AuditEvent::failed("merge", &err));
            return Err(err).context("merge failed");
        }
    };

    let digest = file_digest(&paths.workbook_path).ok();
    audit::record(&paths, AuditEvent::merged(&outcome, digest.clone()));
    report.detail(format!("existing_rows={}", outcome.existing_count));
    report.detail(format!("new_rows={}", outcome.accepted.len()));
    report.detail(format!("shifted_rows={}", outcome.shifted_rows));
    report.detail(format!("inserted_rows={}", outcome.inserted_rows));
    report.detail(format!("noop={}", outcome.noop));
    report.detail(format!("final_state={}", merge.state()));
    if let Some(digest) = digest {
        report.detail(format!("workbook_sha256={digest}"));
    }

    if opts.skip_extractors {
        report.detail("extractors=skipped");
        return Ok(report);
    }
    for run in run_extractors(&cfg.extractors) {
        match (run.exit_code, run.error) {
            (_, Some(err)) => report.detail(format!("extractor {}: error {err}", run.program)),
            (Some(code), None) => report.detail(format!("extractor {}: exit {code}", run.program)),
            (None, None) => report.detail(format!("extractor {}: signal", run.program)),
        }
    }
    Ok(report)
}
