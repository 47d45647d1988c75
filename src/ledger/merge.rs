use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;

use crate::ledger::dedup::filter_new;
use crate::ledger::insert::insert_top;
use crate::ledger::reader::{TableLayout, read_table};
use crate::ledger::record::Record;
use crate::ledger::retry::RetryPolicy;
use crate::ledger::shift::{ReadFailurePolicy, shift_down};
use crate::logging::log;
use crate::workbook::{Workbook, WorkbookBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MergeState {
    Idle,
    Opened,
    Read,
    Filtered,
    Shifted,
    Inserted,
    NoOp,
    Saved,
    Closed,
    Failed,
}

impl fmt::Display for MergeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeOutcome {
    pub existing_count: usize,
    pub candidates: usize,
    pub accepted: Vec<Record>,
    pub shifted_rows: usize,
    pub inserted_rows: usize,
    pub noop: bool,
}

/// Runs one merge of a batch into the table: read, filter, shift, insert, save.
pub struct MergeOrchestrator<B: WorkbookBackend> {
    backend: B,
    layout: TableLayout,
    retry: RetryPolicy,
    on_read_failure: ReadFailurePolicy,
    history: Vec<MergeState>,
}

impl<B: WorkbookBackend> MergeOrchestrator<B> {
    pub fn new(backend: B, layout: TableLayout) -> Self {
        Self {
            backend,
            layout,
            retry: RetryPolicy::default(),
            on_read_failure: ReadFailurePolicy::default(),
            history: vec![MergeState::Idle],
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_read_failure_policy(mut self, policy: ReadFailurePolicy) -> Self {
        self.on_read_failure = policy;
        self
    }

    pub fn state(&self) -> MergeState {
        self.history.last().copied().unwrap_or(MergeState::Idle)
    }

    /// States entered by the most recent `run`, starting at `Idle`.
    #[cfg(test)]
    pub fn history(&self) -> &[MergeState] {
        &self.history
    }

    #[cfg(test)]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn enter(&mut self, state: MergeState) {
        self.history.push(state);
    }

    /// On error the merge ends in `Failed`: the workbook is closed without
    /// committing, the backend is force-released, and the error is returned.
    pub fn run(&mut self, batch: &[Record]) -> Result<MergeOutcome> {
        self.history.clear();
        self.history.push(MergeState::Idle);

        let mut book: Option<B::Book> = None;
        match self.run_steps(batch, &mut book) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                log(format!("Merge failed after {}: {err:#}", self.state()));
                self.enter(MergeState::Failed);
                if let Some(mut open) = book.take()
                    && let Err(close_err) = open.close(false)
                {
                    log(format!("cleanup: close without saving failed: {close_err}"));
                }
                if let Err(release_err) = self.backend.force_release() {
                    log(format!("cleanup: force release failed: {release_err:#}"));
                }
                Err(err)
            }
        }
    }

    fn run_steps(
        &mut self,
        batch: &[Record],
        slot: &mut Option<B::Book>,
    ) -> Result<MergeOutcome> {
        self.backend
            .force_release()
            .context("failed to clear stale workbook holders")?;
        let book = slot.insert(self.backend.open().context("failed to open workbook")?);
        self.enter(MergeState::Opened);
        log("Workbook opened.");

        let snapshot = read_table(book, &self.layout, &self.retry)
            .context("failed to read existing table")?;
        self.enter(MergeState::Read);
        log(format!("Loaded {} existing rows.", snapshot.count()));

        let accepted = filter_new(&snapshot.rows, batch);
        self.enter(MergeState::Filtered);

        let mut outcome = MergeOutcome {
            existing_count: snapshot.count(),
            candidates: batch.len(),
            accepted,
            shifted_rows: 0,
            inserted_rows: 0,
            noop: false,
        };

        if outcome.accepted.is_empty() {
            outcome.noop = true;
            self.enter(MergeState::NoOp);
            log("No new rows to insert.");
        } else {
            outcome.shifted_rows = shift_down(
                book,
                &self.layout,
                outcome.existing_count,
                outcome.accepted.len(),
                &self.retry,
                self.on_read_failure,
            )
            .context("failed to shift existing rows")?;
            self.enter(MergeState::Shifted);

            outcome.inserted_rows = insert_top(book, &self.layout, &outcome.accepted, &self.retry)
                .context("failed to insert new rows")?;
            self.enter(MergeState::Inserted);
        }

        log("Saving workbook...");
        book.save().context("failed to save workbook")?;
        self.enter(MergeState::Saved);

        book.close(true).context("failed to close workbook")?;
        slot.take();
        self.enter(MergeState::Closed);
        log("Workbook closed.");

        Ok(outcome)
    }
}
