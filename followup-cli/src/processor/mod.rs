//! Record processing
//!
//! Walks the batch rows in order. Each row is resolved to a record id, the
//! record is opened, a follow-up is filled in, and the outcome lands in
//! exactly one ledger (or none, for skipped rows). Row faults stay inside
//! [`RecordProcessor::process_row`]; only session loss and ledger write
//! failures escape as a [`BatchError`].

pub mod form;
pub mod state;

use log::{debug, info, warn};

use crate::api::{DirectoryLookup, IdentityResolver, RemoteRecordId, Resolution, TenantCredentials};
use crate::error::BatchError;
use crate::ledger::{LedgerEntry, Ledgers};
use crate::sheet::{KeyColumnKind, ResolvedKey, Row};
use crate::ui::screenshots::{self, ScreenshotDir};
use crate::ui::{FollowUpForm, UiDriver, UiError};

pub use form::{FollowUpSettings, MONTHS_PT, compose_subject};
pub use state::RowState;

use state::RowMachine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    EmptyKey,
    AlreadyRecorded,
}

/// Step at which a row failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Resolution,
    Navigation,
    Form,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureStage::Resolution => "resolution",
            FailureStage::Navigation => "navigation",
            FailureStage::Form => "form",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Skipped(SkipReason),
    Recorded { id: RemoteRecordId },
    Failed { stage: FailureStage, reason: String },
}

/// What happened to one input row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowReport {
    pub line: usize,
    pub key: ResolvedKey,
    pub outcome: RowOutcome,
}

impl RowReport {
    /// One-line operator message
    pub fn message(&self) -> String {
        match &self.outcome {
            RowOutcome::Skipped(SkipReason::EmptyKey) => format!("Row {}: skipped, empty key", self.line),
            RowOutcome::Skipped(SkipReason::AlreadyRecorded) => {
                format!("Row {}: skipped, {} already has a follow-up", self.line, self.key)
            }
            RowOutcome::Recorded { id } => {
                format!("Row {}: follow-up recorded for {} (record {})", self.line, self.key, id)
            }
            RowOutcome::Failed { stage, reason } => {
                format!("Row {}: {} failed for {}: {}", self.line, stage, self.key, reason)
            }
        }
    }
}

/// Outcome counts for a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub processed: usize,
    pub recorded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: &RowOutcome) {
        self.processed += 1;
        match outcome {
            RowOutcome::Skipped(_) => self.skipped += 1,
            RowOutcome::Recorded { .. } => self.recorded += 1,
            RowOutcome::Failed { .. } => self.failed += 1,
        }
    }

    /// Rows never reached because the batch stopped early
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.processed)
    }
}

/// Result of one row: its report, plus the fault that must end the batch, if any
#[derive(Debug)]
pub struct RowStep {
    pub report: RowReport,
    pub abort: Option<BatchError>,
}

/// Drives rows through resolution, navigation and form filling
pub struct RecordProcessor<'a, D: ?Sized, L> {
    pub driver: &'a mut D,
    pub resolver: &'a IdentityResolver<L>,
    pub ledgers: &'a mut Ledgers,
    pub credentials: Option<&'a TenantCredentials>,
    pub key_column: &'a str,
    pub form: &'a FollowUpForm,
    pub screenshots: &'a ScreenshotDir,
}

impl<'a, D, L> RecordProcessor<'a, D, L>
where
    D: UiDriver + ?Sized,
    L: DirectoryLookup,
{
    fn kind(&self) -> KeyColumnKind {
        self.resolver.kind()
    }

    pub async fn process_row(&mut self, row: &Row) -> RowStep {
        let kind = self.kind();
        let key = kind.normalize(row.find(self.key_column).unwrap_or_default());
        let mut machine = RowMachine::new(row.line());

        if key.is_empty() {
            machine.advance(RowState::Skipped);
            return self.finish(row, key, RowOutcome::Skipped(SkipReason::EmptyKey), None);
        }
        if self.ledgers.is_done(&key) {
            machine.advance(RowState::Skipped);
            return self.finish(row, key, RowOutcome::Skipped(SkipReason::AlreadyRecorded), None);
        }

        let id = if kind.needs_lookup() {
            machine.advance(RowState::Resolving);
            match self.resolver.resolve(&key, self.credentials).await {
                Resolution::Found(id) => id,
                Resolution::NotFound => {
                    let reason = format!("no record found for {} '{}'", kind.label(), key);
                    return self.fail(&mut machine, row, key, FailureStage::Resolution, reason, None);
                }
                Resolution::Failed(failure) => {
                    return self.fail(
                        &mut machine,
                        row,
                        key,
                        FailureStage::Resolution,
                        failure.to_string(),
                        None,
                    );
                }
            }
        } else {
            RemoteRecordId::new(key.as_str())
        };

        machine.advance(RowState::Navigating);
        if let Err(e) = self.driver.open_record(&id).await {
            return self.fail_ui(&mut machine, row, key, FailureStage::Navigation, e).await;
        }

        machine.advance(RowState::FillingForm);
        if let Err(e) = self.driver.fill_follow_up(self.form).await {
            return self.fail_ui(&mut machine, row, key, FailureStage::Form, e).await;
        }

        machine.advance(RowState::Recorded);
        let entry = LedgerEntry::from_row(row, &key, kind);
        let abort = self.ledgers.record_success(entry).err().map(BatchError::Ledger);
        self.finish(row, key, RowOutcome::Recorded { id }, abort)
    }

    async fn fail_ui(
        &mut self,
        machine: &mut RowMachine,
        row: &Row,
        key: ResolvedKey,
        stage: FailureStage,
        error: UiError,
    ) -> RowStep {
        let abort = error
            .is_session_fatal()
            .then(|| BatchError::SessionFatal(format!("row {}: {}", row.line(), error)));
        if abort.is_none() {
            self.screenshots
                .capture(&mut *self.driver, &screenshots::row_error(row.line()))
                .await;
        }
        self.fail(machine, row, key, stage, error.to_string(), abort)
    }

    fn fail(
        &mut self,
        machine: &mut RowMachine,
        row: &Row,
        key: ResolvedKey,
        stage: FailureStage,
        reason: String,
        abort: Option<BatchError>,
    ) -> RowStep {
        machine.advance(RowState::FormError);
        let entry = LedgerEntry::from_row(row, &key, self.kind()).with_reason(format!("{}: {}", stage, reason));
        let ledger_error = self.ledgers.record_failure(entry).err().map(BatchError::Ledger);
        // A lost session is the root cause even when the ledger write also failed
        let abort = abort.or(ledger_error);
        self.finish(row, key, RowOutcome::Failed { stage, reason }, abort)
    }

    fn finish(&self, row: &Row, key: ResolvedKey, outcome: RowOutcome, abort: Option<BatchError>) -> RowStep {
        let report = RowReport {
            line: row.line(),
            key,
            outcome,
        };
        match &report.outcome {
            RowOutcome::Recorded { .. } => info!("{}", report.message()),
            RowOutcome::Skipped(_) => debug!("{}", report.message()),
            RowOutcome::Failed { .. } => warn!("{}", report.message()),
        }
        RowStep { report, abort }
    }
}
