//! One batch, from lock to teardown
//!
//! [`BatchContext::open`] takes the tenant lock and loads the ledgers;
//! [`BatchContext::execute`] logs in, routes to the tenant, walks the rows
//! and always flushes the ledgers and closes the browser before returning.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{error, info, warn};

use crate::api::{DirectoryLookup, IdentityResolver};
use crate::config::{BatchConfig, ConfigError, DataDir};
use crate::error::BatchError;
use crate::ledger::{LedgerLock, LedgerPaths, Ledgers};
use crate::processor::{BatchSummary, RecordProcessor, RowReport};
use crate::sheet::Sheet;
use crate::tenant::{RouteDecision, TenantMismatchWarning, TenantRouter};
use crate::ui::screenshots::{self, ScreenshotDir};
use crate::ui::{UiDriver, WaitConfig};

/// Operator stop request, checked between rows
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Trigger on Ctrl-C. Must be called inside a tokio runtime.
    pub fn install_ctrl_c(&self) {
        let signal = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Stop requested; finishing the current row");
                signal.trigger();
            }
        });
    }
}

/// Keep the key column and the selected columns, in that order
pub fn project_sheet(config: &BatchConfig, sheet: &Sheet) -> Result<Sheet, ConfigError> {
    let Some(key_idx) = sheet.resolve_column(&config.key_column) else {
        return Err(ConfigError::KeyColumnNotFound {
            column: config.key_column.clone(),
            available: sheet.columns().to_vec(),
        });
    };

    let mut keep = vec![key_idx];
    for column in config.batch_columns().into_iter().skip(1) {
        match sheet.resolve_column(column) {
            Some(idx) if !keep.contains(&idx) => keep.push(idx),
            Some(_) => {}
            None => warn!("Selected column '{}' not found in sheet; ignoring it", column),
        }
    }
    Ok(sheet.project(&keep))
}

/// Selected columns the sheet does not have
pub fn missing_columns(config: &BatchConfig, sheet: &Sheet) -> Vec<String> {
    config
        .selected_columns
        .iter()
        .filter(|column| sheet.resolve_column(column).is_none())
        .cloned()
        .collect()
}

/// How a batch ended
#[derive(Debug)]
pub struct BatchReport {
    pub summary: BatchSummary,
    pub route: Option<RouteDecision>,
    pub warnings: Vec<TenantMismatchWarning>,
    pub stopped: bool,
    pub error: Option<BatchError>,
}

impl BatchReport {
    pub fn exit_code(&self) -> i32 {
        match (&self.error, self.stopped) {
            (Some(e), _) => e.exit_code(),
            (None, true) => 130,
            (None, false) => 0,
        }
    }
}

/// Resources owned by a single batch run
pub struct BatchContext<L> {
    config: BatchConfig,
    resolver: IdentityResolver<L>,
    ledgers: Ledgers,
    paths: LedgerPaths,
    screenshots: ScreenshotDir,
    stop: StopSignal,
    _lock: LedgerLock,
}

impl<L: DirectoryLookup> BatchContext<L> {
    /// Lock the tenant's ledgers and load them
    pub fn open(config: BatchConfig, data_dir: &DataDir, lookup: L, stop: StopSignal) -> Result<Self, BatchError> {
        data_dir.ensure().map_err(BatchError::Ledger)?;
        let paths = data_dir.ledger_paths(config.tenant.name());

        let lock = LedgerLock::acquire(&paths.lock).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                BatchError::Config(ConfigError::LedgerLocked {
                    path: paths.lock.clone(),
                    holder: LedgerLock::holder(&paths.lock),
                })
            } else {
                BatchError::Ledger(anyhow::Error::new(e).context(format!(
                    "Failed to create lock file: {}",
                    paths.lock.display()
                )))
            }
        })?;

        let ledgers = Ledgers::open(&paths).map_err(BatchError::Ledger)?;
        info!(
            "Ledgers for {}: {} succeeded, {} failed",
            config.tenant,
            ledgers.succeeded.len(),
            ledgers.failed.len()
        );

        let resolver = IdentityResolver::with_retry(lookup, config.key_kind, config.resilience.retry.clone());
        let screenshots = if config.screenshots {
            ScreenshotDir::new(data_dir.screenshots_dir())
        } else {
            ScreenshotDir::disabled()
        };

        Ok(Self {
            config,
            resolver,
            ledgers,
            paths,
            screenshots,
            stop,
            _lock: lock,
        })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn ledgers(&self) -> &Ledgers {
        &self.ledgers
    }

    pub fn ledger_paths(&self) -> &LedgerPaths {
        &self.paths
    }

    /// Run the batch over `sheet` with `driver`, calling `on_row` after each row
    ///
    /// Teardown (ledger flush, session quit, lock release) happens on every
    /// path, including errors and operator stop.
    pub async fn execute<D, F>(mut self, mut driver: D, sheet: &Sheet, mut on_row: F) -> BatchReport
    where
        D: UiDriver,
        F: FnMut(&RowReport),
    {
        let mut report = BatchReport {
            summary: BatchSummary::new(sheet.len()),
            route: None,
            warnings: Vec::new(),
            stopped: false,
            error: None,
        };

        if let Err(e) = self.drive(&mut driver, sheet, &mut report, &mut on_row).await {
            error!("Batch aborted: {}", e);
            report.error = Some(e);
        }

        if let Err(e) = self.ledgers.flush() {
            error!("Failed to flush ledgers: {:#}", e);
            if report.error.is_none() {
                report.error = Some(BatchError::Ledger(e));
            }
        }
        self.screenshots.capture(&mut driver, screenshots::FINAL).await;
        if let Err(e) = driver.quit().await {
            warn!("Failed to close browser session: {}", e);
        }

        info!(
            "Batch finished: {} recorded, {} skipped, {} failed, {} not processed",
            report.summary.recorded,
            report.summary.skipped,
            report.summary.failed,
            report.summary.remaining()
        );
        report
    }

    async fn drive<D, F>(
        &mut self,
        driver: &mut D,
        sheet: &Sheet,
        report: &mut BatchReport,
        on_row: &mut F,
    ) -> Result<(), BatchError>
    where
        D: UiDriver,
        F: FnMut(&RowReport),
    {
        if self.stop.is_triggered() {
            report.stopped = true;
            return Ok(());
        }

        driver
            .login(&self.config.login)
            .await
            .map_err(|e| BatchError::SessionFatal(format!("login failed: {}", e)))?;
        self.screenshots.capture(&mut *driver, screenshots::AFTER_LOGIN).await;

        let router = TenantRouter::new(self.config.tenant, WaitConfig::from(&self.config.resilience.timeouts));
        let decision = router.route(driver).await?;
        if matches!(decision, RouteDecision::Switch { .. }) {
            self.screenshots.capture(&mut *driver, screenshots::AFTER_TENANT_SWITCH).await;
        }
        if let Some(warning) = decision.mismatch() {
            report.warnings.push(warning);
        }
        report.route = Some(decision);

        let form = self.config.follow_up.current_form(&self.config.agent_name);
        info!("Follow-up subject: {}", form.subject);

        let mut processor = RecordProcessor {
            driver,
            resolver: &self.resolver,
            ledgers: &mut self.ledgers,
            credentials: self.config.directory.as_ref(),
            key_column: &self.config.key_column,
            form: &form,
            screenshots: &self.screenshots,
        };

        for row in sheet.rows() {
            if self.stop.is_triggered() {
                info!("Stopped by operator before row {}", row.line());
                report.stopped = true;
                break;
            }

            let step = processor.process_row(row).await;
            report.summary.record(&step.report.outcome);
            on_row(&step.report);
            if let Some(abort) = step.abort {
                return Err(abort);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_signal_is_shared() {
        let stop = StopSignal::new();
        let clone = stop.clone();
        assert!(!stop.is_triggered());
        clone.trigger();
        assert!(stop.is_triggered());
    }

    #[test]
    fn test_report_exit_codes() {
        let mut report = BatchReport {
            summary: BatchSummary::default(),
            route: None,
            warnings: Vec::new(),
            stopped: false,
            error: None,
        };
        assert_eq!(report.exit_code(), 0);
        report.stopped = true;
        assert_eq!(report.exit_code(), 130);
        report.error = Some(BatchError::SessionFatal("gone".into()));
        assert_eq!(report.exit_code(), 1);
    }
}
