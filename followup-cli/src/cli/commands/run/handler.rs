//! Run command handler

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use colored::*;

use super::RunCommands;
use crate::api::SoapDirectoryClient;
use crate::config::{BatchConfig, DataDir};
use crate::context::{BatchContext, BatchReport, StopSignal, missing_columns, project_sheet};
use crate::error::BatchError;
use crate::processor::{RowOutcome, RowReport};
use crate::sheet;
use crate::ui::WebDriverSession;

/// Handle the run command; returns the exit code
pub async fn handle_run_command(args: RunCommands, data_dir: Option<PathBuf>) -> Result<i32> {
    let data_dir = DataDir::resolve(data_dir);

    let config_path = args.config.unwrap_or_else(|| data_dir.config_file());
    let mut config = match BatchConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => return Ok(report_fatal(&BatchError::Config(e))),
    };
    if args.no_submit {
        config.follow_up.submit = false;
    }
    if args.sheet.is_some() {
        config.load.sheet = args.sheet;
    }
    if args.header_row.is_some() {
        config.load.header_row = args.header_row;
    }

    let input = args.input.unwrap_or_else(|| data_dir.input_file());
    println!("Input: {}", input.display().to_string().cyan());
    let raw_sheet = match sheet::load(&input, &config.load) {
        Ok(sheet) => sheet,
        Err(e) => return Ok(report_fatal(&BatchError::from(e))),
    };
    let missing = missing_columns(&config, &raw_sheet);
    let sheet = match project_sheet(&config, &raw_sheet) {
        Ok(sheet) => sheet,
        Err(e) => return Ok(report_fatal(&BatchError::from(e))),
    };

    println!(
        "Head office: {}  Key: {} ({})  Rows: {}",
        config.tenant.to_string().bright_green().bold(),
        config.key_column.cyan(),
        config.key_kind,
        sheet.len()
    );
    if let Some(line) = missing_columns_line(&missing) {
        println!("{}", line.yellow());
    }
    if !config.follow_up.submit {
        println!("{}", "Rehearsal: follow-ups will be filled but not saved".yellow());
    }

    let lookup = SoapDirectoryClient::new(&config.directory_url, config.resilience.timeouts.http)?;
    let stop = StopSignal::new();
    stop.install_ctrl_c();

    let webdriver_url = config.webdriver_url.clone();
    let base_url = config.base_url.clone();
    let timeouts = config.resilience.timeouts.clone();

    let context = match BatchContext::open(config, &data_dir, lookup, stop) {
        Ok(context) => context,
        Err(e) => return Ok(report_fatal(&e)),
    };

    let driver = WebDriverSession::start(&webdriver_url, &base_url, &timeouts)
        .await
        .with_context(|| format!("Failed to start a browser session via {}", webdriver_url))?;

    let started = Instant::now();
    let report = context.execute(driver, &sheet, print_row).await;
    print_summary(&report, started.elapsed().as_secs_f64());

    Ok(report.exit_code())
}

fn missing_columns_line(missing: &[String]) -> Option<String> {
    if missing.is_empty() {
        return None;
    }
    Some(format!("Selected columns not in sheet (ignored): {}", missing.join(", ")))
}

fn print_row(report: &RowReport) {
    let tag = match &report.outcome {
        RowOutcome::Recorded { .. } => "  OK  ".on_green().black(),
        RowOutcome::Skipped(_) => " SKIP ".on_bright_black().white(),
        RowOutcome::Failed { .. } => " FAIL ".on_red().white(),
    };
    let message = report.message();
    let message = match &report.outcome {
        RowOutcome::Failed { .. } => message.red(),
        RowOutcome::Skipped(_) => message.dimmed(),
        RowOutcome::Recorded { .. } => message.normal(),
    };
    println!("{} {}", tag, message);
}

fn print_summary(report: &BatchReport, seconds: f64) {
    println!();
    if let Some(route) = &report.route {
        println!("{}", route.message().dimmed());
    }
    for warning in &report.warnings {
        println!("{} {}", "Warning:".yellow().bold(), warning);
    }

    let summary = &report.summary;
    println!(
        "{} recorded, {} skipped, {} failed, {} not processed ({:.1}s)",
        summary.recorded.to_string().green().bold(),
        summary.skipped.to_string().bold(),
        summary.failed.to_string().red().bold(),
        summary.remaining(),
        seconds
    );

    if report.stopped {
        println!("{}", "Stopped by operator".yellow());
    }
    if let Some(e) = &report.error {
        eprintln!("{} {}", "Batch aborted:".red().bold(), e);
    }
}

fn report_fatal(error: &BatchError) -> i32 {
    eprintln!("{} {}", "Error:".red().bold(), error);
    error.exit_code()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_columns_line() {
        assert_eq!(missing_columns_line(&[]), None);
        assert_eq!(
            missing_columns_line(&["telefone".to_string(), "curso".to_string()]).as_deref(),
            Some("Selected columns not in sheet (ignored): telefone, curso")
        );
    }
}
