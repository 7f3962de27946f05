//! Command-line surface

pub mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::ledger::LedgerCommands;
use commands::run::RunCommands;

#[derive(Debug, Parser)]
#[command(name = "followup-cli", version, about = "Append follow-ups to student records from a spreadsheet")]
pub struct Cli {
    /// Data directory (default: <platform data dir>/FollowUpAutomation)
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Process a batch
    Run(RunCommands),
    /// Show a head office's succeeded and failed ledgers
    Ledger(LedgerCommands),
}

/// Dispatch to the command handler; returns the process exit code
pub async fn run(cli: Cli) -> Result<i32> {
    if cli.no_color {
        colored::control::set_override(false);
    }

    match cli.command {
        Commands::Run(args) => commands::run::handler::handle_run_command(args, cli.data_dir).await,
        Commands::Ledger(args) => commands::ledger::handler::handle_ledger_command(args, cli.data_dir),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "followup-cli",
            "run",
            "--config",
            "cfg.json",
            "--no-submit",
            "--data-dir",
            "/tmp/data",
        ])
        .unwrap();

        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/data")));
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.config, Some(PathBuf::from("cfg.json")));
                assert!(args.no_submit);
                assert!(args.input.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_ledger() {
        let cli = Cli::try_parse_from(["followup-cli", "-v", "ledger", "Sul", "--failed"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Ledger(args) => {
                assert_eq!(args.tenant, "Sul");
                assert!(args.failed);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
