//! `ledger`: inspect a head office's ledgers

pub mod handler;

use clap::{Args, ValueEnum};

#[derive(Debug, Args)]
pub struct LedgerCommands {
    /// Head office name (Aldeota, Sul, Bezerra)
    pub tenant: String,

    /// Only the failed ledger
    #[arg(long, conflicts_with = "succeeded")]
    pub failed: bool,

    /// Only the succeeded ledger
    #[arg(long)]
    pub succeeded: bool,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}
