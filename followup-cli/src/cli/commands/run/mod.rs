//! `run`: process one batch

pub mod handler;

use std::path::PathBuf;

use clap::Args;

#[derive(Debug, Args)]
pub struct RunCommands {
    /// Batch configuration (default: <data dir>/config.json)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Input workbook (default: <data dir>/planilha_filtrada.xlsx)
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Sheet to read, overriding the configuration
    #[arg(long)]
    pub sheet: Option<String>,

    /// 0-based header row, overriding the configuration
    #[arg(long, value_name = "ROW")]
    pub header_row: Option<usize>,

    /// Fill the follow-up forms without saving them
    #[arg(long)]
    pub no_submit: bool,
}
