use clap::Parser;
use colored::Colorize;
use env_logger::Env;

use followup_cli::cli::{self, Cli};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    if cli.verbose {
        logger.filter_module("followup_cli", log::LevelFilter::Debug);
    }
    logger.format_timestamp_secs().init();

    let code = match cli::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            1
        }
    };

    std::process::exit(code);
}
