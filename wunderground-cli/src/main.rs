//! Binary crate for the `wunderground` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Interactive configuration
//! - Logging setup and JSON output

use clap::Parser;
use tracing_subscriber::EnvFilter;
use wunderground_core::Config;

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cmd = cli::Cli::parse();

    // An unreadable config surfaces later, from the command that needs it.
    let default_level = cmd.log_level(Config::load().ok().as_ref());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    cmd.run().await
}
