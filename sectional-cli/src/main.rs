//! Sectional CLI - Command-line host for section hydration
//!
//! Loads a saved storefront page, hydrates sections from the live store and
//! writes the updated page back.

mod commands;

use std::path::PathBuf;

use clap::Parser;
use sectional_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "sectional")]
#[command(about = "Hydrate sections of a saved storefront page")]
struct Cli {
    /// Console log level
    #[arg(long, value_enum, default_value_t = CliLogLevel::Warn, global = true)]
    log_level: CliLogLevel,

    /// Also write a full trace log to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_level.as_tracing_level(), cli.log_file.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;

    commands::handle_command(cli.command).await
}
