//! pit: the operator CLI.
//!
//! `pit check-config <file>` validates an account config and prints the
//! resolved limits plus the content hash. `pit run <file>` runs a single
//! account in the foreground against the paper broker until Ctrl-C.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pit", version, about = "PitBoss operator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate an account config file and print its summary.
    CheckConfig {
        /// Path to the account YAML.
        file: PathBuf,
    },
    /// Run one account in the foreground (paper broker, dry run).
    Run {
        /// Path to the account YAML.
        file: PathBuf,
        /// Paper account starting balance, in whole currency units.
        #[arg(long, default_value_t = 10_000)]
        paper_balance: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::CheckConfig { file } => commands::check::execute(&file),
        Commands::Run {
            file,
            paper_balance,
        } => commands::run::execute(&file, paper_balance).await,
    }
}
