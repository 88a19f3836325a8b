mod commands;
mod discover;
mod report;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{InitCommand, RunCommand, ValidateCommand};

/// sqlprobe - file-driven tests for relational-database state
#[derive(Debug, Parser)]
#[command(
    name = "sqlprobe",
    version,
    about = "File-driven SQL test runner for validating database state"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Execute tests and produce reports
    Run(RunCommand),
    /// Check test files for errors without executing them
    Validate(ValidateCommand),
    /// Scaffold a new test workspace
    Init(InitCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Run(cmd) => cmd.execute()?,
        Commands::Validate(cmd) => cmd.execute()?,
        Commands::Init(cmd) => cmd.execute()?,
    };

    std::process::exit(exit_code);
}

/// Console logging setup. `RUST_LOG` wins over the verbosity flag.
pub(crate) fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
