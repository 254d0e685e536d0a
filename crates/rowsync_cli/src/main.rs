//! rowsync CLI
//!
//! Runs reconciliation jobs described by a JSON job file.
//!
//! # Commands
//!
//! - `run` - Sync every mapping in the job (or the ones named with `--mapping`)
//! - `check` - Validate the job's mappings without syncing

mod commands;
mod error;
mod job;
mod stores;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// One-way record reconciliation.
#[derive(Parser)]
#[command(name = "rowsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the job file
    #[arg(global = true, short, long)]
    job: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync the job's mappings
    Run {
        /// Only run the named mapping (repeatable)
        #[arg(short, long = "mapping")]
        mappings: Vec<String>,

        /// Write progress lines to this file
        #[arg(short, long)]
        transcript: Option<PathBuf>,
    },

    /// Validate the job without syncing
    Check,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run {
            mappings,
            transcript,
        } => {
            let job = cli.job.ok_or("Job file required for run")?;
            commands::run::run(&job, &mappings, transcript.as_deref())?;
        }
        Commands::Check => {
            let job = cli.job.ok_or("Job file required for check")?;
            commands::check::run(&job)?;
        }
        Commands::Version => {
            println!("rowsync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
