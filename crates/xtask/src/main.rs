//! Development tasks for the tabletop engine
//!
//! This binary provides development utilities using the cargo-xtask pattern.
//! Run with: `cargo xtask <command>`

mod commands;
mod dirs;

use anyhow::Result;
use clap::Parser;
use commands::{Golden, ReadRecord, RecordPig};
use tracing_subscriber::EnvFilter;

/// Development tasks for the tabletop engine
#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Development tools for the tabletop engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Read and inspect record files
    ReadRecord(ReadRecord),

    /// Golden transcript commands
    #[command(subcommand)]
    Golden(Golden),

    /// Record a scripted Pig game as a new golden
    RecordPig(RecordPig),
}

fn main() -> Result<()> {
    // Load .env file if it exists (for TABLETOP_DATA_DIR, RUST_LOG)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::ReadRecord(cmd) => cmd.execute(),
        Command::Golden(cmd) => cmd.execute(),
        Command::RecordPig(cmd) => cmd.execute(),
    }
}
