//! Read and inspect game record files
//!
//! Loads a record (live game or golden) and prints its metadata, its move
//! list, or a materialized state.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;

use game_core::MoveRecord;
use runtime::Record;

/// Read and inspect a record file
#[derive(Parser)]
pub struct ReadRecord {
    /// Path of the record file
    #[arg(value_name = "PATH")]
    path: PathBuf,

    /// Version to focus on (defaults to the latest)
    #[arg(short, long, value_name = "VERSION")]
    version: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "summary")]
    format: OutputFormat,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    /// Game metadata and the move list
    Summary,
    /// The record file as written
    Json,
    /// The full state at the selected version
    State,
}

impl ReadRecord {
    pub fn execute(self) -> Result<()> {
        let record = Record::load(&self.path)
            .with_context(|| format!("Failed to read record: {}", self.path.display()))?;

        let latest = record.game().version;
        let version = self.version.unwrap_or(latest);
        if version > latest {
            anyhow::bail!("Record only has versions 0..={latest}, not {version}");
        }

        match self.format {
            OutputFormat::Summary => print_summary(&self.path, &record, self.version),
            OutputFormat::Json => print!("{}", record.to_json_string()?),
            OutputFormat::State => {
                let state = record
                    .state(version)
                    .context("Failed to decode state patches")?
                    .with_context(|| format!("Record has no state for version {version}"))?;
                println!("{}", serde_json::to_string_pretty(&state)?);
            }
        }
        Ok(())
    }
}

fn print_summary(path: &std::path::Path, record: &Record, focus: Option<u64>) {
    let game = record.game();

    println!("{} {}", style("Record:").bold().cyan(), path.display());
    if !record.description().is_empty() {
        println!("{} {}", style("Description:").bold().cyan(), record.description());
    }
    println!();

    println!("{}", style("=== Game ===").bold().green());
    println!("  Rule set: {}", game.name);
    println!("  Id: {}", game.id);
    println!("  Version: {}", game.version);
    println!("  Players: {}", game.num_players);
    if !game.variant.is_empty() {
        let variant: Vec<String> = game
            .variant
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        println!("  Variant: {}", variant.join(", "));
    }
    if game.finished {
        let winners: Vec<String> = game.winners.iter().map(ToString::to_string).collect();
        println!("  Finished: yes, won by {}", winners.join(", "));
    } else {
        println!("  Finished: no");
    }
    println!("  Created: {}", game.created.to_rfc3339());
    println!("  Modified: {}", game.modified.to_rfc3339());
    println!("  Encoding: {}", record.encoding());
    println!();

    println!("{}", style("=== Moves ===").bold().green());
    match focus {
        Some(version) => match record.move_record(version) {
            Some(mv) => print_move(mv),
            None => println!("  (version {version} is the initial state)"),
        },
        None if record.moves().is_empty() => println!("  (no moves)"),
        None => record.moves().iter().for_each(print_move),
    }
}

fn print_move(mv: &MoveRecord) {
    let marker = if mv.is_initiator() {
        style("*").yellow()
    } else {
        style(" ")
    };
    println!(
        "{} {:>5}  {:<16} {:<10} initiator {:>5}  phase {:>2}  {}  {}",
        marker,
        mv.version,
        mv.name,
        mv.proposer.to_string(),
        mv.initiator,
        mv.phase,
        mv.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
        mv.blob
    );
}
