//! Golden transcript commands
//!
//! `compare` replays goldens against the current rule sets; `remaster`
//! rewrites one with the current behaviour. The rule set is picked by the
//! record's `Game.Name`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;

use game_content::{Pig, pig};
use runtime::{GoldenError, Record, compare_golden, remaster_golden};

/// Golden transcript commands
#[derive(Subcommand)]
pub enum Golden {
    /// Replay goldens and report the first divergence of each
    Compare(Compare),

    /// Rewrite a golden with the engine's current behaviour
    Remaster(Remaster),
}

impl Golden {
    pub fn execute(self) -> Result<()> {
        let runtime = tokio::runtime::Runtime::new()?;
        match self {
            Golden::Compare(cmd) => runtime.block_on(cmd.execute()),
            Golden::Remaster(cmd) => runtime.block_on(cmd.execute()),
        }
    }
}

#[derive(Parser)]
pub struct Compare {
    /// Golden record files
    #[arg(value_name = "PATH", required = true)]
    paths: Vec<PathBuf>,
}

impl Compare {
    async fn execute(self) -> Result<()> {
        let mut failed = 0usize;
        for path in &self.paths {
            match compare_one(path).await {
                Ok(version) => println!(
                    "{} {} (verified through version {version})",
                    style("✓").green().bold(),
                    path.display()
                ),
                Err(err) => {
                    failed += 1;
                    println!("{} {}", style("✗").red().bold(), path.display());
                    print_failure(&err);
                }
            }
        }

        if failed > 0 {
            anyhow::bail!("{failed} of {} goldens failed", self.paths.len());
        }
        Ok(())
    }
}

#[derive(Parser)]
pub struct Remaster {
    /// Golden record file, rewritten in place
    #[arg(value_name = "PATH")]
    path: PathBuf,
}

impl Remaster {
    async fn execute(self) -> Result<()> {
        let before = Record::load(&self.path)
            .with_context(|| format!("Failed to read golden: {}", self.path.display()))?;
        let remastered = match rule_set(&before)? {
            RuleSet::Pig => remaster_golden(Pig, &self.path).await?,
        };
        println!(
            "{} {} (version {} -> {})",
            style("✓").green().bold(),
            self.path.display(),
            before.game().version,
            remastered.game().version
        );
        Ok(())
    }
}

enum RuleSet {
    Pig,
}

fn rule_set(record: &Record) -> Result<RuleSet> {
    match record.game().name.as_str() {
        pig::NAME => Ok(RuleSet::Pig),
        other => anyhow::bail!("No rule set registered for {other:?}"),
    }
}

async fn compare_one(path: &Path) -> Result<u64> {
    let record = Record::load(path)
        .with_context(|| format!("Failed to read golden: {}", path.display()))?;
    let version = match rule_set(&record)? {
        RuleSet::Pig => compare_golden(Pig, path).await?,
    };
    Ok(version)
}

fn print_failure(err: &anyhow::Error) {
    match err.downcast_ref::<GoldenError>() {
        Some(GoldenError::Mismatch {
            version,
            what,
            diff,
            log,
        }) => {
            println!("  {} {what}", style(format!("version {version}:")).yellow());
            for line in diff.lines() {
                println!("    {line}");
            }
            if !log.is_empty() {
                println!("  {}", style("turn log:").dim());
                for line in log.lines() {
                    println!("    {}", style(line).dim());
                }
            }
        }
        _ => println!("  {err:#}"),
    }
}
