//! Record a scripted Pig game as a new golden
//!
//! Every seat plays the hold-at strategy: roll until the round score reaches
//! the threshold, then stop. The game is stored through a
//! `FileGameRepository`, so the result is a regular record file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use tracing::info;

use game_content::Pig;
use game_content::pig::{TARGET_SCORE, TURN_TIMER, bot};
use game_core::Variant;
use runtime::{FileGameRepository, GameManager, GameRepository, Record};

use crate::dirs;

/// Record a scripted Pig game
#[derive(Parser)]
pub struct RecordPig {
    /// Directory to write the record into (defaults to the platform data
    /// directory)
    #[arg(short, long, value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Number of seats
    #[arg(short, long, default_value_t = 2)]
    players: usize,

    /// Stop once the game reaches this version (or finishes)
    #[arg(short, long, default_value_t = 40)]
    min_version: u64,

    /// Round score at which every player stops rolling
    #[arg(long, default_value_t = 15)]
    hold_at: i64,

    /// Target score variant (100, 50 or 20)
    #[arg(long)]
    target_score: Option<String>,

    /// Turn timer variant (off, 30s or 120s)
    #[arg(long)]
    turn_timer: Option<String>,

    /// Description stored in the record
    #[arg(long)]
    description: Option<String>,
}

impl RecordPig {
    pub fn execute(self) -> Result<()> {
        tokio::runtime::Runtime::new()?.block_on(self.execute_async())
    }

    async fn execute_async(self) -> Result<()> {
        let dir = self.dir.clone().unwrap_or_else(dirs::goldens_dir);
        let repo = Arc::new(
            FileGameRepository::new(&dir)
                .with_context(|| format!("Failed to open directory: {}", dir.display()))?,
        );
        let shared: Arc<dyn GameRepository> = repo.clone();
        let manager = GameManager::new(Pig, shared)?;

        let mut variant = Variant::new();
        if let Some(target) = &self.target_score {
            variant.insert(TARGET_SCORE, target.as_str());
        }
        if let Some(timer) = &self.turn_timer {
            variant.insert(TURN_TIMER, timer.as_str());
        }

        let game = manager
            .new_game(Some(self.players), &variant, Vec::new())
            .await?;
        info!(target: "xtask", game_id = %game.id(), "recording pig game");

        loop {
            let version = game.version()?;
            if version >= self.min_version || game.finished()? {
                break;
            }
            let state = game.current_state()?;
            let Some((player, mv)) = bot::hold_at(&state, self.hold_at) else {
                anyhow::bail!("No scripted move at version {version}");
            };
            game.propose_move(mv, player).await?;
        }
        manager.shutdown().await?;

        let path = repo.record_path(game.id());
        if let Some(description) = &self.description {
            let mut record = Record::load(&path)?;
            record.set_description(description.as_str());
            record.save(&path)?;
        }

        let record = game.record()?;
        println!(
            "{} {} (version {}{})",
            style("✓").green().bold(),
            path.display(),
            record.version,
            if record.finished { ", finished" } else { "" }
        );
        Ok(())
    }
}
