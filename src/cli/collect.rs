//! CLI definitions and the collect command.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use crate::checkpoint::CheckpointManager;
use crate::collector::{CollectorConfig, EntityWalker};
use crate::provider::YouTubeProvider;
use crate::retry::RetryPolicy;
use crate::shutdown::SharedShutdown;
use crate::sources::load_sources;
use crate::store::SqliteStore;

use super::{CliError, SourcesCommand};

/// Quota-aware, checkpointed collector for YouTube channel, video and
/// comment data
#[derive(Debug, Parser)]
#[command(name = "youtube-data-collector", version, about)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Collect channels, videos, comments and caption tracks
    Collect(CollectArgs),
    /// Inspect and validate source lists
    Sources(SourcesCommand),
}

/// How to treat an existing checkpoint on startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ResumeMode {
    /// Resume from the checkpoint if one exists
    On,
    /// Ignore any checkpoint and start from the first source
    Off,
    /// Delete the checkpoint, then start from the first source
    Reset,
    /// Print the checkpoint and exit without collecting
    Verify,
}

/// Arguments for the collect command
#[derive(Debug, Args)]
pub struct CollectArgs {
    /// Path to the source CSV (must have a 'url' column)
    #[arg(long)]
    pub sources: PathBuf,

    /// Path to the SQLite database file
    #[arg(long, default_value = "data/collection.db")]
    pub db: PathBuf,

    /// API key; falls back to the YOUTUBE_API_KEY environment variable
    #[arg(long)]
    pub api_key: Option<String>,

    /// Maximum sources to process this run
    #[arg(long)]
    pub max_channels: Option<usize>,

    /// Maximum videos to collect per channel
    #[arg(long)]
    pub max_videos: Option<usize>,

    /// Maximum comment threads to collect per video
    #[arg(long)]
    pub max_comments: Option<usize>,

    /// Daily quota budget in units
    #[arg(long, default_value_t = crate::quota::DEFAULT_DAILY_QUOTA)]
    pub daily_quota: u64,

    /// Safety buffer kept below the quota budget
    #[arg(long, default_value_t = crate::quota::DEFAULT_QUOTA_BUFFER)]
    pub quota_buffer: u64,

    /// Directory for checkpoint files
    #[arg(long, default_value = "data/checkpoints")]
    pub checkpoint_dir: PathBuf,

    /// Sources processed between periodic checkpoints
    #[arg(long, default_value_t = crate::collector::DEFAULT_CHECKPOINT_EVERY)]
    pub checkpoint_every: usize,

    /// Checkpoint handling on startup
    #[arg(long, value_enum, default_value = "on")]
    pub resume: ResumeMode,

    /// Start with a fresh quota budget instead of the checkpointed
    /// consumption (use after the provider's daily quota reset)
    #[arg(long)]
    pub fresh_quota: bool,

    /// Skip caption-track collection (the priciest quota call)
    #[arg(long)]
    pub skip_captions: bool,

    /// Consecutive source failures that stop the run; 0 disables
    #[arg(long, default_value_t = crate::stats::DEFAULT_FAILURE_THRESHOLD)]
    pub failure_threshold: u32,

    /// Maximum attempts per remote call
    #[arg(long, default_value_t = crate::retry::DEFAULT_MAX_ATTEMPTS)]
    pub max_retries: u32,
}

impl CollectArgs {
    fn config(&self) -> CollectorConfig {
        CollectorConfig {
            daily_quota: self.daily_quota,
            quota_buffer: self.quota_buffer,
            max_channels: self.max_channels,
            max_videos_per_channel: self.max_videos,
            max_comments_per_video: self.max_comments,
            checkpoint_every: self.checkpoint_every,
            retry: RetryPolicy {
                max_attempts: self.max_retries,
                initial_backoff: Duration::from_millis(1000),
                max_backoff: Duration::from_secs(30),
            },
            skip_captions: self.skip_captions,
            failure_threshold: self.failure_threshold,
            ..CollectorConfig::default()
        }
    }

    /// Execute the collect command
    pub async fn execute(&self, shutdown: SharedShutdown) -> Result<(), CliError> {
        let api_key = self
            .api_key
            .clone()
            .or_else(|| std::env::var("YOUTUBE_API_KEY").ok())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                CliError::Configuration(
                    "no API key: pass --api-key or set YOUTUBE_API_KEY".to_string(),
                )
            })?;

        let manager = CheckpointManager::new(self.checkpoint_dir.clone());

        if self.resume == ResumeMode::Verify {
            return self.verify_checkpoint(&manager);
        }

        let sources = load_sources(&self.sources)?;
        if sources.is_empty() {
            return Err(CliError::InvalidArgument(format!(
                "source list {} contains no usable rows",
                self.sources.display()
            )));
        }
        info!(sources = sources.len(), db = %self.db.display(), "Loaded source list");

        let provider = YouTubeProvider::new(api_key);
        let store = SqliteStore::open(&self.db)?;

        let mut walker = EntityWalker::new(&provider, &store, self.config())
            .with_checkpoints(manager.clone())
            .with_shutdown(shutdown);

        match self.resume {
            ResumeMode::On => {
                if let Some(checkpoint) = manager.load()? {
                    walker = walker.resume_from(checkpoint, !self.fresh_quota);
                }
            }
            ResumeMode::Reset => {
                warn!("Resetting checkpoint, starting from the first source");
                manager.clear()?;
            }
            ResumeMode::Off | ResumeMode::Verify => {}
        }

        let record = walker.run(&sources).await?;

        println!("Run {}", record.status.as_str());
        println!(
            "  channels: {} processed, {} succeeded, {} failed",
            record.stats.channels_processed,
            record.stats.channels_succeeded,
            record.stats.channels_failed
        );
        println!(
            "  collected: {} videos, {} comments, {} caption tracks",
            record.stats.videos_collected,
            record.stats.comments_collected,
            record.stats.caption_tracks_collected
        );
        println!(
            "  skipped: {} comments-disabled videos, {} integrity failures",
            record.stats.comments_disabled_skips, record.stats.integrity_skips
        );
        println!("  quota used: {} units", record.stats.quota_used);
        Ok(())
    }

    fn verify_checkpoint(&self, manager: &CheckpointManager) -> Result<(), CliError> {
        match manager.load()? {
            Some(checkpoint) => {
                println!("Checkpoint at {}", manager.checkpoint_path().display());
                println!("  next source index: {}", checkpoint.source_index);
                match &checkpoint.video_cursor {
                    Some(cursor) => println!("  mid-source video cursor: {}", cursor.as_str()),
                    None => println!("  at source boundary"),
                }
                println!("  videos completed in current source: {}", checkpoint.videos_completed);
                println!("  quota consumed: {} units", checkpoint.quota_consumed);
                println!(
                    "  progress: {} channels, {} videos, {} comments",
                    checkpoint.stats.channels_processed,
                    checkpoint.stats.videos_collected,
                    checkpoint.stats.comments_collected
                );
            }
            None => {
                println!(
                    "No checkpoint at {}",
                    manager.checkpoint_path().display()
                );
            }
        }
        Ok(())
    }
}
