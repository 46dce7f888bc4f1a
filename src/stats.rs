//! Run statistics, outcome classification and the consecutive-failure
//! circuit breaker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Default number of consecutive source failures that trips the breaker
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Counters accumulated over a collection run.
///
/// Serializable so checkpoints can carry partial progress and the run
/// record in the store can report final totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Sources attempted so far
    pub channels_processed: u64,
    /// Sources fully collected
    pub channels_succeeded: u64,
    /// Sources that failed permanently
    pub channels_failed: u64,
    /// Video records persisted
    pub videos_collected: u64,
    /// Comment records persisted, top-level and replies
    pub comments_collected: u64,
    /// Caption track records persisted
    pub caption_tracks_collected: u64,
    /// Videos skipped because the channel owner disabled comments
    pub comments_disabled_skips: u64,
    /// Records dropped for referencing a missing parent
    pub integrity_skips: u64,
    /// Quota units consumed
    pub quota_used: u64,
    /// Current streak of back-to-back source failures
    pub consecutive_failures: u32,
}

impl RunStats {
    /// Record one fully collected source, resetting the failure streak
    pub fn record_source_success(&mut self) {
        self.channels_processed += 1;
        self.channels_succeeded += 1;
        self.consecutive_failures = 0;
    }

    /// Record one permanently failed source, extending the failure streak
    pub fn record_source_failure(&mut self) {
        self.channels_processed += 1;
        self.channels_failed += 1;
        self.consecutive_failures += 1;
    }

    /// Log a one-line progress summary at info level
    pub fn log_progress(&self) {
        info!(
            channels = self.channels_processed,
            succeeded = self.channels_succeeded,
            failed = self.channels_failed,
            videos = self.videos_collected,
            comments = self.comments_collected,
            captions = self.caption_tracks_collected,
            quota_used = self.quota_used,
            "Collection progress"
        );
    }
}

/// Trips when too many sources fail back to back.
///
/// A long streak of consecutive failures usually means something systemic
/// (revoked key, network partition, provider outage), so the run stops
/// instead of burning quota on every remaining source.
#[derive(Debug, Clone, Copy)]
pub struct FailureTracker {
    threshold: u32,
}

impl FailureTracker {
    /// Tracker tripping at `threshold` consecutive failures
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    /// Whether the current failure streak has reached the threshold
    pub fn is_tripped(&self, stats: &RunStats) -> bool {
        self.threshold > 0 && stats.consecutive_failures >= self.threshold
    }
}

impl Default for FailureTracker {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD)
    }
}

/// Terminal classification of a collection run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run is still in progress
    Running,
    /// All sources processed
    Completed,
    /// Stopped early because the quota ledger refused a reservation
    QuotaExhausted,
    /// Stopped early because the failure streak reached the threshold
    CircuitBreakerTripped,
    /// Stopped early on operator shutdown request
    Interrupted,
    /// Aborted by an unrecoverable error
    Failed,
}

impl RunStatus {
    /// Stable lowercase label for persistence and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::QuotaExhausted => "quota_exhausted",
            RunStatus::CircuitBreakerTripped => "circuit_breaker_tripped",
            RunStatus::Interrupted => "interrupted",
            RunStatus::Failed => "failed",
        }
    }
}

/// Final report for one collection run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run ended, `None` while running
    pub ended_at: Option<DateTime<Utc>>,
    /// Terminal classification
    pub status: RunStatus,
    /// Accumulated counters
    pub stats: RunStats,
}

impl RunRecord {
    /// A freshly started run
    pub fn started_now() -> Self {
        Self {
            started_at: Utc::now(),
            ended_at: None,
            status: RunStatus::Running,
            stats: RunStats::default(),
        }
    }

    /// Close the run with `status` and the final counters
    pub fn finish(&mut self, status: RunStatus, stats: RunStats) {
        self.ended_at = Some(Utc::now());
        self.status = status;
        self.stats = stats;
    }
}
