//! Collection run configuration.

use std::collections::HashMap;
use std::time::Duration;

use crate::pacing::{
    OperationClass, RateGovernor, DEFAULT_CAPTION_INTERVAL, DEFAULT_CHANNEL_INTERVAL,
    DEFAULT_COMMENT_PAGE_INTERVAL, DEFAULT_VIDEO_DETAIL_INTERVAL, DEFAULT_VIDEO_PAGE_INTERVAL,
};
use crate::quota::{QuotaLedger, DEFAULT_DAILY_QUOTA, DEFAULT_QUOTA_BUFFER};
use crate::retry::RetryPolicy;
use crate::stats::DEFAULT_FAILURE_THRESHOLD;

/// How many sources are processed between periodic checkpoints
pub const DEFAULT_CHECKPOINT_EVERY: usize = 10;

/// Tunable parameters for a collection run.
///
/// Defaults match the standard API quota and polite pacing; tests swap in
/// an unthrottled governor and a tiny quota budget instead.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Daily quota budget in units
    pub daily_quota: u64,
    /// Safety buffer kept below the budget
    pub quota_buffer: u64,
    /// Maximum sources processed this run; `None` means all
    pub max_channels: Option<usize>,
    /// Maximum videos collected per channel; `None` means all
    pub max_videos_per_channel: Option<usize>,
    /// Maximum comment threads collected per video; `None` means all
    pub max_comments_per_video: Option<usize>,
    /// Sources processed between periodic checkpoints
    pub checkpoint_every: usize,
    /// Minimum interval between channel resolutions
    pub channel_interval: Duration,
    /// Minimum interval between video listing pages
    pub video_page_interval: Duration,
    /// Minimum interval between video detail batches
    pub video_detail_interval: Duration,
    /// Minimum interval between comment thread pages
    pub comment_page_interval: Duration,
    /// Minimum interval between caption lookups
    pub caption_interval: Duration,
    /// Retry behavior for transient provider failures
    pub retry: RetryPolicy,
    /// Skip caption-track collection entirely (it is the priciest call)
    pub skip_captions: bool,
    /// Consecutive source failures that trip the circuit breaker;
    /// 0 disables it
    pub failure_threshold: u32,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            daily_quota: DEFAULT_DAILY_QUOTA,
            quota_buffer: DEFAULT_QUOTA_BUFFER,
            max_channels: None,
            max_videos_per_channel: None,
            max_comments_per_video: None,
            checkpoint_every: DEFAULT_CHECKPOINT_EVERY,
            channel_interval: DEFAULT_CHANNEL_INTERVAL,
            video_page_interval: DEFAULT_VIDEO_PAGE_INTERVAL,
            video_detail_interval: DEFAULT_VIDEO_DETAIL_INTERVAL,
            comment_page_interval: DEFAULT_COMMENT_PAGE_INTERVAL,
            caption_interval: DEFAULT_CAPTION_INTERVAL,
            retry: RetryPolicy::default(),
            skip_captions: false,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }
}

impl CollectorConfig {
    /// Configuration for tests: no pacing, no retries, tiny checkpoints
    pub fn for_tests() -> Self {
        Self {
            channel_interval: Duration::ZERO,
            video_page_interval: Duration::ZERO,
            video_detail_interval: Duration::ZERO,
            comment_page_interval: Duration::ZERO,
            caption_interval: Duration::ZERO,
            retry: RetryPolicy::no_retries(),
            ..Self::default()
        }
    }

    /// Build the rate governor for this configuration
    pub fn governor(&self) -> RateGovernor {
        let mut intervals = HashMap::new();
        intervals.insert(OperationClass::ChannelResolution, self.channel_interval);
        intervals.insert(OperationClass::VideoPage, self.video_page_interval);
        intervals.insert(OperationClass::VideoDetailBatch, self.video_detail_interval);
        intervals.insert(OperationClass::CommentPage, self.comment_page_interval);
        intervals.insert(OperationClass::CaptionLookup, self.caption_interval);
        RateGovernor::new(intervals)
    }

    /// Build a fresh quota ledger for this configuration
    pub fn ledger(&self) -> QuotaLedger {
        QuotaLedger::new(self.daily_quota, self.quota_buffer)
    }
}
