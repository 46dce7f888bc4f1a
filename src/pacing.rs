//! Per-operation-class request pacing.
//!
//! Quota accounting alone is not enough to be a polite API citizen: the
//! provider also rate-limits bursts. The governor enforces a minimum
//! interval between consecutive calls of the same class, while calls of
//! different classes never delay each other.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

/// Default minimum interval between channel resolution calls
pub const DEFAULT_CHANNEL_INTERVAL: Duration = Duration::from_millis(2000);

/// Default minimum interval between video listing pages
pub const DEFAULT_VIDEO_PAGE_INTERVAL: Duration = Duration::from_millis(300);

/// Default minimum interval between video detail batches
pub const DEFAULT_VIDEO_DETAIL_INTERVAL: Duration = Duration::from_millis(300);

/// Default minimum interval between comment thread pages
pub const DEFAULT_COMMENT_PAGE_INTERVAL: Duration = Duration::from_millis(1000);

/// Default minimum interval between caption track lookups
pub const DEFAULT_CAPTION_INTERVAL: Duration = Duration::from_millis(500);

/// Classes of remote operation paced independently of each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    /// Resolving a source URL to a channel record
    ChannelResolution,
    /// Fetching a page of a channel's upload listing
    VideoPage,
    /// Fetching a batch of video detail records
    VideoDetailBatch,
    /// Fetching a page of comment threads
    CommentPage,
    /// Listing caption tracks for a video
    CaptionLookup,
}

/// Enforces a minimum interval between consecutive calls per operation class.
///
/// Each class tracks its own last-call instant; the slot for the next call
/// is reserved under the lock before sleeping, so concurrent waiters of the
/// same class queue up one interval apart instead of stampeding.
#[derive(Debug)]
pub struct RateGovernor {
    intervals: HashMap<OperationClass, Duration>,
    last_call: Mutex<HashMap<OperationClass, Instant>>,
}

impl RateGovernor {
    /// Create a governor with explicit per-class intervals.
    /// Classes absent from the map are unthrottled.
    pub fn new(intervals: HashMap<OperationClass, Duration>) -> Self {
        Self {
            intervals,
            last_call: Mutex::new(HashMap::new()),
        }
    }

    /// Governor with the default interval for every class
    pub fn with_defaults() -> Self {
        let mut intervals = HashMap::new();
        intervals.insert(OperationClass::ChannelResolution, DEFAULT_CHANNEL_INTERVAL);
        intervals.insert(OperationClass::VideoPage, DEFAULT_VIDEO_PAGE_INTERVAL);
        intervals.insert(OperationClass::VideoDetailBatch, DEFAULT_VIDEO_DETAIL_INTERVAL);
        intervals.insert(OperationClass::CommentPage, DEFAULT_COMMENT_PAGE_INTERVAL);
        intervals.insert(OperationClass::CaptionLookup, DEFAULT_CAPTION_INTERVAL);
        Self::new(intervals)
    }

    /// Governor that never delays, for tests and dry runs
    pub fn unthrottled() -> Self {
        Self::new(HashMap::new())
    }

    /// Wait until a call of `class` is allowed, reserving the slot.
    ///
    /// Returns immediately when the class has no configured interval or
    /// the interval has already elapsed since the previous call.
    pub async fn wait_for(&self, class: OperationClass) {
        let interval = match self.intervals.get(&class) {
            Some(interval) if !interval.is_zero() => *interval,
            _ => return,
        };

        let now = Instant::now();
        let scheduled = {
            let mut last = match self.last_call.lock() {
                Ok(guard) => guard,
                // A poisoned lock only loses pacing history, never correctness
                Err(poisoned) => poisoned.into_inner(),
            };
            let slot = match last.get(&class) {
                Some(prev) => {
                    let earliest = *prev + interval;
                    if earliest > now {
                        earliest
                    } else {
                        now
                    }
                }
                None => now,
            };
            last.insert(class, slot);
            slot
        };

        if scheduled > now {
            trace!(?class, delay_ms = (scheduled - now).as_millis() as u64, "Pacing delay");
            tokio::time::sleep_until(scheduled).await;
        }
    }
}
