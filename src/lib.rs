//! # YouTube Data Collector Library
//!
//! A quota-aware, checkpointed collector for hierarchical YouTube data:
//! channels, their videos, the comment threads under each video, and
//! caption-track metadata. Designed for long-running batch collection
//! against the quota-limited YouTube Data API v3.
//!
//! ## Features
//!
//! - **Quota Budgeting**: every remote call is gated by a daily quota ledger
//!   with a configurable safety buffer
//! - **Resume Capability**: periodic checkpointing lets interrupted runs
//!   continue without re-collecting persisted data
//! - **Rate Pacing**: minimum inter-call delays per operation class
//! - **Idempotent Persistence**: channels, videos, comments and caption
//!   tracks are upserted by identifier, so re-runs never duplicate rows
//! - **Circuit Breaker**: a run halts early after too many consecutive
//!   source failures instead of burning quota on a broken input set
//!
//! ## Quick Start
//!
//! ```no_run
//! use youtube_data_collector::collector::{CollectorConfig, EntityWalker};
//! use youtube_data_collector::provider::YouTubeProvider;
//! use youtube_data_collector::sources::load_sources;
//! use youtube_data_collector::store::SqliteStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let sources = load_sources("sources.csv".as_ref())?;
//! let provider = YouTubeProvider::new("API_KEY".to_string());
//! let store = SqliteStore::open("data/collection.db".as_ref())?;
//! let config = CollectorConfig::default();
//!
//! let mut walker = EntityWalker::new(&provider, &store, config);
//! let record = walker.run(&sources).await?;
//! println!("run finished: {:?}", record.status);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several core modules:
//!
//! - [`sources`] - Source CSV loading and channel reference extraction
//! - [`provider`] - Typed YouTube Data API operations and error taxonomy
//! - [`quota`] - Daily quota ledger gating every remote call
//! - [`pacing`] - Minimum inter-call delays per operation class
//! - [`paginator`] - Generic cursor-driven pagination with resume support
//! - [`retry`] - Bounded retry with exponential backoff for transient errors
//! - [`collector`] - The traversal state machine driving collection
//! - [`checkpoint`] - Durable, atomically written progress snapshots
//! - [`store`] - Idempotent persistence (SQLite and in-memory)
//! - [`stats`] - Run statistics and the consecutive-failure tracker
//!
//! ## Data Model
//!
//! Entities form a strict hierarchy: a [`sources::Source`] resolves to one
//! [`ChannelRecord`], a channel owns many [`VideoRecord`]s, a video owns many
//! [`CommentRecord`]s. Comments form two-level threads only: a reply carries
//! the identifier of its top-level parent, never deeper nesting.

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Durable, atomically written progress snapshots
pub mod checkpoint;

/// CLI command implementations
pub mod cli;

/// Traversal state machine and run configuration
pub mod collector;

/// Rate pacing between remote calls
pub mod pacing;

/// Generic cursor-driven pagination
pub mod paginator;

/// Typed data-provider operations
pub mod provider;

/// Daily quota ledger
pub mod quota;

/// Bounded retry with exponential backoff
pub mod retry;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// Source CSV loading and channel reference extraction
pub mod sources;

/// Run statistics and failure tracking
pub mod stats;

/// Idempotent persistence layer
pub mod store;

// Re-export commonly used types
pub use collector::EntityWalker;
pub use quota::QuotaLedger;

/// A resolved channel with its aggregate counters.
///
/// Fetched once per run when a source resolves successfully, then persisted
/// immediately. Counters are a snapshot taken at collection time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelRecord {
    /// Stable channel identifier (e.g. "UC...")
    pub channel_id: String,
    /// Channel title
    pub title: String,
    /// Channel description
    pub description: Option<String>,
    /// Custom URL / handle, if the channel has one
    pub custom_url: Option<String>,
    /// Channel creation timestamp (RFC 3339)
    pub published_at: Option<String>,
    /// Declared country, if any
    pub country: Option<String>,
    /// Subscriber count (hidden channels report none)
    pub subscriber_count: Option<u64>,
    /// Total uploaded video count
    pub video_count: Option<u64>,
    /// Total channel view count
    pub view_count: Option<u64>,
    /// Identifier of the channel's uploads playlist, used for video
    /// enumeration
    pub uploads_playlist_id: String,
    /// The source URL this channel was resolved from
    pub source_url: Option<String>,
    /// Arbitrary metadata preserved from the source row
    pub source_metadata: BTreeMap<String, String>,
}

impl ChannelRecord {
    /// Validate channel data integrity
    pub fn validate(&self) -> Result<(), String> {
        if self.channel_id.is_empty() {
            return Err("Channel ID cannot be empty".to_string());
        }
        if self.uploads_playlist_id.is_empty() {
            return Err(format!(
                "Channel {} has no uploads playlist",
                self.channel_id
            ));
        }
        Ok(())
    }
}

/// A lightweight video reference returned by video-list pagination.
///
/// Carries just enough to drive the detail-batch lookup; full records come
/// from [`provider::DataProvider::fetch_video_details`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoRef {
    /// Stable video identifier
    pub video_id: String,
    /// Publication timestamp (RFC 3339)
    pub published_at: String,
}

/// A video with its engagement-counter snapshot.
///
/// Belongs to exactly one channel. Counters are valid only at collection
/// time; re-runs overwrite the row rather than updating it in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoRecord {
    /// Stable video identifier
    pub video_id: String,
    /// Owning channel identifier
    pub channel_id: String,
    /// Video title
    pub title: String,
    /// Video description
    pub description: Option<String>,
    /// Publication timestamp (RFC 3339)
    pub published_at: String,
    /// ISO 8601 duration string (e.g. "PT4M13S")
    pub duration: Option<String>,
    /// View count at collection time
    pub view_count: Option<u64>,
    /// Like count at collection time
    pub like_count: Option<u64>,
    /// Comment count at collection time
    pub comment_count: Option<u64>,
    /// Video tags
    pub tags: Vec<String>,
    /// Whether the provider reports caption availability
    pub has_captions: bool,
    /// Thumbnail URL, if any
    pub thumbnail_url: Option<String>,
}

impl VideoRecord {
    /// Validate video data integrity
    pub fn validate(&self) -> Result<(), String> {
        if self.video_id.is_empty() {
            return Err("Video ID cannot be empty".to_string());
        }
        if self.channel_id.is_empty() {
            return Err(format!("Video {} has no channel", self.video_id));
        }
        Ok(())
    }
}

/// A single comment, either top-level or a reply.
///
/// Replies carry the identifier of their top-level parent; threads are
/// strictly two levels deep, so a reply's parent is never itself a reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommentRecord {
    /// Stable comment identifier
    pub comment_id: String,
    /// Owning video identifier
    pub video_id: String,
    /// Parent comment identifier; None for top-level comments
    pub parent_id: Option<String>,
    /// Author display name
    pub author: Option<String>,
    /// Author channel identifier, if exposed
    pub author_channel_id: Option<String>,
    /// Comment text (plain text)
    pub text: String,
    /// Like count at collection time
    pub like_count: u64,
    /// Number of replies (always 0 for replies themselves)
    pub reply_count: u64,
    /// Publication timestamp (RFC 3339)
    pub published_at: String,
    /// Last-edit timestamp (RFC 3339)
    pub updated_at: String,
}

impl CommentRecord {
    /// Whether this comment is a reply to a top-level comment
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Validate comment data integrity
    pub fn validate(&self) -> Result<(), String> {
        if self.comment_id.is_empty() {
            return Err("Comment ID cannot be empty".to_string());
        }
        if self.video_id.is_empty() {
            return Err(format!("Comment {} has no video", self.comment_id));
        }
        if let Some(parent) = &self.parent_id {
            if parent == &self.comment_id {
                return Err(format!(
                    "Comment {} cannot be its own parent",
                    self.comment_id
                ));
            }
            if self.reply_count != 0 {
                return Err(format!(
                    "Reply {} cannot itself carry replies (threads are two-level)",
                    self.comment_id
                ));
            }
        }
        Ok(())
    }
}

/// A top-level comment plus the bounded reply list the provider returns
/// inline with it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommentThread {
    /// The top-level comment
    pub top_level: CommentRecord,
    /// Replies returned inline with the thread, in provider order
    pub replies: Vec<CommentRecord>,
}

impl CommentThread {
    /// Total comments carried by this thread (top-level plus replies)
    pub fn total_comments(&self) -> usize {
        1 + self.replies.len()
    }
}

/// Caption-track metadata for a video.
///
/// Metadata only: transcript content requires OAuth and is out of scope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptionTrackRecord {
    /// Stable caption-track identifier
    pub caption_id: String,
    /// Owning video identifier
    pub video_id: String,
    /// Track language code (e.g. "en")
    pub language: String,
    /// Human-readable track name, if set
    pub name: Option<String>,
    /// Track kind reported by the provider (e.g. "asr" for auto-generated)
    pub track_kind: Option<String>,
    /// Whether the track is auto-generated
    pub auto_generated: bool,
}

impl CaptionTrackRecord {
    /// Validate caption-track data integrity
    pub fn validate(&self) -> Result<(), String> {
        if self.caption_id.is_empty() {
            return Err("Caption ID cannot be empty".to_string());
        }
        if self.video_id.is_empty() {
            return Err(format!("Caption {} has no video", self.caption_id));
        }
        Ok(())
    }
}
