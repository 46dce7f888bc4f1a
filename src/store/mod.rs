//! Idempotent persistence layer.
//!
//! Entities are upserted by their provider-issued identifier, so replaying
//! a page after a resume overwrites rows instead of duplicating them. The
//! store enforces the parent-before-child hierarchy: a child referencing a
//! parent the store has never seen is an integrity violation, reported so
//! the caller can skip the record and count it.

pub mod memory;
pub mod sqlite;

use crate::stats::RunRecord;
use crate::{CaptionTrackRecord, ChannelRecord, CommentRecord, VideoRecord};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Identifier of a collection run row
pub type RunId = i64;

/// Errors raised by a store backend
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A record references a parent the store has never seen
    #[error("integrity violation: {child} '{child_id}' references missing {parent} '{parent_id}'")]
    IntegrityViolation {
        /// Kind of the offending record
        child: &'static str,
        /// Identifier of the offending record
        child_id: String,
        /// Kind of the missing parent
        parent: &'static str,
        /// Identifier of the missing parent
        parent_id: String,
    },

    /// The record failed validation before reaching the backend
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// The referenced run does not exist
    #[error("unknown run id {0}")]
    UnknownRun(RunId),

    /// A backend-level failure
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Idempotent persistence operations for the collection hierarchy.
///
/// Implementations are synchronous; the walker calls them between awaits
/// and each call is a single short transaction.
pub trait Store: Send + Sync {
    /// Insert or overwrite a channel by `channel_id`
    fn upsert_channel(&self, channel: &ChannelRecord) -> Result<(), StoreError>;

    /// Insert or overwrite a video by `video_id`.
    /// Fails with an integrity violation if the owning channel is unknown.
    fn upsert_video(&self, video: &VideoRecord) -> Result<(), StoreError>;

    /// Insert or overwrite a comment by `comment_id`.
    /// Fails with an integrity violation if the owning video is unknown,
    /// or if a reply names a parent comment that was never persisted.
    fn upsert_comment(&self, comment: &CommentRecord) -> Result<(), StoreError>;

    /// Insert or overwrite a caption track by `caption_id`.
    /// Fails with an integrity violation if the owning video is unknown.
    fn upsert_caption_track(&self, track: &CaptionTrackRecord) -> Result<(), StoreError>;

    /// Record the start of a collection run, returning its identifier
    fn begin_run(&self, record: &RunRecord) -> Result<RunId, StoreError>;

    /// Record the final state of a collection run
    fn finish_run(&self, run_id: RunId, record: &RunRecord) -> Result<(), StoreError>;
}
