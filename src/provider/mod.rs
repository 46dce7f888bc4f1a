//! Data provider abstraction.
//!
//! All remote access goes through the [`DataProvider`] trait so the
//! collection walker can be exercised against scripted in-memory providers
//! while production uses the HTTP-backed [`youtube::YouTubeProvider`].

pub mod youtube;

use async_trait::async_trait;

use crate::paginator::{Cursor, Page};
use crate::sources::SourceRef;
use crate::{CaptionTrackRecord, ChannelRecord, CommentThread, VideoRecord, VideoRef};

pub use youtube::YouTubeProvider;

/// Remote API methods and their fixed quota prices.
///
/// Costs are fixed per call regardless of page size, which is why detail
/// lookups are batched: fifty videos in one call cost the same unit as one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiMethod {
    /// Resolve a channel by id, handle or legacy username
    ChannelsList,
    /// Fetch one page of a channel's uploads playlist
    PlaylistItemsList,
    /// Fetch details for a batch of up to fifty videos
    VideosList,
    /// Fetch one page of comment threads with inline replies
    CommentThreadsList,
    /// List caption tracks for a video
    CaptionsList,
}

impl ApiMethod {
    /// Quota units charged for one call of this method
    pub fn quota_cost(&self) -> u64 {
        match self {
            ApiMethod::ChannelsList => 1,
            ApiMethod::PlaylistItemsList => 1,
            ApiMethod::VideosList => 1,
            ApiMethod::CommentThreadsList => 1,
            ApiMethod::CaptionsList => 50,
        }
    }
}

/// Errors surfaced by a data provider.
///
/// The walker branches on these variants, so classification happens here
/// rather than at call sites: transient variants are retried, quota ends
/// the run, `CommentsDisabled` is an expected per-video skip.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// The referenced channel, playlist or video does not exist
    #[error("resource not found")]
    NotFound,

    /// The request was rejected for reasons other than quota or comments
    #[error("access forbidden")]
    Forbidden,

    /// Comments are disabled for the requested video
    #[error("comments are disabled for this video")]
    CommentsDisabled,

    /// The provider reports the daily quota is spent
    #[error("provider daily quota exceeded")]
    QuotaExceeded,

    /// The provider asked us to slow down
    #[error("rate limited by provider")]
    RateLimited,

    /// The request timed out
    #[error("request timed out")]
    Timeout,

    /// An unexpected HTTP status
    #[error("unexpected HTTP status {0}")]
    Http(u16),

    /// A transport-level failure
    #[error("network error: {0}")]
    Network(String),

    /// The response body could not be interpreted
    #[error("malformed provider response: {0}")]
    Parse(String),
}

impl ProviderError {
    /// Whether retrying the same request can plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::RateLimited
            | ProviderError::Timeout
            | ProviderError::Network(_) => true,
            ProviderError::Http(status) => *status >= 500,
            ProviderError::NotFound
            | ProviderError::Forbidden
            | ProviderError::CommentsDisabled
            | ProviderError::QuotaExceeded
            | ProviderError::Parse(_) => false,
        }
    }
}

/// The remote operations the collection walker needs.
///
/// Implementations do not pace, retry or account quota themselves; the
/// walker layers those concerns on top of every call.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Resolve a channel reference to a full channel record, including the
    /// uploads playlist id needed to list its videos
    async fn resolve_channel(&self, reference: &SourceRef) -> Result<ChannelRecord, ProviderError>;

    /// Fetch one page of video references from an uploads playlist
    async fn list_videos(
        &self,
        uploads_playlist_id: &str,
        cursor: Option<Cursor>,
    ) -> Result<Page<VideoRef>, ProviderError>;

    /// Fetch full detail records for up to fifty video ids in one call
    async fn fetch_video_details(
        &self,
        video_ids: &[String],
    ) -> Result<Vec<VideoRecord>, ProviderError>;

    /// Fetch one page of comment threads for a video, replies inline
    async fn list_comment_threads(
        &self,
        video_id: &str,
        cursor: Option<Cursor>,
    ) -> Result<Page<CommentThread>, ProviderError>;

    /// List caption tracks for a video
    async fn list_caption_tracks(
        &self,
        video_id: &str,
    ) -> Result<Vec<CaptionTrackRecord>, ProviderError>;
}
