//! YouTube Data API v3 provider backed by reqwest.
//!
//! Each trait operation maps to one API method with a fixed `part` set.
//! Numeric counters arrive as JSON strings and are parsed leniently: a
//! hidden or absent counter becomes `None`, never an error.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::paginator::{Cursor, Page};
use crate::sources::SourceRef;
use crate::{CaptionTrackRecord, ChannelRecord, CommentRecord, CommentThread, VideoRecord, VideoRef};

use super::{DataProvider, ProviderError};

/// Production API endpoint
const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Request timeout for every API call
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size requested from listing endpoints (the API maximum)
const PAGE_SIZE: u32 = 50;

/// Maximum video ids per detail batch (the API maximum)
pub const DETAIL_BATCH_SIZE: usize = 50;

/// HTTP-backed [`DataProvider`] for the YouTube Data API v3
pub struct YouTubeProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl YouTubeProvider {
    /// Create a provider using the production endpoint
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    /// Create a provider against an alternate endpoint
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            // Building with static options only fails on TLS backend
            // misconfiguration, caught by the fallback default client
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            api_key,
            base_url,
        }
    }

    /// Issue a GET and decode the JSON body, translating HTTP failures into
    /// the provider error taxonomy
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        method_path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}/{}", self.base_url, method_path);
        let response = self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .query(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_error(status.as_u16(), &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }
}

/// Map an HTTP error status and its JSON body to a provider error.
///
/// 403 is ambiguous at the status level; the error `reason` distinguishes
/// disabled comments (an expected skip) from quota exhaustion (ends the
/// run) from genuine access denial.
fn classify_http_error(status: u16, body: &str) -> ProviderError {
    match status {
        404 => ProviderError::NotFound,
        429 => ProviderError::RateLimited,
        403 => {
            let reason = serde_json::from_str::<ErrorEnvelope>(body)
                .ok()
                .and_then(|e| e.error.errors.into_iter().next())
                .map(|d| d.reason)
                .unwrap_or_default();
            match reason.as_str() {
                "commentsDisabled" => ProviderError::CommentsDisabled,
                "quotaExceeded" | "dailyLimitExceeded" | "rateLimitExceeded" => {
                    ProviderError::QuotaExceeded
                }
                other => {
                    warn!(reason = other, "Forbidden response from provider");
                    ProviderError::Forbidden
                }
            }
        }
        status => ProviderError::Http(status),
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: String,
}

/// Parse a counter the API serializes as a decimal string
fn parse_count(value: Option<&String>) -> Option<u64> {
    value.and_then(|v| v.parse().ok())
}

// -- channels.list ----------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChannelListResponse {
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    id: String,
    snippet: ChannelSnippet,
    #[serde(default)]
    statistics: Option<ChannelStatistics>,
    #[serde(rename = "contentDetails")]
    content_details: ChannelContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelSnippet {
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    custom_url: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelStatistics {
    #[serde(default)]
    subscriber_count: Option<String>,
    #[serde(default)]
    hidden_subscriber_count: bool,
    #[serde(default)]
    video_count: Option<String>,
    #[serde(default)]
    view_count: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelContentDetails {
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    #[serde(default)]
    uploads: Option<String>,
}

fn channel_from_item(item: ChannelItem) -> Result<ChannelRecord, ProviderError> {
    let uploads_playlist_id = item
        .content_details
        .related_playlists
        .uploads
        .filter(|u| !u.is_empty())
        .ok_or_else(|| {
            ProviderError::Parse(format!("channel {} has no uploads playlist", item.id))
        })?;
    let statistics = item.statistics;
    let subscriber_count = statistics.as_ref().and_then(|s| {
        if s.hidden_subscriber_count {
            None
        } else {
            parse_count(s.subscriber_count.as_ref())
        }
    });
    Ok(ChannelRecord {
        channel_id: item.id,
        title: item.snippet.title,
        description: item.snippet.description,
        custom_url: item.snippet.custom_url,
        published_at: item.snippet.published_at,
        country: item.snippet.country,
        subscriber_count,
        video_count: statistics.as_ref().and_then(|s| parse_count(s.video_count.as_ref())),
        view_count: statistics.as_ref().and_then(|s| parse_count(s.view_count.as_ref())),
        uploads_playlist_id,
        source_url: None,
        source_metadata: Default::default(),
    })
}

// -- playlistItems.list -----------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemsResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    content_details: PlaylistItemContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemContentDetails {
    video_id: String,
    #[serde(default)]
    video_published_at: Option<String>,
}

// -- videos.list ------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: VideoSnippet,
    #[serde(default)]
    content_details: Option<VideoContentDetails>,
    #[serde(default)]
    statistics: Option<VideoStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    channel_id: String,
    title: String,
    #[serde(default)]
    description: Option<String>,
    published_at: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    #[serde(default)]
    high: Option<Thumbnail>,
    #[serde(default)]
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct VideoContentDetails {
    #[serde(default)]
    duration: Option<String>,
    #[serde(default)]
    caption: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    #[serde(default)]
    view_count: Option<String>,
    #[serde(default)]
    like_count: Option<String>,
    #[serde(default)]
    comment_count: Option<String>,
}

fn video_from_item(item: VideoItem) -> VideoRecord {
    let thumbnail_url = item
        .snippet
        .thumbnails
        .high
        .or(item.snippet.thumbnails.default)
        .map(|t| t.url);
    let has_captions = item
        .content_details
        .as_ref()
        .and_then(|d| d.caption.as_deref())
        .map(|c| c == "true")
        .unwrap_or(false);
    VideoRecord {
        video_id: item.id,
        channel_id: item.snippet.channel_id,
        title: item.snippet.title,
        description: item.snippet.description,
        published_at: item.snippet.published_at,
        duration: item.content_details.and_then(|d| d.duration),
        view_count: item.statistics.as_ref().and_then(|s| parse_count(s.view_count.as_ref())),
        like_count: item.statistics.as_ref().and_then(|s| parse_count(s.like_count.as_ref())),
        comment_count: item
            .statistics
            .as_ref()
            .and_then(|s| parse_count(s.comment_count.as_ref())),
        tags: item.snippet.tags,
        has_captions,
        thumbnail_url,
    }
}

// -- commentThreads.list ----------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentThreadsResponse {
    #[serde(default)]
    items: Vec<CommentThreadItem>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentThreadItem {
    snippet: CommentThreadSnippet,
    #[serde(default)]
    replies: Option<CommentReplies>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentThreadSnippet {
    top_level_comment: CommentItem,
    #[serde(default)]
    total_reply_count: u64,
}

#[derive(Debug, Deserialize)]
struct CommentReplies {
    #[serde(default)]
    comments: Vec<CommentItem>,
}

#[derive(Debug, Deserialize)]
struct CommentItem {
    id: String,
    snippet: CommentSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentSnippet {
    #[serde(default)]
    author_display_name: Option<String>,
    #[serde(default)]
    author_channel_id: Option<AuthorChannelId>,
    #[serde(default)]
    text_display: String,
    #[serde(default)]
    like_count: u64,
    published_at: String,
    updated_at: String,
}

#[derive(Debug, Deserialize)]
struct AuthorChannelId {
    #[serde(default)]
    value: Option<String>,
}

fn comment_from_item(
    item: CommentItem,
    video_id: &str,
    parent_id: Option<&str>,
    reply_count: u64,
) -> CommentRecord {
    CommentRecord {
        comment_id: item.id,
        video_id: video_id.to_string(),
        parent_id: parent_id.map(|p| p.to_string()),
        author: item.snippet.author_display_name,
        author_channel_id: item.snippet.author_channel_id.and_then(|a| a.value),
        text: item.snippet.text_display,
        like_count: item.snippet.like_count,
        reply_count,
        published_at: item.snippet.published_at,
        updated_at: item.snippet.updated_at,
    }
}

fn thread_from_item(item: CommentThreadItem, video_id: &str) -> CommentThread {
    let top_level = comment_from_item(
        item.snippet.top_level_comment,
        video_id,
        None,
        item.snippet.total_reply_count,
    );
    let parent_id = top_level.comment_id.clone();
    let replies = item
        .replies
        .map(|r| r.comments)
        .unwrap_or_default()
        .into_iter()
        .map(|reply| comment_from_item(reply, video_id, Some(&parent_id), 0))
        .collect();
    CommentThread { top_level, replies }
}

// -- captions.list ----------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CaptionListResponse {
    #[serde(default)]
    items: Vec<CaptionItem>,
}

#[derive(Debug, Deserialize)]
struct CaptionItem {
    id: String,
    snippet: CaptionSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionSnippet {
    language: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    track_kind: Option<String>,
}

fn caption_from_item(item: CaptionItem, video_id: &str) -> CaptionTrackRecord {
    let auto_generated = item
        .snippet
        .track_kind
        .as_deref()
        .map(|k| k.eq_ignore_ascii_case("asr"))
        .unwrap_or(false);
    CaptionTrackRecord {
        caption_id: item.id,
        video_id: video_id.to_string(),
        language: item.snippet.language,
        name: item.snippet.name.filter(|n| !n.is_empty()),
        track_kind: item.snippet.track_kind,
        auto_generated,
    }
}

#[async_trait]
impl DataProvider for YouTubeProvider {
    async fn resolve_channel(&self, reference: &SourceRef) -> Result<ChannelRecord, ProviderError> {
        let (filter_key, filter_value) = match reference {
            SourceRef::ChannelId(id) => ("id", id.as_str()),
            SourceRef::Handle(handle) => ("forHandle", handle.as_str()),
            SourceRef::Username(name) => ("forUsername", name.as_str()),
        };
        debug!(reference = %reference, "Resolving channel");
        let response: ChannelListResponse = self
            .get_json(
                "channels",
                &[
                    ("part", "snippet,statistics,contentDetails"),
                    (filter_key, filter_value),
                ],
            )
            .await?;
        let item = response.items.into_iter().next().ok_or(ProviderError::NotFound)?;
        channel_from_item(item)
    }

    async fn list_videos(
        &self,
        uploads_playlist_id: &str,
        cursor: Option<Cursor>,
    ) -> Result<Page<VideoRef>, ProviderError> {
        let page_size = PAGE_SIZE.to_string();
        let mut query = vec![
            ("part", "contentDetails"),
            ("playlistId", uploads_playlist_id),
            ("maxResults", page_size.as_str()),
        ];
        if let Some(cursor) = &cursor {
            query.push(("pageToken", cursor.as_str()));
        }
        let response: PlaylistItemsResponse = self.get_json("playlistItems", &query).await?;
        let items = response
            .items
            .into_iter()
            .map(|item| VideoRef {
                video_id: item.content_details.video_id,
                published_at: item.content_details.video_published_at.unwrap_or_default(),
            })
            .collect();
        Ok(Page {
            items,
            next_cursor: response.next_page_token.map(Cursor),
        })
    }

    async fn fetch_video_details(
        &self,
        video_ids: &[String],
    ) -> Result<Vec<VideoRecord>, ProviderError> {
        if video_ids.is_empty() {
            return Ok(Vec::new());
        }
        if video_ids.len() > DETAIL_BATCH_SIZE {
            return Err(ProviderError::Parse(format!(
                "detail batch of {} exceeds the API maximum of {DETAIL_BATCH_SIZE}",
                video_ids.len()
            )));
        }
        let ids = video_ids.join(",");
        let response: VideoListResponse = self
            .get_json(
                "videos",
                &[
                    ("part", "snippet,contentDetails,statistics"),
                    ("id", ids.as_str()),
                ],
            )
            .await?;
        // Deleted or private videos are silently absent from the response
        Ok(response.items.into_iter().map(video_from_item).collect())
    }

    async fn list_comment_threads(
        &self,
        video_id: &str,
        cursor: Option<Cursor>,
    ) -> Result<Page<CommentThread>, ProviderError> {
        let page_size = PAGE_SIZE.to_string();
        let mut query = vec![
            ("part", "snippet,replies"),
            ("videoId", video_id),
            ("maxResults", page_size.as_str()),
            ("order", "time"),
            ("textFormat", "plainText"),
        ];
        if let Some(cursor) = &cursor {
            query.push(("pageToken", cursor.as_str()));
        }
        let response: CommentThreadsResponse = self.get_json("commentThreads", &query).await?;
        let items = response
            .items
            .into_iter()
            .map(|item| thread_from_item(item, video_id))
            .collect();
        Ok(Page {
            items,
            next_cursor: response.next_page_token.map(Cursor),
        })
    }

    async fn list_caption_tracks(
        &self,
        video_id: &str,
    ) -> Result<Vec<CaptionTrackRecord>, ProviderError> {
        let response: CaptionListResponse = self
            .get_json("captions", &[("part", "snippet"), ("videoId", video_id)])
            .await?;
        Ok(response
            .items
            .into_iter()
            .map(|item| caption_from_item(item, video_id))
            .collect())
    }
}
