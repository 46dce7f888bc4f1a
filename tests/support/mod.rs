//! Shared test fixtures: a scripted provider and record builders.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use youtube_data_collector::paginator::{Cursor, Page};
use youtube_data_collector::provider::{DataProvider, ProviderError};
use youtube_data_collector::sources::{Source, SourceRef};
use youtube_data_collector::{
    CaptionTrackRecord, ChannelRecord, CommentRecord, CommentThread, VideoRecord, VideoRef,
};

/// Per-method call counters
#[derive(Debug, Default)]
pub struct CallCounters {
    pub resolve_channel: AtomicU64,
    pub list_videos: AtomicU64,
    pub fetch_video_details: AtomicU64,
    pub list_comment_threads: AtomicU64,
    pub list_caption_tracks: AtomicU64,
}

/// A fully scripted provider: every response is prepared up front.
///
/// Pagination is encoded as a vector of pages per listing; cursors are the
/// string index of the next page.
#[derive(Default)]
pub struct MockProvider {
    channels: HashMap<String, ChannelRecord>,
    resolve_failures: HashMap<String, ProviderError>,
    video_pages: HashMap<String, Vec<Vec<VideoRef>>>,
    details: HashMap<String, VideoRecord>,
    comment_pages: HashMap<String, Vec<Vec<CommentThread>>>,
    comments_disabled: HashSet<String>,
    captions: HashMap<String, Vec<CaptionTrackRecord>>,
    pub calls: CallCounters,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel resolvable by `reference` (e.g. "handle:creator")
    pub fn with_channel(mut self, reference: &str, channel: ChannelRecord) -> Self {
        self.channels.insert(reference.to_string(), channel);
        self
    }

    pub fn with_resolve_failure(mut self, reference: &str, error: ProviderError) -> Self {
        self.resolve_failures.insert(reference.to_string(), error);
        self
    }

    pub fn with_video_pages(mut self, playlist_id: &str, pages: Vec<Vec<VideoRef>>) -> Self {
        self.video_pages.insert(playlist_id.to_string(), pages);
        self
    }

    pub fn with_details(mut self, videos: Vec<VideoRecord>) -> Self {
        for video in videos {
            self.details.insert(video.video_id.clone(), video);
        }
        self
    }

    pub fn with_comment_pages(mut self, video_id: &str, pages: Vec<Vec<CommentThread>>) -> Self {
        self.comment_pages.insert(video_id.to_string(), pages);
        self
    }

    pub fn with_comments_disabled(mut self, video_id: &str) -> Self {
        self.comments_disabled.insert(video_id.to_string());
        self
    }

    pub fn with_captions(mut self, video_id: &str, tracks: Vec<CaptionTrackRecord>) -> Self {
        self.captions.insert(video_id.to_string(), tracks);
        self
    }
}

fn page_of<T: Clone>(pages: &[Vec<T>], cursor: Option<Cursor>) -> Result<Page<T>, ProviderError> {
    let index = match cursor {
        None => 0,
        Some(cursor) => cursor
            .as_str()
            .parse::<usize>()
            .map_err(|_| ProviderError::Parse(format!("bad test cursor {}", cursor.as_str())))?,
    };
    let items = pages.get(index).cloned().unwrap_or_default();
    let next_cursor = if index + 1 < pages.len() {
        Some(Cursor((index + 1).to_string()))
    } else {
        None
    };
    Ok(Page { items, next_cursor })
}

#[async_trait]
impl DataProvider for MockProvider {
    async fn resolve_channel(&self, reference: &SourceRef) -> Result<ChannelRecord, ProviderError> {
        self.calls.resolve_channel.fetch_add(1, Ordering::SeqCst);
        let key = reference.to_string();
        if let Some(error) = self.resolve_failures.get(&key) {
            return Err(error.clone());
        }
        self.channels.get(&key).cloned().ok_or(ProviderError::NotFound)
    }

    async fn list_videos(
        &self,
        uploads_playlist_id: &str,
        cursor: Option<Cursor>,
    ) -> Result<Page<VideoRef>, ProviderError> {
        self.calls.list_videos.fetch_add(1, Ordering::SeqCst);
        let pages = self
            .video_pages
            .get(uploads_playlist_id)
            .ok_or(ProviderError::NotFound)?;
        page_of(pages, cursor)
    }

    async fn fetch_video_details(
        &self,
        video_ids: &[String],
    ) -> Result<Vec<VideoRecord>, ProviderError> {
        self.calls.fetch_video_details.fetch_add(1, Ordering::SeqCst);
        Ok(video_ids
            .iter()
            .filter_map(|id| self.details.get(id).cloned())
            .collect())
    }

    async fn list_comment_threads(
        &self,
        video_id: &str,
        cursor: Option<Cursor>,
    ) -> Result<Page<CommentThread>, ProviderError> {
        self.calls.list_comment_threads.fetch_add(1, Ordering::SeqCst);
        if self.comments_disabled.contains(video_id) {
            return Err(ProviderError::CommentsDisabled);
        }
        let pages = self.comment_pages.get(video_id).cloned().unwrap_or_default();
        page_of(&pages, cursor)
    }

    async fn list_caption_tracks(
        &self,
        video_id: &str,
    ) -> Result<Vec<CaptionTrackRecord>, ProviderError> {
        self.calls.list_caption_tracks.fetch_add(1, Ordering::SeqCst);
        Ok(self.captions.get(video_id).cloned().unwrap_or_default())
    }
}

// -- record builders ----------------------------------------------------------

pub fn source(url: &str) -> Source {
    Source {
        url: url.to_string(),
        metadata: BTreeMap::new(),
    }
}

pub fn channel(id: &str) -> ChannelRecord {
    ChannelRecord {
        channel_id: id.to_string(),
        title: format!("Channel {id}"),
        description: None,
        custom_url: None,
        published_at: None,
        country: None,
        subscriber_count: Some(1_000),
        video_count: Some(2),
        view_count: Some(10_000),
        uploads_playlist_id: format!("UU{id}"),
        source_url: None,
        source_metadata: BTreeMap::new(),
    }
}

pub fn video_ref(id: &str) -> VideoRef {
    VideoRef {
        video_id: id.to_string(),
        published_at: "2024-01-01T00:00:00Z".to_string(),
    }
}

pub fn video(id: &str, channel_id: &str) -> VideoRecord {
    VideoRecord {
        video_id: id.to_string(),
        channel_id: channel_id.to_string(),
        title: format!("Video {id}"),
        description: None,
        published_at: "2024-01-01T00:00:00Z".to_string(),
        duration: Some("PT2M".to_string()),
        view_count: Some(100),
        like_count: Some(10),
        comment_count: Some(3),
        tags: vec![],
        has_captions: true,
        thumbnail_url: None,
    }
}

pub fn comment(id: &str, video_id: &str, parent: Option<&str>) -> CommentRecord {
    CommentRecord {
        comment_id: id.to_string(),
        video_id: video_id.to_string(),
        parent_id: parent.map(|p| p.to_string()),
        author: Some("someone".to_string()),
        author_channel_id: None,
        text: format!("comment {id}"),
        like_count: 0,
        reply_count: 0,
        published_at: "2024-01-02T00:00:00Z".to_string(),
        updated_at: "2024-01-02T00:00:00Z".to_string(),
    }
}

pub fn thread(top_id: &str, video_id: &str, reply_ids: &[&str]) -> CommentThread {
    let mut top_level = comment(top_id, video_id, None);
    top_level.reply_count = reply_ids.len() as u64;
    let replies = reply_ids
        .iter()
        .map(|id| comment(id, video_id, Some(top_id)))
        .collect();
    CommentThread { top_level, replies }
}

pub fn caption(id: &str, video_id: &str, language: &str) -> CaptionTrackRecord {
    CaptionTrackRecord {
        caption_id: id.to_string(),
        video_id: video_id.to_string(),
        language: language.to_string(),
        name: None,
        track_kind: Some("standard".to_string()),
        auto_generated: false,
    }
}

/// One channel (`@creator` -> UC1), two videos across two listing pages,
/// five comments in total and one caption track.
pub fn standard_fixture() -> MockProvider {
    MockProvider::new()
        .with_channel("handle:creator", channel("UC1"))
        .with_video_pages("UUUC1", vec![vec![video_ref("v1")], vec![video_ref("v2")]])
        .with_details(vec![video("v1", "UC1"), video("v2", "UC1")])
        .with_comment_pages("v1", vec![vec![thread("c1", "v1", &["c2", "c3"])]])
        .with_comment_pages("v2", vec![vec![thread("c4", "v2", &["c5"])]])
        .with_captions("v1", vec![caption("cap1", "v1", "en")])
}
