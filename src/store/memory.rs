//! In-memory store backend for tests and dry runs.
//!
//! Mirrors the SQLite backend's semantics, including parent checks, with
//! accessors that let tests assert on exactly what was persisted.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::stats::RunRecord;
use crate::{CaptionTrackRecord, ChannelRecord, CommentRecord, VideoRecord};

use super::{RunId, Store, StoreError};

#[derive(Debug, Default)]
struct Inner {
    channels: BTreeMap<String, ChannelRecord>,
    videos: BTreeMap<String, VideoRecord>,
    comments: BTreeMap<String, CommentRecord>,
    caption_tracks: BTreeMap<String, CaptionTrackRecord>,
    runs: Vec<RunRecord>,
}

/// In-memory [`Store`] keyed by entity identifier
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Snapshot of all persisted channels, in id order
    pub fn channels(&self) -> Vec<ChannelRecord> {
        self.lock().channels.values().cloned().collect()
    }

    /// Snapshot of all persisted videos, in id order
    pub fn videos(&self) -> Vec<VideoRecord> {
        self.lock().videos.values().cloned().collect()
    }

    /// Snapshot of all persisted comments, in id order
    pub fn comments(&self) -> Vec<CommentRecord> {
        self.lock().comments.values().cloned().collect()
    }

    /// Snapshot of all persisted caption tracks, in id order
    pub fn caption_tracks(&self) -> Vec<CaptionTrackRecord> {
        self.lock().caption_tracks.values().cloned().collect()
    }

    /// Snapshot of all recorded runs, in start order
    pub fn runs(&self) -> Vec<RunRecord> {
        self.lock().runs.clone()
    }

    /// Ids of all persisted videos, for set-equality assertions
    pub fn video_ids(&self) -> Vec<String> {
        self.lock().videos.keys().cloned().collect()
    }

    /// Ids of all persisted comments, for set-equality assertions
    pub fn comment_ids(&self) -> Vec<String> {
        self.lock().comments.keys().cloned().collect()
    }
}

impl Store for MemoryStore {
    fn upsert_channel(&self, channel: &ChannelRecord) -> Result<(), StoreError> {
        channel.validate().map_err(StoreError::InvalidRecord)?;
        self.lock()
            .channels
            .insert(channel.channel_id.clone(), channel.clone());
        Ok(())
    }

    fn upsert_video(&self, video: &VideoRecord) -> Result<(), StoreError> {
        video.validate().map_err(StoreError::InvalidRecord)?;
        let mut inner = self.lock();
        if !inner.channels.contains_key(&video.channel_id) {
            return Err(StoreError::IntegrityViolation {
                child: "video",
                child_id: video.video_id.clone(),
                parent: "channel",
                parent_id: video.channel_id.clone(),
            });
        }
        inner.videos.insert(video.video_id.clone(), video.clone());
        Ok(())
    }

    fn upsert_comment(&self, comment: &CommentRecord) -> Result<(), StoreError> {
        comment.validate().map_err(StoreError::InvalidRecord)?;
        let mut inner = self.lock();
        if !inner.videos.contains_key(&comment.video_id) {
            return Err(StoreError::IntegrityViolation {
                child: "comment",
                child_id: comment.comment_id.clone(),
                parent: "video",
                parent_id: comment.video_id.clone(),
            });
        }
        if let Some(parent_id) = &comment.parent_id {
            if !inner.comments.contains_key(parent_id) {
                return Err(StoreError::IntegrityViolation {
                    child: "comment",
                    child_id: comment.comment_id.clone(),
                    parent: "parent comment",
                    parent_id: parent_id.clone(),
                });
            }
        }
        inner
            .comments
            .insert(comment.comment_id.clone(), comment.clone());
        Ok(())
    }

    fn upsert_caption_track(&self, track: &CaptionTrackRecord) -> Result<(), StoreError> {
        track.validate().map_err(StoreError::InvalidRecord)?;
        let mut inner = self.lock();
        if !inner.videos.contains_key(&track.video_id) {
            return Err(StoreError::IntegrityViolation {
                child: "caption track",
                child_id: track.caption_id.clone(),
                parent: "video",
                parent_id: track.video_id.clone(),
            });
        }
        inner
            .caption_tracks
            .insert(track.caption_id.clone(), track.clone());
        Ok(())
    }

    fn begin_run(&self, record: &RunRecord) -> Result<RunId, StoreError> {
        let mut inner = self.lock();
        inner.runs.push(record.clone());
        Ok(inner.runs.len() as RunId - 1)
    }

    fn finish_run(&self, run_id: RunId, record: &RunRecord) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let slot = usize::try_from(run_id)
            .ok()
            .and_then(|i| inner.runs.get_mut(i))
            .ok_or(StoreError::UnknownRun(run_id))?;
        *slot = record.clone();
        Ok(())
    }
}
