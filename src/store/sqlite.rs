//! SQLite store backend.
//!
//! One connection behind a mutex; every upsert is a single
//! `INSERT ... ON CONFLICT DO UPDATE` statement with foreign keys
//! enabled, so parent checks happen in the database and replaying a
//! page updates rows in place. `INSERT OR REPLACE` would not do here:
//! it deletes the conflicting row first, which trips the foreign keys
//! once a re-upserted row already has children.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, ErrorCode};
use tracing::info;

use crate::stats::RunRecord;
use crate::{CaptionTrackRecord, ChannelRecord, CommentRecord, VideoRecord};

use super::{RunId, Store, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS channels (
    channel_id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT,
    custom_url TEXT,
    published_at TEXT,
    country TEXT,
    subscriber_count INTEGER,
    video_count INTEGER,
    view_count INTEGER,
    uploads_playlist_id TEXT NOT NULL,
    source_url TEXT,
    source_metadata TEXT NOT NULL DEFAULT '{}',
    collected_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE IF NOT EXISTS videos (
    video_id TEXT PRIMARY KEY,
    channel_id TEXT NOT NULL REFERENCES channels(channel_id),
    title TEXT NOT NULL,
    description TEXT,
    published_at TEXT NOT NULL,
    duration TEXT,
    view_count INTEGER,
    like_count INTEGER,
    comment_count INTEGER,
    tags TEXT NOT NULL DEFAULT '[]',
    has_captions INTEGER NOT NULL DEFAULT 0,
    thumbnail_url TEXT,
    collected_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE IF NOT EXISTS comments (
    comment_id TEXT PRIMARY KEY,
    video_id TEXT NOT NULL REFERENCES videos(video_id),
    parent_id TEXT REFERENCES comments(comment_id),
    author TEXT,
    author_channel_id TEXT,
    text TEXT NOT NULL,
    like_count INTEGER NOT NULL DEFAULT 0,
    reply_count INTEGER NOT NULL DEFAULT 0,
    published_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    collected_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE IF NOT EXISTS caption_tracks (
    caption_id TEXT PRIMARY KEY,
    video_id TEXT NOT NULL REFERENCES videos(video_id),
    language TEXT NOT NULL,
    name TEXT,
    track_kind TEXT,
    auto_generated INTEGER NOT NULL DEFAULT 0,
    collected_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE IF NOT EXISTS collection_runs (
    run_id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    ended_at TEXT,
    status TEXT NOT NULL,
    stats TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_videos_channel ON videos(channel_id);
CREATE INDEX IF NOT EXISTS idx_comments_video ON comments(video_id);
CREATE INDEX IF NOT EXISTS idx_comments_parent ON comments(parent_id);
CREATE INDEX IF NOT EXISTS idx_captions_video ON caption_tracks(video_id);
";

/// SQLite-backed [`Store`]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and apply the schema
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Backend(e.to_string()))?;
            }
        }
        let conn = Connection::open(path).map_err(backend)?;
        let store = Self::from_connection(conn)?;
        info!(path = %path.display(), "Opened collection database");
        Ok(store)
    }

    /// Open an in-memory database, for tests
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", true).map_err(backend)?;
        conn.execute_batch(SCHEMA).map_err(backend)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Row count of a table, for reporting
    pub fn count(&self, table: &str) -> Result<u64, StoreError> {
        let allowed = ["channels", "videos", "comments", "caption_tracks", "collection_runs"];
        if !allowed.contains(&table) {
            return Err(StoreError::Backend(format!("unknown table '{table}'")));
        }
        let conn = self.lock();
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .map_err(backend)
    }
}

fn backend(error: rusqlite::Error) -> StoreError {
    StoreError::Backend(error.to_string())
}

/// Translate a foreign-key constraint failure into an integrity violation
fn map_upsert_error(
    error: rusqlite::Error,
    child: &'static str,
    child_id: &str,
    parent: &'static str,
    parent_id: &str,
) -> StoreError {
    if let rusqlite::Error::SqliteFailure(e, _) = &error {
        if e.code == ErrorCode::ConstraintViolation {
            return StoreError::IntegrityViolation {
                child,
                child_id: child_id.to_string(),
                parent,
                parent_id: parent_id.to_string(),
            };
        }
    }
    backend(error)
}

impl Store for SqliteStore {
    fn upsert_channel(&self, channel: &ChannelRecord) -> Result<(), StoreError> {
        channel.validate().map_err(StoreError::InvalidRecord)?;
        let metadata = serde_json::to_string(&channel.source_metadata)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let conn = self.lock();
        conn.execute(
            "INSERT INTO channels (
                channel_id, title, description, custom_url, published_at, country,
                subscriber_count, video_count, view_count, uploads_playlist_id,
                source_url, source_metadata
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(channel_id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                custom_url = excluded.custom_url,
                published_at = excluded.published_at,
                country = excluded.country,
                subscriber_count = excluded.subscriber_count,
                video_count = excluded.video_count,
                view_count = excluded.view_count,
                uploads_playlist_id = excluded.uploads_playlist_id,
                source_url = excluded.source_url,
                source_metadata = excluded.source_metadata",
            params![
                channel.channel_id,
                channel.title,
                channel.description,
                channel.custom_url,
                channel.published_at,
                channel.country,
                channel.subscriber_count,
                channel.video_count,
                channel.view_count,
                channel.uploads_playlist_id,
                channel.source_url,
                metadata,
            ],
        )
        .map_err(backend)?;
        Ok(())
    }

    fn upsert_video(&self, video: &VideoRecord) -> Result<(), StoreError> {
        video.validate().map_err(StoreError::InvalidRecord)?;
        let tags = serde_json::to_string(&video.tags)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let conn = self.lock();
        conn.execute(
            "INSERT INTO videos (
                video_id, channel_id, title, description, published_at, duration,
                view_count, like_count, comment_count, tags, has_captions, thumbnail_url
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(video_id) DO UPDATE SET
                channel_id = excluded.channel_id,
                title = excluded.title,
                description = excluded.description,
                published_at = excluded.published_at,
                duration = excluded.duration,
                view_count = excluded.view_count,
                like_count = excluded.like_count,
                comment_count = excluded.comment_count,
                tags = excluded.tags,
                has_captions = excluded.has_captions,
                thumbnail_url = excluded.thumbnail_url",
            params![
                video.video_id,
                video.channel_id,
                video.title,
                video.description,
                video.published_at,
                video.duration,
                video.view_count,
                video.like_count,
                video.comment_count,
                tags,
                video.has_captions,
                video.thumbnail_url,
            ],
        )
        .map_err(|e| map_upsert_error(e, "video", &video.video_id, "channel", &video.channel_id))?;
        Ok(())
    }

    fn upsert_comment(&self, comment: &CommentRecord) -> Result<(), StoreError> {
        comment.validate().map_err(StoreError::InvalidRecord)?;
        let conn = self.lock();
        conn.execute(
            "INSERT INTO comments (
                comment_id, video_id, parent_id, author, author_channel_id, text,
                like_count, reply_count, published_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(comment_id) DO UPDATE SET
                video_id = excluded.video_id,
                parent_id = excluded.parent_id,
                author = excluded.author,
                author_channel_id = excluded.author_channel_id,
                text = excluded.text,
                like_count = excluded.like_count,
                reply_count = excluded.reply_count,
                published_at = excluded.published_at,
                updated_at = excluded.updated_at",
            params![
                comment.comment_id,
                comment.video_id,
                comment.parent_id,
                comment.author,
                comment.author_channel_id,
                comment.text,
                comment.like_count,
                comment.reply_count,
                comment.published_at,
                comment.updated_at,
            ],
        )
        .map_err(|e| match &comment.parent_id {
            // A reply has two possible missing parents; attribute the
            // violation to the parent comment, the only reference a
            // reply adds over a top-level comment
            Some(parent_id) => {
                map_upsert_error(e, "comment", &comment.comment_id, "parent comment", parent_id)
            }
            None => map_upsert_error(e, "comment", &comment.comment_id, "video", &comment.video_id),
        })?;
        Ok(())
    }

    fn upsert_caption_track(&self, track: &CaptionTrackRecord) -> Result<(), StoreError> {
        track.validate().map_err(StoreError::InvalidRecord)?;
        let conn = self.lock();
        conn.execute(
            "INSERT INTO caption_tracks (
                caption_id, video_id, language, name, track_kind, auto_generated
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(caption_id) DO UPDATE SET
                video_id = excluded.video_id,
                language = excluded.language,
                name = excluded.name,
                track_kind = excluded.track_kind,
                auto_generated = excluded.auto_generated",
            params![
                track.caption_id,
                track.video_id,
                track.language,
                track.name,
                track.track_kind,
                track.auto_generated,
            ],
        )
        .map_err(|e| {
            map_upsert_error(e, "caption track", &track.caption_id, "video", &track.video_id)
        })?;
        Ok(())
    }

    fn begin_run(&self, record: &RunRecord) -> Result<RunId, StoreError> {
        let stats = serde_json::to_string(&record.stats)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let conn = self.lock();
        conn.execute(
            "INSERT INTO collection_runs (started_at, ended_at, status, stats)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.started_at.to_rfc3339(),
                record.ended_at.map(|t| t.to_rfc3339()),
                record.status.as_str(),
                stats,
            ],
        )
        .map_err(backend)?;
        Ok(conn.last_insert_rowid())
    }

    fn finish_run(&self, run_id: RunId, record: &RunRecord) -> Result<(), StoreError> {
        let stats = serde_json::to_string(&record.stats)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let conn = self.lock();
        let updated = conn
            .execute(
                "UPDATE collection_runs SET ended_at = ?2, status = ?3, stats = ?4
                 WHERE run_id = ?1",
                params![
                    run_id,
                    record.ended_at.map(|t| t.to_rfc3339()),
                    record.status.as_str(),
                    stats,
                ],
            )
            .map_err(backend)?;
        if updated == 0 {
            return Err(StoreError::UnknownRun(run_id));
        }
        Ok(())
    }
}
