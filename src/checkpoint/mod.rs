//! Durable collection checkpoints.
//!
//! A checkpoint names the next unit of work, never partial work: the index
//! of the next source and, when a source was interrupted mid-listing, the
//! cursor of the next unfetched video page. Because the store is
//! idempotent, replaying from a checkpoint that is slightly behind is
//! always safe.

use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::paginator::Cursor;
use crate::stats::RunStats;

/// Current checkpoint schema version
const SCHEMA_VERSION: &str = "1.0.0";

/// Name of the checkpoint file within the checkpoint directory
const CHECKPOINT_FILE: &str = "latest_checkpoint.json";

/// Maximum allowed checkpoint file size (10 MB) to prevent memory exhaustion
pub const MAX_CHECKPOINT_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// A snapshot of collection progress, written atomically.
///
/// `source_index` points at the next source to process. When the run was
/// interrupted inside a source's video listing, `video_cursor` holds the
/// next unfetched page and `videos_completed` how many videos of that
/// source were already fully collected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionCheckpoint {
    schema_version: String,
    /// Index of the next source to process
    pub source_index: usize,
    /// Cursor of the next unfetched video page within the current source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_cursor: Option<Cursor>,
    /// Videos of the current source already fully collected
    pub videos_completed: u64,
    /// Counters accumulated up to this point
    pub stats: RunStats,
    /// Quota units consumed up to this point
    pub quota_consumed: u64,
    created_at: i64,
    updated_at: i64,
}

impl CollectionCheckpoint {
    /// Checkpoint at the boundary before source `source_index`
    pub fn at_source(source_index: usize, stats: RunStats, quota_consumed: u64) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            source_index,
            video_cursor: None,
            videos_completed: 0,
            stats,
            quota_consumed,
            created_at: now,
            updated_at: now,
        }
    }

    /// Checkpoint inside source `source_index`, mid video listing
    pub fn mid_source(
        source_index: usize,
        video_cursor: Option<Cursor>,
        videos_completed: u64,
        stats: RunStats,
        quota_consumed: u64,
    ) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            source_index,
            video_cursor,
            videos_completed,
            stats,
            quota_consumed,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creation timestamp in Unix milliseconds
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    fn validate_schema_version(&self) -> Result<(), CheckpointError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(CheckpointError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION.to_string(),
                found: self.schema_version.clone(),
            });
        }
        Ok(())
    }
}

/// Errors related to checkpoint persistence
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Schema version mismatch
    #[error("checkpoint schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch {
        /// Expected schema version
        expected: String,
        /// Found schema version
        found: String,
    },

    /// Checkpoint file too large
    #[error("checkpoint file too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge {
        /// Actual file size
        size: u64,
        /// Maximum allowed size
        max: u64,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Lock error
    #[error("lock error: {0}")]
    Lock(String),
}

/// Owns the checkpoint directory and performs locked, atomic reads and
/// writes of the single latest checkpoint
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Manager rooted at `dir`; the directory is created on first save
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Path of the checkpoint file
    pub fn checkpoint_path(&self) -> PathBuf {
        self.dir.join(CHECKPOINT_FILE)
    }

    fn lock_file(&self) -> Result<std::fs::File, CheckpointError> {
        let lock_path = self.checkpoint_path().with_extension("lock");
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| CheckpointError::Lock(format!("failed to open lock file: {e}")))
    }

    /// Save a checkpoint atomically: write to a temp file in the same
    /// directory, fsync, rename over the target, fsync the directory.
    pub fn save(&self, checkpoint: &CollectionCheckpoint) -> Result<(), CheckpointError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| CheckpointError::Io(e.to_string()))?;

        let json = serde_json::to_string_pretty(checkpoint)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?;

        let mut lock = RwLock::new(self.lock_file()?);
        let _guard = lock
            .write()
            .map_err(|e| CheckpointError::Lock(format!("failed to acquire write lock: {e}")))?;

        let mut temp_file = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|e| CheckpointError::Io(format!("failed to create temp file: {e}")))?;
        temp_file
            .write_all(json.as_bytes())
            .map_err(|e| CheckpointError::Io(format!("failed to write temp file: {e}")))?;
        temp_file
            .flush()
            .map_err(|e| CheckpointError::Io(format!("failed to flush temp file: {e}")))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| CheckpointError::Io(format!("failed to sync temp file: {e}")))?;
        temp_file
            .persist(self.checkpoint_path())
            .map_err(|e| CheckpointError::Io(format!("failed to persist temp file: {e}")))?;

        if let Ok(dir) = std::fs::File::open(&self.dir) {
            let _ = dir.sync_all();
        }

        info!(
            source_index = checkpoint.source_index,
            videos_completed = checkpoint.videos_completed,
            quota_consumed = checkpoint.quota_consumed,
            "Checkpoint saved"
        );
        Ok(())
    }

    /// Load the latest checkpoint, if one exists.
    ///
    /// Returns `Ok(None)` when no checkpoint file is present; an unreadable
    /// or incompatible file is an error so the operator can decide whether
    /// to reset.
    pub fn load(&self) -> Result<Option<CollectionCheckpoint>, CheckpointError> {
        let path = self.checkpoint_path();
        if !path.exists() {
            debug!(path = %path.display(), "No checkpoint file present");
            return Ok(None);
        }

        let lock = RwLock::new(self.lock_file()?);
        let _guard = lock
            .read()
            .map_err(|e| CheckpointError::Lock(format!("failed to acquire read lock: {e}")))?;

        let metadata = std::fs::metadata(&path).map_err(|e| CheckpointError::Io(e.to_string()))?;
        if metadata.len() > MAX_CHECKPOINT_FILE_SIZE {
            return Err(CheckpointError::FileTooLarge {
                size: metadata.len(),
                max: MAX_CHECKPOINT_FILE_SIZE,
            });
        }

        let contents =
            std::fs::read_to_string(&path).map_err(|e| CheckpointError::Io(e.to_string()))?;
        let checkpoint: CollectionCheckpoint =
            serde_json::from_str(&contents).map_err(|e| {
                warn!(error = %e, "Failed to deserialize checkpoint");
                CheckpointError::Deserialization(e.to_string())
            })?;
        checkpoint.validate_schema_version()?;

        info!(
            source_index = checkpoint.source_index,
            videos_completed = checkpoint.videos_completed,
            quota_consumed = checkpoint.quota_consumed,
            "Checkpoint loaded"
        );
        Ok(Some(checkpoint))
    }

    /// Remove the checkpoint file, typically after a completed run
    pub fn clear(&self) -> Result<(), CheckpointError> {
        let path = self.checkpoint_path();
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "Checkpoint cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CheckpointError::Io(e.to_string())),
        }
    }
}
