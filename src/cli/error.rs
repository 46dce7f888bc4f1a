//! CLI error types and conversions

use crate::checkpoint::CheckpointError;
use crate::collector::CollectorError;
use crate::sources::SourceError;
use crate::store::StoreError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Source list error
    #[error("source list error: {0}")]
    Source(#[from] SourceError),

    /// Store error
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Checkpoint error
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// Collection error
    #[error("collection error: {0}")]
    Collector(#[from] CollectorError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}
