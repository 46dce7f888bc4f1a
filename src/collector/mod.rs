//! The traversal state machine driving collection.
//!
//! [`EntityWalker`] walks sources depth-first: resolve the channel, page
//! through its uploads, fetch details in batches, then comments and caption
//! tracks per video. Quota, pacing, retry and checkpointing are applied at
//! every remote call.

mod config;
mod walker;

pub use config::{CollectorConfig, DEFAULT_CHECKPOINT_EVERY};
pub use walker::EntityWalker;

use crate::checkpoint::CheckpointError;
use crate::provider::ProviderError;
use crate::store::StoreError;

/// Unrecoverable errors that abort a collection run.
///
/// Per-source and per-record failures are counted in the run statistics
/// instead; only failures of the run's own machinery surface here.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    /// The store backend failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A checkpoint could not be written or read
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// A provider failure escaped per-source handling
    #[error(transparent)]
    Provider(#[from] ProviderError),
}
