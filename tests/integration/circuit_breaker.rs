//! Consecutive-failure circuit breaker behavior.

use std::sync::atomic::Ordering;

use tempfile::TempDir;
use youtube_data_collector::checkpoint::CheckpointManager;
use youtube_data_collector::collector::{CollectorConfig, EntityWalker};
use youtube_data_collector::stats::RunStatus;
use youtube_data_collector::store::MemoryStore;

use crate::support::{self, source, standard_fixture};

fn bad_sources(count: usize) -> Vec<youtube_data_collector::sources::Source> {
    (0..count)
        .map(|i| source(&format!("https://www.youtube.com/@missing{i}")))
        .collect()
}

#[tokio::test]
async fn test_breaker_trips_at_exact_threshold() {
    // Empty provider: every resolution is NotFound
    let provider = support::MockProvider::new();
    let store = MemoryStore::new();
    let dir = TempDir::new().unwrap();
    let manager = CheckpointManager::new(dir.path().to_path_buf());

    let mut config = CollectorConfig::for_tests();
    config.failure_threshold = 5;

    let record = EntityWalker::new(&provider, &store, config)
        .with_checkpoints(manager.clone())
        .run(&bad_sources(7))
        .await
        .unwrap();

    assert_eq!(record.status, RunStatus::CircuitBreakerTripped);
    // Exactly five sources were attempted, the remaining two were spared
    assert_eq!(record.stats.channels_processed, 5);
    assert_eq!(record.stats.channels_failed, 5);
    assert_eq!(record.stats.consecutive_failures, 5);
    assert_eq!(provider.calls.resolve_channel.load(Ordering::SeqCst), 5);

    // The checkpoint points past the tripping source
    let checkpoint = manager.load().unwrap().expect("checkpoint after trip");
    assert_eq!(checkpoint.source_index, 5);
}

#[tokio::test]
async fn test_success_resets_the_streak() {
    let provider = standard_fixture();
    let store = MemoryStore::new();

    let mut config = CollectorConfig::for_tests();
    config.failure_threshold = 4;

    let mut sources = bad_sources(2);
    sources.push(source("https://www.youtube.com/@creator"));
    sources.extend(bad_sources(4).into_iter().map(|mut s| {
        s.url = s.url.replace("missing", "other");
        s
    }));

    let record = EntityWalker::new(&provider, &store, config)
        .run(&sources)
        .await
        .unwrap();

    // Two failures, a success resetting the streak, then four more
    // failures reach the threshold on the last source
    assert_eq!(record.status, RunStatus::CircuitBreakerTripped);
    assert_eq!(record.stats.channels_processed, 7);
    assert_eq!(record.stats.channels_succeeded, 1);
    assert_eq!(record.stats.channels_failed, 6);
}

#[tokio::test]
async fn test_zero_threshold_disables_breaker() {
    let provider = support::MockProvider::new();
    let store = MemoryStore::new();

    let mut config = CollectorConfig::for_tests();
    config.failure_threshold = 0;

    let record = EntityWalker::new(&provider, &store, config)
        .run(&bad_sources(8))
        .await
        .unwrap();

    assert_eq!(record.status, RunStatus::Completed);
    assert_eq!(record.stats.channels_failed, 8);
}

#[tokio::test]
async fn test_max_channels_caps_a_run() {
    let provider = support::MockProvider::new();
    let store = MemoryStore::new();

    let mut config = CollectorConfig::for_tests();
    config.max_channels = Some(3);
    config.failure_threshold = 0;

    let record = EntityWalker::new(&provider, &store, config)
        .run(&bad_sources(10))
        .await
        .unwrap();

    assert_eq!(record.status, RunStatus::Completed);
    assert_eq!(record.stats.channels_processed, 3);
}
