//! Quota gating: runs stop cleanly at the budget line and never overdraw.

use tempfile::TempDir;
use youtube_data_collector::checkpoint::CheckpointManager;
use youtube_data_collector::collector::{CollectorConfig, EntityWalker};
use youtube_data_collector::paginator::Cursor;
use youtube_data_collector::stats::RunStatus;
use youtube_data_collector::store::MemoryStore;

use crate::support::{self, source, thread, video, video_ref};

/// One channel, two listing pages of one video each, one comment thread
/// per video. With captions skipped, a full pass costs 7 units:
/// resolve + 2 pages + 2 detail batches + 2 comment pages.
fn two_page_provider() -> support::MockProvider {
    support::MockProvider::new()
        .with_channel("handle:creator", support::channel("UC1"))
        .with_video_pages("UUUC1", vec![vec![video_ref("v1")], vec![video_ref("v2")]])
        .with_details(vec![video("v1", "UC1"), video("v2", "UC1")])
        .with_comment_pages("v1", vec![vec![thread("c1", "v1", &[])]])
        .with_comment_pages("v2", vec![vec![thread("c2", "v2", &[])]])
}

fn tight_config(daily_quota: u64, quota_buffer: u64) -> CollectorConfig {
    let mut config = CollectorConfig::for_tests();
    config.daily_quota = daily_quota;
    config.quota_buffer = quota_buffer;
    config.skip_captions = true;
    config
}

#[tokio::test]
async fn test_quota_refusal_halts_and_checkpoints() {
    let provider = two_page_provider();
    let store = MemoryStore::new();
    let dir = TempDir::new().unwrap();
    let manager = CheckpointManager::new(dir.path().to_path_buf());

    // resolve(1) + page(2) + details(3) + comments(4); the second page
    // reservation is refused
    let record = EntityWalker::new(&provider, &store, tight_config(4, 0))
        .with_checkpoints(manager.clone())
        .run(&[source("https://www.youtube.com/@creator")])
        .await
        .unwrap();

    assert_eq!(record.status, RunStatus::QuotaExhausted);
    assert_eq!(record.stats.quota_used, 4);
    // The first video and its comments were fully persisted before the halt
    assert_eq!(store.video_ids(), vec!["v1"]);
    assert_eq!(store.comment_ids(), vec!["c1"]);

    let checkpoint = manager.load().unwrap().expect("checkpoint after quota halt");
    assert_eq!(checkpoint.source_index, 0);
    assert_eq!(checkpoint.video_cursor.as_ref().map(Cursor::as_str), Some("1"));
    assert_eq!(checkpoint.videos_completed, 1);
    assert_eq!(checkpoint.quota_consumed, 4);
}

#[tokio::test]
async fn test_safety_buffer_is_respected() {
    let provider = two_page_provider();
    let store = MemoryStore::new();

    // Budget 10 with buffer 6 leaves the same 4 usable units
    let record = EntityWalker::new(&provider, &store, tight_config(10, 6))
        .run(&[source("https://www.youtube.com/@creator")])
        .await
        .unwrap();

    assert_eq!(record.status, RunStatus::QuotaExhausted);
    assert_eq!(record.stats.quota_used, 4);
    assert!(record.stats.quota_used <= 10 - 6);
}

#[tokio::test]
async fn test_caption_lookup_cost_halts_run() {
    let provider = support::MockProvider::new()
        .with_channel("handle:creator", support::channel("UC1"))
        .with_video_pages("UUUC1", vec![vec![video_ref("v1")]])
        .with_details(vec![video("v1", "UC1")])
        .with_comment_pages("v1", vec![vec![thread("c1", "v1", &[])]])
        .with_captions("v1", vec![support::caption("cap1", "v1", "en")]);
    let store = MemoryStore::new();
    let dir = TempDir::new().unwrap();
    let manager = CheckpointManager::new(dir.path().to_path_buf());

    // resolve(1) + page(2) + details(3) + comments(4); the 50-unit caption
    // reservation would land at 54 > 53
    let mut config = CollectorConfig::for_tests();
    config.daily_quota = 53;
    config.quota_buffer = 0;

    let record = EntityWalker::new(&provider, &store, config)
        .with_checkpoints(manager.clone())
        .run(&[source("https://www.youtube.com/@creator")])
        .await
        .unwrap();

    assert_eq!(record.status, RunStatus::QuotaExhausted);
    assert_eq!(record.stats.caption_tracks_collected, 0);
    // Video and comments landed before the halt; replay will redo the page
    assert_eq!(store.video_ids(), vec!["v1"]);
    assert_eq!(store.comment_ids(), vec!["c1"]);

    let checkpoint = manager.load().unwrap().expect("checkpoint after quota halt");
    assert_eq!(checkpoint.source_index, 0);
    // The halt rewinds to the start of the interrupted page
    assert!(checkpoint.video_cursor.is_none());
    assert_eq!(checkpoint.videos_completed, 0);
}

#[tokio::test]
async fn test_exhaustion_before_first_source_preserves_position() {
    let provider = two_page_provider();
    let store = MemoryStore::new();

    // Nothing fits below the ceiling
    let record = EntityWalker::new(&provider, &store, tight_config(1, 1))
        .run(&[source("https://www.youtube.com/@creator")])
        .await
        .unwrap();

    assert_eq!(record.status, RunStatus::QuotaExhausted);
    assert_eq!(record.stats.quota_used, 0);
    assert_eq!(
        provider.calls.resolve_channel.load(std::sync::atomic::Ordering::SeqCst),
        0
    );
    assert!(store.channels().is_empty());
}
