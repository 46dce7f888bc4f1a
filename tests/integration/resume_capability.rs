//! Resume correctness: interrupted runs continue without losing or
//! duplicating data.

use std::sync::atomic::Ordering;

use tempfile::TempDir;
use youtube_data_collector::checkpoint::CheckpointManager;
use youtube_data_collector::collector::{CollectorConfig, EntityWalker};
use youtube_data_collector::paginator::Cursor;
use youtube_data_collector::stats::RunStatus;
use youtube_data_collector::store::MemoryStore;

use crate::support::{self, source, thread, video, video_ref};

/// Two channels, one listing page of two videos each, one comment thread
/// per video. A full pass with captions skipped costs 5 units per channel.
fn two_channel_provider() -> support::MockProvider {
    support::MockProvider::new()
        .with_channel("handle:alpha", support::channel("UCa"))
        .with_channel("handle:beta", support::channel("UCb"))
        .with_video_pages("UUUCa", vec![vec![video_ref("a1"), video_ref("a2")]])
        .with_video_pages("UUUCb", vec![vec![video_ref("b1"), video_ref("b2")]])
        .with_details(vec![
            video("a1", "UCa"),
            video("a2", "UCa"),
            video("b1", "UCb"),
            video("b2", "UCb"),
        ])
        .with_comment_pages("a1", vec![vec![thread("ca1", "a1", &[])]])
        .with_comment_pages("a2", vec![vec![thread("ca2", "a2", &[])]])
        .with_comment_pages("b1", vec![vec![thread("cb1", "b1", &[])]])
        .with_comment_pages("b2", vec![vec![thread("cb2", "b2", &[])]])
}

fn config(daily_quota: u64) -> CollectorConfig {
    let mut config = CollectorConfig::for_tests();
    config.daily_quota = daily_quota;
    config.quota_buffer = 0;
    config.skip_captions = true;
    config
}

fn sources() -> Vec<youtube_data_collector::sources::Source> {
    vec![
        source("https://www.youtube.com/@alpha"),
        source("https://www.youtube.com/@beta"),
    ]
}

#[tokio::test]
async fn test_resume_completes_interrupted_run() {
    let provider = two_channel_provider();
    let store = MemoryStore::new();
    let dir = TempDir::new().unwrap();
    let manager = CheckpointManager::new(dir.path().to_path_buf());

    // Channel alpha costs 1+1+1+2 = 5; the interrupted run gets through
    // alpha and halts inside beta
    let first = EntityWalker::new(&provider, &store, config(7))
        .with_checkpoints(manager.clone())
        .run(&sources())
        .await
        .unwrap();
    assert_eq!(first.status, RunStatus::QuotaExhausted);
    assert_eq!(first.stats.channels_succeeded, 1);

    // Fresh quota after the daily reset
    let checkpoint = manager.load().unwrap().expect("checkpoint after halt");
    assert_eq!(checkpoint.source_index, 1);
    let second = EntityWalker::new(&provider, &store, config(10_000))
        .with_checkpoints(manager.clone())
        .resume_from(checkpoint, false)
        .run(&sources())
        .await
        .unwrap();

    assert_eq!(second.status, RunStatus::Completed);
    // Cumulative statistics carry across the resume
    assert_eq!(second.stats.channels_processed, 2);
    assert_eq!(second.stats.channels_succeeded, 2);

    // Union of both runs covers every entity exactly once
    assert_eq!(store.channels().len(), 2);
    assert_eq!(store.video_ids(), vec!["a1", "a2", "b1", "b2"]);
    assert_eq!(store.comment_ids(), vec!["ca1", "ca2", "cb1", "cb2"]);

    // A completed run clears its checkpoint
    assert!(manager.load().unwrap().is_none());
}

#[tokio::test]
async fn test_resume_mid_source_uses_saved_cursor() {
    let provider = support::MockProvider::new()
        .with_channel("handle:creator", support::channel("UC1"))
        .with_video_pages("UUUC1", vec![vec![video_ref("v1")], vec![video_ref("v2")]])
        .with_details(vec![video("v1", "UC1"), video("v2", "UC1")])
        .with_comment_pages("v1", vec![vec![thread("c1", "v1", &[])]])
        .with_comment_pages("v2", vec![vec![thread("c2", "v2", &[])]]);
    let store = MemoryStore::new();
    let dir = TempDir::new().unwrap();
    let manager = CheckpointManager::new(dir.path().to_path_buf());
    let sources = vec![source("https://www.youtube.com/@creator")];

    let first = EntityWalker::new(&provider, &store, config(4))
        .with_checkpoints(manager.clone())
        .run(&sources)
        .await
        .unwrap();
    assert_eq!(first.status, RunStatus::QuotaExhausted);

    let checkpoint = manager.load().unwrap().expect("mid-source checkpoint");
    assert_eq!(checkpoint.video_cursor.as_ref().map(Cursor::as_str), Some("1"));
    assert_eq!(checkpoint.videos_completed, 1);

    let pages_before = provider.calls.list_videos.load(Ordering::SeqCst);
    let second = EntityWalker::new(&provider, &store, config(10_000))
        .with_checkpoints(manager.clone())
        .resume_from(checkpoint, false)
        .run(&sources)
        .await
        .unwrap();

    assert_eq!(second.status, RunStatus::Completed);
    // Only the unfetched second page is requested on resume
    assert_eq!(provider.calls.list_videos.load(Ordering::SeqCst) - pages_before, 1);
    assert_eq!(store.video_ids(), vec!["v1", "v2"]);
    assert_eq!(store.comment_ids(), vec!["c1", "c2"]);
}

#[tokio::test]
async fn test_restored_quota_preserves_position_when_still_exhausted() {
    let provider = support::MockProvider::new()
        .with_channel("handle:creator", support::channel("UC1"))
        .with_video_pages("UUUC1", vec![vec![video_ref("v1")], vec![video_ref("v2")]])
        .with_details(vec![video("v1", "UC1"), video("v2", "UC1")])
        .with_comment_pages("v1", vec![vec![thread("c1", "v1", &[])]])
        .with_comment_pages("v2", vec![vec![thread("c2", "v2", &[])]]);
    let store = MemoryStore::new();
    let dir = TempDir::new().unwrap();
    let manager = CheckpointManager::new(dir.path().to_path_buf());
    let sources = vec![source("https://www.youtube.com/@creator")];

    EntityWalker::new(&provider, &store, config(4))
        .with_checkpoints(manager.clone())
        .run(&sources)
        .await
        .unwrap();
    let checkpoint = manager.load().unwrap().expect("mid-source checkpoint");

    // Resuming within the same quota day: the ledger is still spent, so
    // the run halts again immediately without losing the saved position
    let second = EntityWalker::new(&provider, &store, config(4))
        .with_checkpoints(manager.clone())
        .resume_from(checkpoint, true)
        .run(&sources)
        .await
        .unwrap();
    assert_eq!(second.status, RunStatus::QuotaExhausted);

    let after = manager.load().unwrap().expect("checkpoint still present");
    assert_eq!(after.video_cursor.as_ref().map(Cursor::as_str), Some("1"));
    assert_eq!(after.videos_completed, 1);
}
