//! Two-level comment thread integrity at the store boundary.

use youtube_data_collector::store::{MemoryStore, SqliteStore, Store, StoreError};

use crate::support::{channel, comment, video};

#[test]
fn test_comment_without_video_is_rejected_by_both_backends() {
    let orphan = comment("c1", "vmissing", None);

    let memory = MemoryStore::new();
    assert!(matches!(
        memory.upsert_comment(&orphan),
        Err(StoreError::IntegrityViolation { .. })
    ));

    let sqlite = SqliteStore::open_in_memory().unwrap();
    assert!(matches!(
        sqlite.upsert_comment(&orphan),
        Err(StoreError::IntegrityViolation { .. })
    ));
}

#[test]
fn test_reply_with_unknown_parent_is_rejected_by_both_backends() {
    // The video exists, the named parent comment never did
    let stray_reply = comment("c2", "v1", Some("missing-parent"));

    let memory = MemoryStore::new();
    memory.upsert_channel(&channel("UC1")).unwrap();
    memory.upsert_video(&video("v1", "UC1")).unwrap();
    assert!(matches!(
        memory.upsert_comment(&stray_reply),
        Err(StoreError::IntegrityViolation { .. })
    ));
    assert!(memory.comment_ids().is_empty());

    let sqlite = SqliteStore::open_in_memory().unwrap();
    sqlite.upsert_channel(&channel("UC1")).unwrap();
    sqlite.upsert_video(&video("v1", "UC1")).unwrap();
    assert!(matches!(
        sqlite.upsert_comment(&stray_reply),
        Err(StoreError::IntegrityViolation { .. })
    ));
    assert_eq!(sqlite.count("comments").unwrap(), 0);
}

#[test]
fn test_reply_carrying_replies_is_invalid() {
    let store = MemoryStore::new();
    store.upsert_channel(&channel("UC1")).unwrap();
    store.upsert_video(&video("v1", "UC1")).unwrap();

    let mut reply = comment("c2", "v1", Some("c1"));
    reply.reply_count = 1;
    assert!(matches!(
        store.upsert_comment(&reply),
        Err(StoreError::InvalidRecord(_))
    ));
}

#[test]
fn test_thread_upserts_do_not_duplicate() {
    let store = MemoryStore::new();
    store.upsert_channel(&channel("UC1")).unwrap();
    store.upsert_video(&video("v1", "UC1")).unwrap();

    let mut top = comment("c1", "v1", None);
    top.reply_count = 1;
    let reply = comment("c2", "v1", Some("c1"));

    for _ in 0..3 {
        store.upsert_comment(&top).unwrap();
        store.upsert_comment(&reply).unwrap();
    }
    assert_eq!(store.comment_ids(), vec!["c1", "c2"]);
}

#[test]
fn test_self_parent_is_invalid() {
    let store = MemoryStore::new();
    store.upsert_channel(&channel("UC1")).unwrap();
    store.upsert_video(&video("v1", "UC1")).unwrap();

    let cyclic = comment("c1", "v1", Some("c1"));
    assert!(matches!(
        store.upsert_comment(&cyclic),
        Err(StoreError::InvalidRecord(_))
    ));
}
