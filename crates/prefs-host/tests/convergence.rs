//! Multi-device convergence tests.
//!
//! Two sessions ("devices") share one in-memory remote document and must
//! converge through nothing but the read-merge-write discipline: no locks,
//! no version tokens, no push.

use std::sync::Arc;
use std::time::Duration;

use prefs_core::digest::{aggregate, FeedItem, FeedReason};
use prefs_core::document::PreferenceBlock;
use prefs_core::remote::InMemoryRemote;
use prefs_host::{PrefsService, RefreshConfig};

use chrono::{DateTime, FixedOffset};
use serde_json::json;

fn ts(iso: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(iso).unwrap()
}

fn service() -> PrefsService<Arc<InMemoryRemote>> {
    PrefsService::with_config(RefreshConfig {
        interval: Duration::from_secs(20),
    })
}

/// Let spawned refresh agents run their immediate first tick.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::test(start_paused = true)]
async fn test_cross_device_mark_read_race_keeps_newest() {
    let remote = Arc::new(InMemoryRemote::new());

    let mut device_a = service();
    let mut device_b = service();
    device_a.sign_in("did:plc:me", Arc::clone(&remote)).await;
    device_b.sign_in("did:plc:me", Arc::clone(&remote)).await;
    settle().await;

    let t1 = "2026-08-01T10:00:00+00:00";
    let t2 = "2026-08-02T10:00:00+00:00";

    // Device A marks the newer instant first
    device_a
        .session()
        .unwrap()
        .read_state()
        .mark_read_up_to("alice", t2)
        .await
        .unwrap();

    // Device B never saw A's write locally, so its older mark passes the
    // local monotonic check - the replayed updater against server truth is
    // what must keep t2
    device_b
        .session()
        .unwrap()
        .read_state()
        .mark_read_up_to("alice", t1)
        .await
        .unwrap();

    assert_eq!(
        device_b.session().unwrap().read_state().last_viewed("alice"),
        Some(ts(t2))
    );

    // Device A refreshes and agrees
    device_a.session().unwrap().read_state().refresh().await.unwrap();
    assert_eq!(
        device_a.session().unwrap().read_state().last_viewed("alice"),
        Some(ts(t2))
    );
}

#[tokio::test(start_paused = true)]
async fn test_independent_domains_preserve_each_other_and_foreign_blocks() {
    let foreign = PreferenceBlock::new(json!({
        "domain": "mute-words",
        "words": ["crypto", "football"],
    }));
    let remote = Arc::new(InMemoryRemote::with_blocks(vec![foreign.clone()]));

    let mut device = service();
    device.sign_in("did:plc:me", Arc::clone(&remote)).await;
    settle().await;
    let session = device.session().unwrap();

    session.saved_feeds().add("feedA", true).await.unwrap();
    session
        .read_state()
        .mark_read_up_to("alice", "2026-08-01T10:00:00+00:00")
        .await
        .unwrap();

    let blocks = remote.blocks();
    let domains: Vec<Option<&str>> = blocks.iter().map(|b| b.domain()).collect();
    assert!(domains.contains(&Some("saved-feeds")));
    assert!(domains.contains(&Some("channel-read-state")));

    // The block this engine does not understand survived both writes verbatim
    let kept = blocks
        .iter()
        .find(|b| b.domain() == Some("mute-words"))
        .expect("foreign block preserved");
    assert_eq!(*kept, foreign);
}

#[tokio::test(start_paused = true)]
async fn test_saved_feeds_converge_after_refresh() {
    let remote = Arc::new(InMemoryRemote::new());

    let mut device_a = service();
    let mut device_b = service();
    device_a.sign_in("did:plc:me", Arc::clone(&remote)).await;
    device_b.sign_in("did:plc:me", Arc::clone(&remote)).await;
    settle().await;

    device_a
        .session()
        .unwrap()
        .saved_feeds()
        .add("feedA", true)
        .await
        .unwrap();

    let feeds_b = device_b.session().unwrap().saved_feeds();
    assert!(feeds_b.items().is_empty());
    feeds_b.refresh().await.unwrap();

    let items = feeds_b.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].reference, "feedA");
    assert!(items[0].pinned);
    assert_eq!(feeds_b.pinned_ids().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sign_out_discards_state_without_writing() {
    let remote = Arc::new(InMemoryRemote::new());

    let mut device = service();
    device.sign_in("did:plc:me", Arc::clone(&remote)).await;
    settle().await;
    device
        .session()
        .unwrap()
        .read_state()
        .mark_read_up_to("alice", "2026-08-01T10:00:00+00:00")
        .await
        .unwrap();

    let writes = remote.write_count();
    let fetches = remote.fetch_count();
    device.sign_out();
    assert!(device.session().is_none());
    assert!(device.actor_id().is_none());

    // Aborted agent, no farewell write, no further polling
    tokio::time::sleep(Duration::from_secs(90)).await;
    assert_eq!(remote.write_count(), writes);
    assert_eq!(remote.fetch_count(), fetches);
}

#[tokio::test(start_paused = true)]
async fn test_unread_digest_reflects_marks_end_to_end() {
    let remote = Arc::new(InMemoryRemote::new());
    let mut device = service();
    device.sign_in("did:plc:me", Arc::clone(&remote)).await;
    settle().await;
    let read_state = device.session().unwrap().read_state();

    let items = vec![
        FeedItem {
            actor_id: "alice".into(),
            timestamp: ts("2026-08-01T10:00:00+00:00"),
            reason: FeedReason::Post,
            reposting_actor_id: None,
        },
        FeedItem {
            actor_id: "alice".into(),
            timestamp: ts("2026-08-02T10:00:00+00:00"),
            reason: FeedReason::Post,
            reposting_actor_id: None,
        },
        FeedItem {
            actor_id: "alice".into(),
            timestamp: ts("2026-08-03T10:00:00+00:00"),
            reason: FeedReason::Post,
            reposting_actor_id: None,
        },
    ];

    // First contact: everything unread
    let digests = aggregate(&items, &read_state.last_viewed_timestamps());
    assert_eq!(digests[0].unread_count, 3);

    read_state
        .mark_read_up_to("alice", "2026-08-02T10:00:00+00:00")
        .await
        .unwrap();

    let digests = aggregate(&items, &read_state.last_viewed_timestamps());
    assert_eq!(digests[0].unread_count, 1);
}
