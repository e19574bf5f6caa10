//! ChannelReadStateTracker: per-actor "last viewed" markers.
//!
//! One preference domain holding a map from actor id to an ISO-8601
//! timestamp. Marks are last-write-wins but monotonic: a read marker never
//! moves backward, locally or across devices. The cross-device half of that
//! guarantee lives in the mutate updater, which is replayed against the
//! freshly fetched server value inside the generic engine - a device racing
//! to mark reads can only ever advance the server's marker.

use crate::document::PreferenceBlock;
use crate::events::EventBus;
use crate::migrate::{decode_domain_block, PreferenceDomain};
use crate::remote::RemoteDocumentClient;
use crate::store::{PreferenceSyncStore, SyncError};

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ReadStateError {
    #[error("invalid ISO-8601 timestamp: {0}")]
    InvalidTimestamp(#[from] chrono::ParseError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

pub type Result<T> = std::result::Result<T, ReadStateError>;

/// Wire shape of the channel read-state block.
#[derive(Debug, Deserialize)]
struct ChannelReadBlock {
    #[serde(default)]
    channels: BTreeMap<String, String>,
}

/// Typed channel read-state: actor id -> last viewed instant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelReadState {
    channels: BTreeMap<String, DateTime<FixedOffset>>,
}

impl ChannelReadState {
    pub fn last_viewed(&self, actor_id: &str) -> Option<DateTime<FixedOffset>> {
        self.channels.get(actor_id).copied()
    }

    pub fn channels(&self) -> &BTreeMap<String, DateTime<FixedOffset>> {
        &self.channels
    }

    /// Advance the marker for `actor_id`, never moving it backward.
    fn advance(&self, actor_id: &str, ts: DateTime<FixedOffset>) -> Self {
        let mut next = self.clone();
        match next.channels.get(actor_id) {
            Some(existing) if *existing >= ts => {}
            _ => {
                next.channels.insert(actor_id.to_string(), ts);
            }
        }
        next
    }
}

impl PreferenceDomain for ChannelReadState {
    const DOMAIN: &'static str = "channel-read-state";

    fn migrate(blocks: &[PreferenceBlock]) -> Self {
        let Some(block) = decode_domain_block::<ChannelReadBlock>(blocks, Self::DOMAIN) else {
            return Self::default();
        };

        let mut channels = BTreeMap::new();
        for (actor_id, raw) in block.channels {
            match DateTime::parse_from_rfc3339(&raw) {
                Ok(ts) => {
                    channels.insert(actor_id, ts);
                }
                Err(err) => {
                    // Partial data beats total failure: drop just this entry
                    warn!("Dropping invalid read-state timestamp for {}: {}", actor_id, err);
                }
            }
        }
        Self { channels }
    }

    fn to_block(&self) -> PreferenceBlock {
        let channels: BTreeMap<&str, String> = self
            .channels
            .iter()
            .map(|(actor, ts)| (actor.as_str(), ts.to_rfc3339()))
            .collect();
        PreferenceBlock::new(json!({
            "domain": Self::DOMAIN,
            "channels": channels,
        }))
    }
}

/// Read-state specialization of the generic sync store.
pub struct ChannelReadStateTracker<R: RemoteDocumentClient> {
    store: PreferenceSyncStore<ChannelReadState, R>,
}

impl<R: RemoteDocumentClient> ChannelReadStateTracker<R> {
    pub fn new(remote: R, events: Arc<EventBus>) -> Self {
        Self {
            store: PreferenceSyncStore::new(remote, events),
        }
    }

    pub fn last_viewed(&self, actor_id: &str) -> Option<DateTime<FixedOffset>> {
        self.store.value().last_viewed(actor_id)
    }

    /// Snapshot of all markers, for the aggregator and the UI.
    pub fn snapshot(&self) -> BTreeMap<String, DateTime<FixedOffset>> {
        self.store.value().channels.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.store.is_loading()
    }

    pub fn last_error(&self) -> Option<String> {
        self.store.last_error()
    }

    /// Refresh from the server. Overlapping triggers (interval tick,
    /// visibility transition) coalesce on the store's single-flight guard.
    pub async fn refresh(&self) -> Result<()> {
        self.store.load().await.map_err(Into::into)
    }

    /// Move the read marker for `actor_id` forward to `ts`.
    ///
    /// No-op without remote traffic if the local marker is already at or
    /// past `ts`. Otherwise the updater only overwrites the server's marker
    /// when the server's is older - two devices racing to mark reads cannot
    /// stomp a newer mark with an older one.
    pub async fn mark_read_up_to(&self, actor_id: &str, ts: DateTime<FixedOffset>) -> Result<()> {
        if self
            .last_viewed(actor_id)
            .is_some_and(|existing| existing >= ts)
        {
            debug!("Read marker for {} already at or past timestamp", actor_id);
            return Ok(());
        }

        let actor_id = actor_id.to_string();
        self.store
            .mutate(move |server| server.advance(&actor_id, ts))
            .await?;
        Ok(())
    }

    /// RFC 3339 front-end for `mark_read_up_to`, matching the UI surface.
    pub async fn mark_read_up_to_iso(&self, actor_id: &str, iso: &str) -> Result<()> {
        let ts = DateTime::parse_from_rfc3339(iso)?;
        self.mark_read_up_to(actor_id, ts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::InMemoryRemote;
    use serde_json::json;

    fn ts(iso: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(iso).unwrap()
    }

    fn tracker_with(
        remote: Arc<InMemoryRemote>,
    ) -> ChannelReadStateTracker<Arc<InMemoryRemote>> {
        ChannelReadStateTracker::new(remote, Arc::new(EventBus::new()))
    }

    #[tokio::test]
    async fn test_migrate_drops_invalid_timestamps() {
        let blocks = vec![PreferenceBlock::new(json!({
            "domain": "channel-read-state",
            "channels": {
                "alice": "2026-08-01T10:00:00+00:00",
                "bob": "not-a-timestamp",
            }
        }))];

        let state = ChannelReadState::migrate(&blocks);
        assert_eq!(state.last_viewed("alice"), Some(ts("2026-08-01T10:00:00+00:00")));
        assert_eq!(state.last_viewed("bob"), None);
    }

    #[tokio::test]
    async fn test_migrate_missing_block_is_empty() {
        let state = ChannelReadState::migrate(&[]);
        assert!(state.channels().is_empty());
    }

    #[tokio::test]
    async fn test_mark_read_is_monotonic() {
        let remote = Arc::new(InMemoryRemote::new());
        let tracker = tracker_with(Arc::clone(&remote));
        tracker.refresh().await.unwrap();

        let t1 = ts("2026-08-01T10:00:00+00:00");
        let t2 = ts("2026-08-02T10:00:00+00:00");

        tracker.mark_read_up_to("alice", t2).await.unwrap();
        let writes = remote.write_count();

        // Older mark is a local no-op: no remote traffic, value unchanged
        tracker.mark_read_up_to("alice", t1).await.unwrap();
        assert_eq!(remote.write_count(), writes);
        assert_eq!(tracker.last_viewed("alice"), Some(t2));
    }

    #[tokio::test]
    async fn test_equal_timestamp_is_a_no_op() {
        let remote = Arc::new(InMemoryRemote::new());
        let tracker = tracker_with(Arc::clone(&remote));
        tracker.refresh().await.unwrap();

        let t1 = ts("2026-08-01T10:00:00+00:00");
        tracker.mark_read_up_to("alice", t1).await.unwrap();
        let writes = remote.write_count();
        tracker.mark_read_up_to("alice", t1).await.unwrap();
        assert_eq!(remote.write_count(), writes);
    }

    #[tokio::test]
    async fn test_server_newer_marker_wins_over_local_mark() {
        let remote = Arc::new(InMemoryRemote::new());
        let tracker = tracker_with(Arc::clone(&remote));
        tracker.refresh().await.unwrap();

        // Another device already marked alice read up to t3
        let t3 = ts("2026-08-03T10:00:00+00:00");
        remote.set_blocks(vec![PreferenceBlock::new(json!({
            "domain": "channel-read-state",
            "channels": {"alice": t3.to_rfc3339()}
        }))]);

        // We only know about t2 locally; the replayed updater must keep t3
        let t2 = ts("2026-08-02T10:00:00+00:00");
        tracker.mark_read_up_to("alice", t2).await.unwrap();

        assert_eq!(tracker.last_viewed("alice"), Some(t3));
        let written = ChannelReadState::migrate(&remote.blocks());
        assert_eq!(written.last_viewed("alice"), Some(t3));
    }

    #[tokio::test]
    async fn test_offsets_compare_as_instants() {
        let remote = Arc::new(InMemoryRemote::new());
        let tracker = tracker_with(remote);
        tracker.refresh().await.unwrap();

        // Same instant expressed in two offsets
        tracker
            .mark_read_up_to_iso("alice", "2026-08-01T12:00:00+02:00")
            .await
            .unwrap();
        tracker
            .mark_read_up_to_iso("alice", "2026-08-01T10:00:00+00:00")
            .await
            .unwrap();

        assert_eq!(
            tracker.last_viewed("alice").unwrap(),
            ts("2026-08-01T12:00:00+02:00")
        );
    }

    #[tokio::test]
    async fn test_invalid_iso_is_rejected() {
        let tracker = tracker_with(Arc::new(InMemoryRemote::new()));
        tracker.refresh().await.unwrap();
        let err = tracker.mark_read_up_to_iso("alice", "yesterday").await.unwrap_err();
        assert!(matches!(err, ReadStateError::InvalidTimestamp(_)));
    }
}
