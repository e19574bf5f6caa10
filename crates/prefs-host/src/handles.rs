//! UI-facing surfaces over the preference engine.
//!
//! Thin snapshot-and-method wrappers the rendering layer consumes. The
//! handles never block on the engine: snapshots are cheap clones of local
//! state, mutations await the round-trip and surface typed errors for the
//! UI to toast.

use crate::refresh::RefreshAgent;

use prefs_core::read_state::{ChannelReadStateTracker, ReadStateError};
use prefs_core::remote::RemoteDocumentClient;
use prefs_core::saved_feeds::{SavedFeedItem, SavedFeedsSyncStore};
use prefs_core::store::Result as SyncResult;

use chrono::{DateTime, FixedOffset};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Read-state surface for the view layer: marker snapshots plus the
/// mark-read and refresh entry points.
pub struct ChannelReadStateHandle<R: RemoteDocumentClient + 'static> {
    tracker: Arc<ChannelReadStateTracker<R>>,
    agent: RefreshAgent,
}

impl<R: RemoteDocumentClient + 'static> ChannelReadStateHandle<R> {
    pub(crate) fn new(tracker: Arc<ChannelReadStateTracker<R>>, agent: RefreshAgent) -> Self {
        Self { tracker, agent }
    }

    /// Snapshot of every actor's last-viewed marker.
    pub fn last_viewed_timestamps(&self) -> BTreeMap<String, DateTime<FixedOffset>> {
        self.tracker.snapshot()
    }

    pub fn last_viewed(&self, actor_id: &str) -> Option<DateTime<FixedOffset>> {
        self.tracker.last_viewed(actor_id)
    }

    /// Advance an actor's read marker (ISO-8601 input from the view layer).
    pub async fn mark_read_up_to(&self, actor_id: &str, iso: &str) -> Result<(), ReadStateError> {
        self.tracker.mark_read_up_to_iso(actor_id, iso).await
    }

    /// Explicit refresh entry point, same path the background agent uses.
    pub async fn refresh(&self) -> Result<(), ReadStateError> {
        self.tracker.refresh().await
    }

    /// Forward a visibility/foreground transition to the refresh agent.
    pub fn notify_visible(&self) {
        self.agent.notify_visible();
    }

    pub fn is_loading(&self) -> bool {
        self.tracker.is_loading()
    }

    pub fn last_error(&self) -> Option<String> {
        self.tracker.last_error()
    }
}

/// Saved-feeds surface for the view layer.
pub struct SavedFeedsHandle<R: RemoteDocumentClient + 'static> {
    store: Arc<SavedFeedsSyncStore<R>>,
}

impl<R: RemoteDocumentClient + 'static> SavedFeedsHandle<R> {
    pub(crate) fn new(store: Arc<SavedFeedsSyncStore<R>>) -> Self {
        Self { store }
    }

    pub fn items(&self) -> Vec<SavedFeedItem> {
        self.store.items()
    }

    pub fn pinned_ids(&self) -> BTreeSet<String> {
        self.store.pinned_ids()
    }

    pub async fn add(&self, reference: &str, pinned: bool) -> SyncResult<()> {
        self.store.add(reference, pinned).await
    }

    pub async fn remove(&self, id: &str) -> SyncResult<()> {
        self.store.remove(id).await
    }

    pub async fn toggle_pin(&self, id: &str) -> SyncResult<()> {
        self.store.toggle_pin(id).await
    }

    pub async fn reorder_pinned(&self, from: usize, to: usize) -> SyncResult<()> {
        self.store.reorder_pinned(from, to).await
    }

    /// Re-pull server state, e.g. after another device may have written.
    pub async fn refresh(&self) -> SyncResult<()> {
        self.store.load().await
    }

    pub fn is_loading(&self) -> bool {
        self.store.is_loading()
    }

    pub fn last_error(&self) -> Option<String> {
        self.store.last_error()
    }
}
