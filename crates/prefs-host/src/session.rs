//! Session lifecycle for the preference engine.
//!
//! The engine is inert without an authenticated actor. `sign_in` constructs
//! every component explicitly from the remote client it is handed - there
//! are no ambient singletons - and `sign_out` drops the whole session,
//! discarding local preference state immediately without writing anything.

use crate::handles::{ChannelReadStateHandle, SavedFeedsHandle};
use crate::refresh::{RefreshAgent, RefreshConfig};

use prefs_core::events::EventBus;
use prefs_core::read_state::ChannelReadStateTracker;
use prefs_core::remote::RemoteDocumentClient;
use prefs_core::saved_feeds::SavedFeedsSyncStore;

use std::sync::Arc;
use tracing::{info, warn};

/// One authenticated actor's live preference engine.
pub struct PrefsSession<R: RemoteDocumentClient + 'static> {
    actor_id: String,
    events: Arc<EventBus>,
    read_state: ChannelReadStateHandle<Arc<R>>,
    saved_feeds: SavedFeedsHandle<Arc<R>>,
}

impl<R: RemoteDocumentClient + 'static> PrefsSession<R> {
    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }

    /// Shared event bus; the UI subscribes here to re-render on changes.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn read_state(&self) -> &ChannelReadStateHandle<Arc<R>> {
        &self.read_state
    }

    pub fn saved_feeds(&self) -> &SavedFeedsHandle<Arc<R>> {
        &self.saved_feeds
    }
}

/// Owner of the optional session: `None` means unauthenticated and the
/// engine does nothing at all.
pub struct PrefsService<R: RemoteDocumentClient + 'static> {
    config: RefreshConfig,
    session: Option<PrefsSession<R>>,
}

impl<R: RemoteDocumentClient + 'static> PrefsService<R> {
    pub fn new() -> Self {
        Self::with_config(RefreshConfig::default())
    }

    pub fn with_config(config: RefreshConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    /// Build a session for `actor_id` on top of `remote`.
    ///
    /// Kicks the initial saved-feeds load (the read-state load is the
    /// refresh agent's immediate first tick). A failed initial load is
    /// logged and surfaced through `last_error` - the session still comes
    /// up, stale until the next refresh or retry.
    pub async fn sign_in(&mut self, actor_id: impl Into<String>, remote: R) -> &PrefsSession<R> {
        // Replacing an existing session discards it first
        self.sign_out();

        let actor_id = actor_id.into();
        info!("Signing in {}, starting preference engine", actor_id);

        let remote = Arc::new(remote);
        let events = Arc::new(EventBus::new());

        let tracker = Arc::new(ChannelReadStateTracker::new(
            Arc::clone(&remote),
            Arc::clone(&events),
        ));
        let agent = RefreshAgent::spawn(Arc::clone(&tracker), self.config.clone());

        let saved = Arc::new(SavedFeedsSyncStore::new(
            Arc::clone(&remote),
            Arc::clone(&events),
        ));
        if let Err(err) = saved.load().await {
            warn!("Initial saved-feeds load failed for {}: {}", actor_id, err);
        }

        self.session.insert(PrefsSession {
            actor_id,
            events,
            read_state: ChannelReadStateHandle::new(tracker, agent),
            saved_feeds: SavedFeedsHandle::new(saved),
        })
    }

    /// Drop the session: all local preference state is discarded
    /// immediately, the refresh task is aborted, nothing is written.
    pub fn sign_out(&mut self) {
        if let Some(session) = self.session.take() {
            info!("Signed out {}, discarding local preference state", session.actor_id);
        }
    }

    pub fn session(&self) -> Option<&PrefsSession<R>> {
        self.session.as_ref()
    }

    pub fn actor_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.actor_id.as_str())
    }
}

impl<R: RemoteDocumentClient + 'static> Default for PrefsService<R> {
    fn default() -> Self {
        Self::new()
    }
}
