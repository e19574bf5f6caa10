//! Background refresh for the channel read-state tracker.
//!
//! A repeating timer and a visibility signal both call the same refresh
//! entry point; overlapping triggers are coalesced by the store's
//! single-flight guard, so neither source needs to know about the other.
//! The agent task is aborted on drop - sign-out cannot leave a dangling
//! refresh loop behind.

use prefs_core::read_state::{ChannelReadStateTracker, ReadStateError};
use prefs_core::remote::RemoteDocumentClient;
use prefs_core::store::SyncError;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Fixed interval between background refreshes.
    pub interval: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(20),
        }
    }
}

/// Spawned task that keeps a read-state tracker fresh.
pub struct RefreshAgent {
    task: JoinHandle<()>,
    visibility: Arc<Notify>,
}

impl RefreshAgent {
    /// Spawn the refresh loop: an immediate initial load, then one refresh
    /// per interval tick or visibility transition, whichever fires.
    pub fn spawn<R: RemoteDocumentClient + 'static>(
        tracker: Arc<ChannelReadStateTracker<R>>,
        config: RefreshConfig,
    ) -> Self {
        let visibility = Arc::new(Notify::new());
        let signal = Arc::clone(&visibility);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.interval);
            // A tick that backs up behind a slow fetch should not burst
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                // The first interval tick resolves immediately, which doubles
                // as the initial load on construction.
                tokio::select! {
                    _ = ticker.tick() => refresh(&tracker).await,
                    _ = signal.notified() => refresh(&tracker).await,
                }
            }
        });

        Self { task, visibility }
    }

    /// Report a visibility/foreground transition from the host environment.
    pub fn notify_visible(&self) {
        self.visibility.notify_one();
    }
}

impl Drop for RefreshAgent {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn refresh<R: RemoteDocumentClient>(tracker: &ChannelReadStateTracker<R>) {
    match tracker.refresh().await {
        Ok(()) => {}
        Err(ReadStateError::Sync(SyncError::Busy { .. })) => {
            debug!("Refresh trigger coalesced, round-trip already in flight");
        }
        Err(err) => {
            // Stale until the next trigger; nothing here is fatal
            warn!("Background read-state refresh failed: {}", err);
        }
    }
}
