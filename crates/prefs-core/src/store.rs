//! PreferenceSyncStore: the generic fetch-merge-write engine.
//!
//! The remote store only speaks whole-document read and whole-document
//! write, so every mutation here is a full read-merge-write round-trip:
//!
//! 1. Apply the updater optimistically to local state (zero-latency UI)
//! 2. Re-fetch the full document and re-derive this domain's server value
//! 3. Re-apply the updater to that fresh server value - never push the
//!    stale pre-mutation local value
//! 4. Write back this domain's new block plus every other domain's block
//!    verbatim from the fresh fetch
//!
//! On failure the optimistic value is discarded and the store resyncs with
//! server truth (rollback-via-refetch, not a hand-rolled undo). A single
//! in-flight guard bounds the store to one round-trip at a time; overlapping
//! calls are dropped, not queued.

use crate::document::replace_domain;
use crate::events::{EventBus, PrefEvent};
use crate::migrate::PreferenceDomain;
use crate::remote::{RemoteDocumentClient, RemoteError};

use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Another load/mutate round-trip is in flight; this call was dropped.
    /// Callers must be idempotent or rely on the next refresh to converge.
    #[error("a sync round-trip is already in flight for {domain}")]
    Busy { domain: &'static str },

    /// `mutate` before the first successful `load`. The host always loads at
    /// sign-in, so hitting this is a caller bug, not a runtime condition.
    #[error("preferences for {domain} have not been loaded yet")]
    NotLoaded { domain: &'static str },
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Store lifecycle per domain.
///
/// `Idle -> Loading -> Ready`, then `Ready -> Mutating -> Ready` on success
/// or `Mutating -> Reconciling -> Ready` on the failure path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Loading,
    Ready,
    Mutating,
    Reconciling,
}

impl SyncPhase {
    /// Whether a remote round-trip is currently in flight.
    pub fn in_flight(self) -> bool {
        matches!(self, Self::Loading | Self::Mutating | Self::Reconciling)
    }
}

struct Inner<D> {
    phase: SyncPhase,
    value: D,
    last_error: Option<String>,
}

/// Generic preference engine for one domain of the remote document.
///
/// Parameterized by the remote client and constructed once per session -
/// explicitly injected, never an ambient singleton.
pub struct PreferenceSyncStore<D: PreferenceDomain, R: RemoteDocumentClient> {
    remote: R,
    inner: Mutex<Inner<D>>,
    events: Arc<EventBus>,
}

impl<D: PreferenceDomain, R: RemoteDocumentClient> PreferenceSyncStore<D, R> {
    pub fn new(remote: R, events: Arc<EventBus>) -> Self {
        Self {
            remote,
            inner: Mutex::new(Inner {
                phase: SyncPhase::Idle,
                value: D::migrate(&[]),
                last_error: None,
            }),
            events,
        }
    }

    // The mutex is only ever held for local bookkeeping, never across an
    // await - the phase flag is what guards the remote round-trip.
    fn lock(&self) -> MutexGuard<'_, Inner<D>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of the current local value.
    pub fn value(&self) -> D {
        self.lock().value.clone()
    }

    pub fn phase(&self) -> SyncPhase {
        self.lock().phase
    }

    /// Whether a remote round-trip is in flight (UI spinner state).
    pub fn is_loading(&self) -> bool {
        self.lock().phase.in_flight()
    }

    /// Message of the most recent failed round-trip, cleared on success.
    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Fetch the full document, migrate this domain, adopt the result.
    ///
    /// Fails fast with `Busy` while any round-trip is in flight - periodic
    /// and visibility-triggered refreshes coalesce on this guard. On fetch
    /// failure prior state is untouched and the error bubbles to the UI;
    /// there is no automatic retry at this layer.
    pub async fn load(&self) -> Result<()> {
        let prior = {
            let mut inner = self.lock();
            if inner.phase.in_flight() {
                debug!("{}: load dropped, round-trip in flight", D::DOMAIN);
                return Err(SyncError::Busy { domain: D::DOMAIN });
            }
            let prior = inner.phase;
            inner.phase = SyncPhase::Loading;
            prior
        };

        match self.remote.fetch().await {
            Ok(blocks) => {
                let value = D::migrate(&blocks);
                {
                    let mut inner = self.lock();
                    inner.value = value;
                    inner.phase = SyncPhase::Ready;
                    inner.last_error = None;
                }
                debug!("{}: loaded server state", D::DOMAIN);
                self.events.emit(PrefEvent::Loaded { domain: D::DOMAIN });
                Ok(())
            }
            Err(err) => {
                {
                    let mut inner = self.lock();
                    inner.phase = prior;
                    inner.last_error = Some(err.to_string());
                }
                self.events.emit(PrefEvent::SyncFailed {
                    domain: D::DOMAIN,
                    message: err.to_string(),
                });
                Err(err.into())
            }
        }
    }

    /// Apply `updater` optimistically, then read-merge-write it against the
    /// latest server state.
    ///
    /// The updater runs twice: once against local state for the optimistic
    /// snapshot, once against the freshly fetched server value that is
    /// actually written. It must therefore be a pure function of its input.
    ///
    /// Rejected with `Busy` while another round-trip is in flight (dropped,
    /// not queued). On failure the optimistic value is discarded, the store
    /// resyncs with server truth, and the original error bubbles.
    pub async fn mutate<F>(&self, updater: F) -> Result<()>
    where
        F: Fn(&D) -> D + Send + Sync,
    {
        let before = {
            let mut inner = self.lock();
            if inner.phase == SyncPhase::Idle {
                return Err(SyncError::NotLoaded { domain: D::DOMAIN });
            }
            if inner.phase.in_flight() {
                debug!("{}: mutate dropped, round-trip in flight", D::DOMAIN);
                return Err(SyncError::Busy { domain: D::DOMAIN });
            }
            let before = inner.value.clone();
            inner.value = updater(&inner.value);
            inner.phase = SyncPhase::Mutating;
            before
        };

        match self.round_trip(&updater).await {
            Ok(written) => {
                {
                    let mut inner = self.lock();
                    inner.value = written;
                    inner.phase = SyncPhase::Ready;
                    inner.last_error = None;
                }
                debug!("{}: mutation committed", D::DOMAIN);
                self.events.emit(PrefEvent::Mutated { domain: D::DOMAIN });
                Ok(())
            }
            Err(err) => {
                // Restore the pre-mutation snapshot first so the optimistic
                // value cannot linger even if the resync fetch fails too.
                {
                    let mut inner = self.lock();
                    inner.value = before;
                    inner.phase = SyncPhase::Reconciling;
                    inner.last_error = Some(err.to_string());
                }
                warn!("{}: mutation failed ({}), resyncing with server", D::DOMAIN, err);
                self.events.emit(PrefEvent::SyncFailed {
                    domain: D::DOMAIN,
                    message: err.to_string(),
                });
                self.resync().await;
                self.events.emit(PrefEvent::RolledBack { domain: D::DOMAIN });
                Err(err.into())
            }
        }
    }

    /// One fetch-merge-write leg: replay the updater against fresh server
    /// state and write back the assembled document.
    async fn round_trip<F>(&self, updater: &F) -> std::result::Result<D, RemoteError>
    where
        F: Fn(&D) -> D + Send + Sync,
    {
        let blocks = self.remote.fetch().await?;
        let server = D::migrate(&blocks);
        let next = updater(&server);
        let outgoing = replace_domain(&blocks, &D::replaced_domains(), next.to_block());
        self.remote.write(outgoing).await?;
        Ok(next)
    }

    /// Best-effort resync after a failed mutation.
    ///
    /// If even this fetch fails the store keeps the restored pre-mutation
    /// snapshot - stale but consistent with something the server once held.
    async fn resync(&self) {
        match self.remote.fetch().await {
            Ok(blocks) => {
                let value = D::migrate(&blocks);
                let mut inner = self.lock();
                inner.value = value;
                inner.phase = SyncPhase::Ready;
            }
            Err(err) => {
                warn!("{}: rollback resync failed ({}), keeping pre-mutation state", D::DOMAIN, err);
                self.lock().phase = SyncPhase::Ready;
            }
        }
    }
}
