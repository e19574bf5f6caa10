//! RemoteDocumentClient trait: the two whole-document verbs the store exposes.
//!
//! The remote preference store offers no partial updates, no transactions,
//! and no versioning token. Everything above this layer (merging, schema
//! migration, optimistic state) exists to paper over that interface.
//!
//! Implementations:
//! - `InMemoryRemote` - For testing
//! - An HTTP-backed client wired to the session's authenticated transport
//!   (lives with the session provider, not in this crate)

use crate::document::PreferenceBlock;

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// Transient network or auth failure. Recoverable by retry/refresh.
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// The server rejected the payload. Not auto-retried; surfaced verbatim.
    #[error("remote rejected write: {0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, RemoteError>;

/// Client for the remote preference document.
///
/// `fetch` returns the full current block list or fails - never a partial
/// list. `write` replaces the entire list; the call is treated as
/// all-or-nothing from this side. No caching and no retries at this layer.
#[async_trait]
pub trait RemoteDocumentClient: Send + Sync {
    /// Fetch the full preference document.
    async fn fetch(&self) -> Result<Vec<PreferenceBlock>>;

    /// Replace the full preference document.
    async fn write(&self, blocks: Vec<PreferenceBlock>) -> Result<()>;
}

// Implement RemoteDocumentClient for Arc<T> where T: RemoteDocumentClient
// This allows sharing one remote between multiple stores in tests
#[async_trait]
impl<T: RemoteDocumentClient> RemoteDocumentClient for std::sync::Arc<T> {
    async fn fetch(&self) -> Result<Vec<PreferenceBlock>> {
        (**self).fetch().await
    }

    async fn write(&self, blocks: Vec<PreferenceBlock>) -> Result<()> {
        (**self).write(blocks).await
    }
}

/// In-memory remote document for testing.
///
/// Tracks fetch/write counts and supports one-shot failure injection so
/// tests can exercise the rollback and single-flight paths.
pub struct InMemoryRemote {
    blocks: RwLock<Vec<PreferenceBlock>>,
    fetch_count: AtomicUsize,
    write_count: AtomicUsize,
    fail_next_fetch: Mutex<Vec<RemoteError>>,
    fail_next_write: Mutex<Vec<RemoteError>>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::with_blocks(Vec::new())
    }

    pub fn with_blocks(blocks: Vec<PreferenceBlock>) -> Self {
        Self {
            blocks: RwLock::new(blocks),
            fetch_count: AtomicUsize::new(0),
            write_count: AtomicUsize::new(0),
            fail_next_fetch: Mutex::new(Vec::new()),
            fail_next_write: Mutex::new(Vec::new()),
        }
    }

    /// Replace the stored document directly, bypassing the counters.
    ///
    /// Simulates another device writing between this client's round-trips.
    pub fn set_blocks(&self, blocks: Vec<PreferenceBlock>) {
        *self.blocks.write().unwrap() = blocks;
    }

    /// Snapshot of the stored document.
    pub fn blocks(&self) -> Vec<PreferenceBlock> {
        self.blocks.read().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }

    /// Queue a failure for an upcoming `fetch`. Each queued error fails one
    /// call; queue several to fail consecutive fetches.
    pub fn fail_next_fetch(&self, err: RemoteError) {
        self.fail_next_fetch.lock().unwrap().push(err);
    }

    /// Queue a failure for an upcoming `write`.
    pub fn fail_next_write(&self, err: RemoteError) {
        self.fail_next_write.lock().unwrap().push(err);
    }
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteDocumentClient for InMemoryRemote {
    async fn fetch(&self) -> Result<Vec<PreferenceBlock>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        let failure = {
            let mut queue = self.fail_next_fetch.lock().unwrap();
            if queue.is_empty() { None } else { Some(queue.remove(0)) }
        };
        if let Some(err) = failure {
            return Err(err);
        }
        Ok(self.blocks.read().unwrap().clone())
    }

    async fn write(&self, blocks: Vec<PreferenceBlock>) -> Result<()> {
        self.write_count.fetch_add(1, Ordering::SeqCst);
        let failure = {
            let mut queue = self.fail_next_write.lock().unwrap();
            if queue.is_empty() { None } else { Some(queue.remove(0)) }
        };
        if let Some(err) = failure {
            return Err(err);
        }
        *self.blocks.write().unwrap() = blocks;
        Ok(())
    }
}
