//! prefs-core: client-side preference synchronization and read-state
//! aggregation against a whole-document remote store.
//!
//! This crate provides the core functionality for:
//! - Fetching/writing the single remote preference document (type-tagged
//!   JSON blocks, whole-document verbs only)
//! - Migrating legacy block schemas into the current shape
//! - The generic fetch-merge-write sync engine with optimistic local state
//! - Channel read-state tracking and saved-feeds management on top of it
//! - Folding a feed sequence into per-actor unread digests

pub mod digest;
pub mod document;
pub mod events;
pub mod migrate;
pub mod read_state;
pub mod remote;
pub mod saved_feeds;
pub mod store;

pub use digest::{aggregate, ActorDigest, FeedItem, FeedReason};
pub use document::PreferenceBlock;
pub use events::{EventBus, PrefEvent, Subscription};
pub use migrate::PreferenceDomain;
pub use read_state::{ChannelReadState, ChannelReadStateTracker, ReadStateError};
pub use remote::{InMemoryRemote, RemoteDocumentClient, RemoteError};
pub use saved_feeds::{SavedFeedItem, SavedFeeds, SavedFeedsSyncStore};
pub use store::{PreferenceSyncStore, SyncError, SyncPhase};
