//! SavedFeedsSyncStore: the ordered pinned/saved feed list.
//!
//! Schema versioning is an explicit sum type: `SavedFeedsSchema` has one
//! variant per block schema and one upgrade function per version pair, so a
//! future v3 is one more variant and one more upgrade function, not
//! branching scattered through the store. The legacy v1 block is read-only;
//! the first write after migration retires it.

use crate::document::PreferenceBlock;
use crate::events::EventBus;
use crate::migrate::{decode_domain_block, PreferenceDomain};
use crate::remote::RemoteDocumentClient;
use crate::store::{PreferenceSyncStore, Result, SyncPhase};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// One entry in the saved-feeds list (current v2 schema).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedFeedItem {
    /// Stable unique id, preserved across reorders and pin toggles.
    pub id: String,
    /// Only `"feed"` today; invalid kinds are dropped on migration.
    pub kind: String,
    /// Feed locator. Uniqueness is not enforced by the store; consumers
    /// treat duplicates as the same logical entry (first match wins).
    pub reference: String,
    pub pinned: bool,
}

impl SavedFeedItem {
    fn fresh(reference: String, pinned: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: "feed".to_string(),
            reference,
            pinned,
        }
    }
}

/// Typed saved-feeds preference (current schema).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SavedFeeds {
    pub items: Vec<SavedFeedItem>,
}

/// Wire shape of the legacy v1 block.
#[derive(Debug, Deserialize)]
struct SavedFeedsV1 {
    #[serde(default)]
    pinned: Vec<String>,
    #[serde(default)]
    saved: Vec<String>,
}

/// Wire shape of the current v2 block, items left raw for per-item
/// validation.
#[derive(Debug, Deserialize)]
struct SavedFeedsV2 {
    #[serde(default)]
    items: Vec<Value>,
}

/// The saved-feeds block as found in a fetched document, one variant per
/// schema version.
enum SavedFeedsSchema {
    V1(SavedFeedsV1),
    V2(SavedFeedsV2),
}

impl SavedFeedsSchema {
    const DOMAIN_V2: &'static str = "saved-feeds";
    const DOMAIN_V1: &'static str = "saved-feeds-v1";

    /// Find the newest schema version present in the document.
    fn detect(blocks: &[PreferenceBlock]) -> Option<Self> {
        if let Some(v2) = decode_domain_block::<SavedFeedsV2>(blocks, Self::DOMAIN_V2) {
            return Some(Self::V2(v2));
        }
        decode_domain_block::<SavedFeedsV1>(blocks, Self::DOMAIN_V1).map(Self::V1)
    }

    /// Upgrade whatever version was found to the current typed shape.
    fn upgrade(self) -> SavedFeeds {
        match self {
            Self::V1(v1) => upgrade_v1(v1),
            Self::V2(v2) => validate_v2(v2),
        }
    }
}

/// v1 -> v2: union of `pinned` and `saved` (pinned first, deduplicated),
/// each entry assigned a fresh stable id, `pinned` set by membership in the
/// v1 pinned list.
fn upgrade_v1(v1: SavedFeedsV1) -> SavedFeeds {
    let pinned_set: BTreeSet<&String> = v1.pinned.iter().collect();
    let mut seen = BTreeSet::new();
    let mut items = Vec::new();

    for reference in v1.pinned.iter().chain(v1.saved.iter()) {
        if !seen.insert(reference.clone()) {
            continue;
        }
        items.push(SavedFeedItem::fresh(
            reference.clone(),
            pinned_set.contains(reference),
        ));
    }

    SavedFeeds { items }
}

/// v2 validation: drop invalid items one by one instead of failing the load.
fn validate_v2(v2: SavedFeedsV2) -> SavedFeeds {
    let mut items = Vec::new();
    for raw in v2.items {
        match serde_json::from_value::<SavedFeedItem>(raw.clone()) {
            Ok(item) if item.kind == "feed" => items.push(item),
            Ok(item) => {
                warn!("Dropping saved-feed item with unknown kind: {}", item.kind);
            }
            Err(err) => {
                warn!("Dropping malformed saved-feed item: {}", err);
            }
        }
    }
    SavedFeeds { items }
}

impl PreferenceDomain for SavedFeeds {
    const DOMAIN: &'static str = SavedFeedsSchema::DOMAIN_V2;

    fn legacy_domains() -> &'static [&'static str] {
        &[SavedFeedsSchema::DOMAIN_V1]
    }

    fn migrate(blocks: &[PreferenceBlock]) -> Self {
        SavedFeedsSchema::detect(blocks)
            .map(SavedFeedsSchema::upgrade)
            .unwrap_or_default()
    }

    fn to_block(&self) -> PreferenceBlock {
        PreferenceBlock::new(json!({
            "domain": Self::DOMAIN,
            "items": self.items,
        }))
    }
}

impl SavedFeeds {
    fn add(&self, reference: &str, pinned: bool) -> Self {
        let mut next = self.clone();
        match next.items.iter_mut().find(|i| i.reference == reference) {
            Some(existing) => existing.pinned = pinned,
            None => next.items.push(SavedFeedItem::fresh(reference.to_string(), pinned)),
        }
        next
    }

    fn remove(&self, id: &str) -> Self {
        let mut next = self.clone();
        next.items.retain(|i| i.id != id);
        next
    }

    fn toggle_pin(&self, id: &str) -> Self {
        let mut next = self.clone();
        if let Some(item) = next.items.iter_mut().find(|i| i.id == id) {
            item.pinned = !item.pinned;
        }
        next
    }

    /// Move a pinned item within the pinned subset. The unpinned tail keeps
    /// its relative order - it is not user-controllable.
    fn reorder_pinned(&self, from: usize, to: usize) -> Self {
        let mut pinned: Vec<SavedFeedItem> =
            self.items.iter().filter(|i| i.pinned).cloned().collect();
        let unpinned: Vec<SavedFeedItem> =
            self.items.iter().filter(|i| !i.pinned).cloned().collect();

        if from >= pinned.len() || to >= pinned.len() {
            return self.clone();
        }
        let moved = pinned.remove(from);
        pinned.insert(to, moved);

        let mut items = pinned;
        items.extend(unpinned);
        SavedFeeds { items }
    }
}

/// Saved-feeds specialization of the generic sync store.
///
/// Every operation goes through `mutate()`: the updater is replayed against
/// the freshly fetched server list, so a pin toggled here lands on whatever
/// list the server holds by then, not on a stale local copy.
pub struct SavedFeedsSyncStore<R: RemoteDocumentClient> {
    store: PreferenceSyncStore<SavedFeeds, R>,
}

impl<R: RemoteDocumentClient> SavedFeedsSyncStore<R> {
    pub fn new(remote: R, events: Arc<EventBus>) -> Self {
        Self {
            store: PreferenceSyncStore::new(remote, events),
        }
    }

    pub async fn load(&self) -> Result<()> {
        self.store.load().await
    }

    pub fn items(&self) -> Vec<SavedFeedItem> {
        self.store.value().items
    }

    /// Ids of the currently pinned items, for the UI's derived set.
    pub fn pinned_ids(&self) -> BTreeSet<String> {
        self.store
            .value()
            .items
            .into_iter()
            .filter(|i| i.pinned)
            .map(|i| i.id)
            .collect()
    }

    pub fn phase(&self) -> SyncPhase {
        self.store.phase()
    }

    pub fn is_loading(&self) -> bool {
        self.store.is_loading()
    }

    pub fn last_error(&self) -> Option<String> {
        self.store.last_error()
    }

    /// Save a feed, pinning it if requested. An existing entry with this
    /// reference gets its pinned flag updated instead of a duplicate.
    pub async fn add(&self, reference: &str, pinned: bool) -> Result<()> {
        let reference = reference.to_string();
        self.store.mutate(move |s| s.add(&reference, pinned)).await
    }

    pub async fn remove(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.store.mutate(move |s| s.remove(&id)).await
    }

    pub async fn toggle_pin(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.store.mutate(move |s| s.toggle_pin(&id)).await
    }

    /// Reorder within the pinned subset. Out-of-range indices (a stale view)
    /// and `from == to` are a local no-op with no remote round-trip; the
    /// next refresh converges any stale view.
    pub async fn reorder_pinned(&self, from: usize, to: usize) -> Result<()> {
        let pinned_len = self.store.value().items.iter().filter(|i| i.pinned).count();
        if from == to || from >= pinned_len || to >= pinned_len {
            return Ok(());
        }
        self.store.mutate(move |s| s.reorder_pinned(from, to)).await
    }
}
