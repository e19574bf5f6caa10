//! PreferenceDomain trait: schema-aware view of one document slice.
//!
//! Each preference domain (saved feeds, channel read-state) owns a current
//! block schema plus any legacy schemas it supersedes. Migration is total:
//! a missing block yields the empty shape, a legacy block is upgraded, and
//! malformed fields are dropped item-by-item rather than failing the whole
//! load - partial data beats total failure.

use crate::document::{self, PreferenceBlock};

use serde::de::DeserializeOwned;
use tracing::warn;

/// A typed preference domain backed by one block of the remote document.
///
/// `migrate` must be pure and idempotent: migrating an already-current shape
/// returns it unchanged (modulo invalid-item filtering).
pub trait PreferenceDomain: Clone + Send + 'static {
    /// Current domain tag, e.g. `"saved-feeds"`.
    const DOMAIN: &'static str;

    /// Legacy domain tags this schema supersedes. Blocks under these tags
    /// are read for migration and retired on the next write.
    fn legacy_domains() -> &'static [&'static str] {
        &[]
    }

    /// Derive the current typed shape from a fetched document.
    fn migrate(blocks: &[PreferenceBlock]) -> Self;

    /// Serialize back into a current-schema block.
    fn to_block(&self) -> PreferenceBlock;

    /// All domain tags a write of this domain replaces.
    fn replaced_domains() -> Vec<&'static str> {
        let mut tags = vec![Self::DOMAIN];
        tags.extend_from_slice(Self::legacy_domains());
        tags
    }
}

/// Decode the authoritative block for `domain` into `T`.
///
/// Returns `None` if the block is absent or does not decode; a present but
/// malformed block is logged and treated as absent rather than failing the
/// load.
pub fn decode_domain_block<T: DeserializeOwned>(
    blocks: &[PreferenceBlock],
    domain: &str,
) -> Option<T> {
    let block = document::find_domain_block(blocks, domain)?;
    match serde_json::from_value(block.value().clone()) {
        Ok(decoded) => Some(decoded),
        Err(err) => {
            warn!("Discarding malformed {} block: {}", domain, err);
            None
        }
    }
}
