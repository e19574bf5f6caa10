//! PreferenceBlock: one type-tagged slice of the remote preference document.
//!
//! The remote store holds a single document: an ordered list of JSON blocks,
//! each tagged with a `domain` string. This engine only ever interprets the
//! domains it owns; every other block is carried through verbatim so a write
//! can never drop a preference domain it does not understand.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single domain-tagged block from the remote preference document.
///
/// The inner JSON is deliberately left opaque. Blocks for foreign domains are
/// never re-shaped, re-keyed, or re-ordered internally, which is what lets a
/// subsequent whole-document write round-trip them byte-for-byte.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreferenceBlock(Value);

impl PreferenceBlock {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The block's domain tag, if it has one.
    ///
    /// Untagged blocks are legal in the wire format; they are treated as
    /// foreign (preserved on write, never authoritative for any domain).
    pub fn domain(&self) -> Option<&str> {
        self.0.get("domain").and_then(Value::as_str)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for PreferenceBlock {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Find the authoritative block for a domain tag.
///
/// At most one block per domain is treated as authoritative; if the document
/// contains duplicates the first match wins.
pub fn find_domain_block<'a>(blocks: &'a [PreferenceBlock], domain: &str) -> Option<&'a PreferenceBlock> {
    blocks.iter().find(|b| b.domain() == Some(domain))
}

/// Assemble an outgoing document: every block whose domain is not in
/// `replaced` is kept in fetch order, then exactly one new block for the
/// participating domain is appended.
///
/// `replaced` carries the domain's current tag plus any legacy tags it
/// supersedes, so an upgraded write retires the legacy block in the same
/// round-trip.
pub fn replace_domain(
    blocks: &[PreferenceBlock],
    replaced: &[&str],
    new_block: PreferenceBlock,
) -> Vec<PreferenceBlock> {
    let mut out: Vec<PreferenceBlock> = blocks
        .iter()
        .filter(|b| !b.domain().is_some_and(|d| replaced.contains(&d)))
        .cloned()
        .collect();
    out.push(new_block);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn block(v: Value) -> PreferenceBlock {
        PreferenceBlock::new(v)
    }

    #[test]
    fn test_domain_tag_extraction() {
        let b = block(json!({"domain": "saved-feeds", "items": []}));
        assert_eq!(b.domain(), Some("saved-feeds"));

        let untagged = block(json!({"items": []}));
        assert_eq!(untagged.domain(), None);

        let non_string = block(json!({"domain": 7}));
        assert_eq!(non_string.domain(), None);
    }

    #[test]
    fn test_first_match_wins() {
        let blocks = vec![
            block(json!({"domain": "saved-feeds", "items": [1]})),
            block(json!({"domain": "saved-feeds", "items": [2]})),
        ];
        let found = find_domain_block(&blocks, "saved-feeds").unwrap();
        assert_eq!(found.value()["items"], json!([1]));
    }

    #[test]
    fn test_replace_domain_preserves_foreign_blocks() {
        let foreign = block(json!({"domain": "mute-words", "words": ["spam"]}));
        let untagged = block(json!({"opaque": true}));
        let blocks = vec![
            foreign.clone(),
            block(json!({"domain": "saved-feeds", "items": []})),
            untagged.clone(),
        ];

        let out = replace_domain(
            &blocks,
            &["saved-feeds"],
            block(json!({"domain": "saved-feeds", "items": [{"id": "a"}]})),
        );

        assert_eq!(out.len(), 3);
        assert_eq!(out[0], foreign);
        assert_eq!(out[1], untagged);
        assert_eq!(out[2].domain(), Some("saved-feeds"));
    }

    #[test]
    fn test_replace_domain_retires_legacy_blocks() {
        let blocks = vec![
            block(json!({"domain": "saved-feeds-v1", "pinned": [], "saved": []})),
            block(json!({"domain": "saved-feeds", "items": []})),
        ];

        let out = replace_domain(
            &blocks,
            &["saved-feeds", "saved-feeds-v1"],
            block(json!({"domain": "saved-feeds", "items": []})),
        );

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].domain(), Some("saved-feeds"));
    }
}
