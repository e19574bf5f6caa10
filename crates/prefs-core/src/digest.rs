//! ActivityAggregator: fold a chronological feed into per-actor digests.
//!
//! Pure functions only - no suspension, no state. The aggregator consumes a
//! feed-item sequence (supplied by the feed source, never fetched here) and
//! a read-state snapshot, and produces the per-channel digest the UI renders
//! as unread badges.

use chrono::{DateTime, FixedOffset};
use std::collections::BTreeMap;

/// Why an item appeared in the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedReason {
    Post,
    Repost,
}

/// One item from the chronological feed.
///
/// For reposts, `timestamp` is the repost's timestamp (not the original
/// post's) and `reposting_actor_id` names the actor whose channel the item
/// belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub actor_id: String,
    pub timestamp: DateTime<FixedOffset>,
    pub reason: FeedReason,
    pub reposting_actor_id: Option<String>,
}

impl FeedItem {
    /// The channel this item belongs to: the reposting actor for reposts,
    /// otherwise the author.
    pub fn channel_actor(&self) -> &str {
        match (self.reason, self.reposting_actor_id.as_deref()) {
            (FeedReason::Repost, Some(reposter)) => reposter,
            _ => &self.actor_id,
        }
    }
}

/// Per-actor activity digest. Derived on every feed or read-state change,
/// never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorDigest {
    pub actor_id: String,
    pub latest_item: FeedItem,
    pub unread_count: usize,
    pub last_activity_at: DateTime<FixedOffset>,
}

/// Group feed items by channel actor and count unread per channel.
///
/// An item is unread when its timestamp is strictly greater than the actor's
/// read marker; an actor with no marker has everything unread (first-contact
/// default). Sorted by last activity descending, ties broken by actor id
/// ascending for determinism.
pub fn aggregate(
    items: &[FeedItem],
    read_state: &BTreeMap<String, DateTime<FixedOffset>>,
) -> Vec<ActorDigest> {
    let mut groups: BTreeMap<&str, Vec<&FeedItem>> = BTreeMap::new();
    for item in items {
        groups.entry(item.channel_actor()).or_default().push(item);
    }

    let mut digests: Vec<ActorDigest> = groups
        .into_iter()
        .filter_map(|(actor_id, group)| {
            let latest = group
                .iter()
                .copied()
                .max_by_key(|item| item.timestamp)?
                .clone();

            let marker = read_state.get(actor_id);
            let unread_count = group
                .iter()
                .filter(|item| marker.is_none_or(|m| item.timestamp > *m))
                .count();

            Some(ActorDigest {
                actor_id: actor_id.to_string(),
                last_activity_at: latest.timestamp,
                latest_item: latest,
                unread_count,
            })
        })
        .collect();

    digests.sort_by(|a, b| {
        b.last_activity_at
            .cmp(&a.last_activity_at)
            .then_with(|| a.actor_id.cmp(&b.actor_id))
    });
    digests
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(iso: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(iso).unwrap()
    }

    fn post(actor: &str, iso: &str) -> FeedItem {
        FeedItem {
            actor_id: actor.to_string(),
            timestamp: ts(iso),
            reason: FeedReason::Post,
            reposting_actor_id: None,
        }
    }

    fn repost(author: &str, reposter: &str, iso: &str) -> FeedItem {
        FeedItem {
            actor_id: author.to_string(),
            timestamp: ts(iso),
            reason: FeedReason::Repost,
            reposting_actor_id: Some(reposter.to_string()),
        }
    }

    #[test]
    fn test_unread_default_counts_everything() {
        let items = vec![
            post("alice", "2026-08-01T10:00:00+00:00"),
            post("alice", "2026-08-02T10:00:00+00:00"),
            post("alice", "2026-08-03T10:00:00+00:00"),
        ];

        let digests = aggregate(&items, &BTreeMap::new());
        assert_eq!(digests.len(), 1);
        assert_eq!(digests[0].unread_count, 3);
        assert_eq!(digests[0].last_activity_at, ts("2026-08-03T10:00:00+00:00"));
    }

    #[test]
    fn test_unread_is_strictly_newer_than_marker() {
        let items = vec![
            post("alice", "2026-08-01T10:00:00+00:00"),
            post("alice", "2026-08-02T10:00:00+00:00"),
            post("alice", "2026-08-03T10:00:00+00:00"),
        ];
        // Marked read up to the middle item: only the third counts
        let read_state =
            BTreeMap::from([("alice".to_string(), ts("2026-08-02T10:00:00+00:00"))]);

        let digests = aggregate(&items, &read_state);
        assert_eq!(digests[0].unread_count, 1);
    }

    #[test]
    fn test_reposts_group_under_reposting_actor() {
        let items = vec![
            post("alice", "2026-08-01T10:00:00+00:00"),
            // bob reposted alice's post: counts for bob's channel, not alice's
            repost("alice", "bob", "2026-08-02T10:00:00+00:00"),
        ];

        let digests = aggregate(&items, &BTreeMap::new());
        assert_eq!(digests.len(), 2);
        assert_eq!(digests[0].actor_id, "bob");
        assert_eq!(digests[0].unread_count, 1);
        assert_eq!(digests[1].actor_id, "alice");
        assert_eq!(digests[1].unread_count, 1);
    }

    #[test]
    fn test_sorted_by_recency_with_actor_id_tiebreak() {
        let items = vec![
            post("carol", "2026-08-01T10:00:00+00:00"),
            post("bob", "2026-08-02T10:00:00+00:00"),
            post("alice", "2026-08-02T10:00:00+00:00"),
        ];

        let digests = aggregate(&items, &BTreeMap::new());
        let order: Vec<&str> = digests.iter().map(|d| d.actor_id.as_str()).collect();
        assert_eq!(order, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn test_latest_item_uses_repost_timestamp() {
        let items = vec![
            post("bob", "2026-08-01T10:00:00+00:00"),
            repost("alice", "bob", "2026-08-05T10:00:00+00:00"),
        ];

        let digests = aggregate(&items, &BTreeMap::new());
        assert_eq!(digests[0].actor_id, "bob");
        assert_eq!(digests[0].latest_item.reason, FeedReason::Repost);
        assert_eq!(digests[0].last_activity_at, ts("2026-08-05T10:00:00+00:00"));
    }

    #[test]
    fn test_empty_feed_yields_no_digests() {
        assert!(aggregate(&[], &BTreeMap::new()).is_empty());
    }
}
