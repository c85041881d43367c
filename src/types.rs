//! Core types for podcatcher

use crate::config::duration_serde;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

/// Matches anything that looks like an HTML/XML tag
#[allow(clippy::expect_used)]
static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("<[^>]*>").expect("tag pattern is a valid regex"));

/// One entry of a subscription (a podcast episode)
///
/// The retrieval `url` is the identity key: two items with the same URL are
/// the same item, and a subscription never holds two items with one URL.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    /// Retrieval URL (enclosure URL), the identity key
    pub url: String,

    /// Episode title
    pub title: String,

    /// Episode author
    pub author: String,

    /// Description as published (may contain HTML)
    pub description: String,

    /// Short textual summary
    pub summary: String,

    /// Artwork URL
    pub image: String,

    /// Publish date exactly as it appeared in the feed
    pub pub_date: String,

    /// Media type of the payload (e.g. "audio/mpeg")
    pub media_type: String,

    /// Payload size in bytes as announced by the feed (0 if unknown)
    pub length: u64,

    /// Nominal running time
    #[serde(with = "duration_serde")]
    pub duration: Duration,

    /// Dispatch gate: set once at merge time, cleared once when retrieval is dispatched
    pub needs_retrieval: bool,
}

impl Item {
    /// Whether the payload is audio
    pub fn is_audio(&self) -> bool {
        self.media_type.starts_with("audio")
    }

    /// Whether the payload is video
    pub fn is_video(&self) -> bool {
        self.media_type.starts_with("video")
    }

    /// Publish date parsed from the feed, if it is in a recognized format
    ///
    /// RFC 2822 covers the RFC 822/1123 variants podcast feeds use; RFC 3339
    /// covers Atom-derived items.
    pub fn parsed_release_date(&self) -> Option<DateTime<Utc>> {
        let raw = self.pub_date.trim();
        DateTime::parse_from_rfc2822(raw)
            .or_else(|_| DateTime::parse_from_rfc3339(raw))
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Publish date normalized to a timestamp
    ///
    /// An unparsable date falls back to the current time. This degrades
    /// ordering quality for that item but never fails; the raw string
    /// stays available in `pub_date`.
    pub fn release_date(&self) -> DateTime<Utc> {
        self.parsed_release_date().unwrap_or_else(Utc::now)
    }

    /// Human-facing release label relative to `now`: "Today", "Yesterday" or `M/D/YYYY`
    pub fn release_label(&self, now: DateTime<Utc>) -> String {
        let released = self.release_date().date_naive();
        let today = now.date_naive();
        if released == today {
            return "Today".to_string();
        }
        if Some(released) == today.pred_opt() {
            return "Yesterday".to_string();
        }
        released.format("%-m/%-d/%Y").to_string()
    }

    /// Description with all markup tags removed
    pub fn plain_text_description(&self) -> String {
        TAG_PATTERN.replace_all(&self.description, "").into_owned()
    }

    /// First `max_chars` characters of the plain-text description, with an
    /// ellipsis when it was cut short
    pub fn description_preview(&self, max_chars: usize) -> String {
        let plain = self.plain_text_description();
        if plain.chars().count() <= max_chars {
            return plain;
        }
        let mut preview: String = plain.chars().take(max_chars).collect();
        preview.push_str("...");
        preview
    }

    /// File name the payload is stored under (final path segment of the URL)
    pub fn local_filename(&self) -> Option<String> {
        crate::dispatcher::filename_for_url(&self.url)
    }
}

/// One feed source and its accumulated items
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subscription {
    /// Stable short identifier, unique within the set at creation time
    pub id: String,

    /// Initialism derived from the display name (the identifier before de-duplication)
    pub acronym: String,

    /// Display name (channel title)
    pub name: String,

    /// Feed endpoint this subscription polls
    pub feed_url: String,

    /// Website of the show
    pub site: String,

    /// Language tag
    pub language: String,

    /// Copyright notice
    pub copyright: String,

    /// Subtitle
    pub subtitle: String,

    /// Description
    pub description: String,

    /// Summary
    pub summary: String,

    /// Artwork URL
    pub image: String,

    /// Categories, nested ones flattened as "Parent/Child"
    pub categories: Vec<String>,

    /// When the feed was last fetched and merged successfully
    pub last_refreshed: Option<DateTime<Utc>>,

    /// Items in discovery order: feed order at creation, new items appended after
    pub items: Vec<Item>,
}

impl Subscription {
    /// Look up an item by its retrieval URL
    pub fn item(&self, url: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.url == url)
    }

    /// Items in chronological order of release
    ///
    /// Stable: items with equal (or equally unparsable) dates keep their
    /// discovery order.
    pub fn items_by_release_date(&self) -> Vec<&Item> {
        let mut items: Vec<&Item> = self.items.iter().collect();
        items.sort_by_cached_key(|item| item.release_date());
        items
    }

    /// Number of items still waiting for a retrieval dispatch
    pub fn pending_retrievals(&self) -> usize {
        self.items.iter().filter(|item| item.needs_retrieval).count()
    }
}

/// Immutable, point-in-time copy of every subscription
///
/// This is what readers get from the engine. It is never mutated after
/// publication; a newer generation replaces it wholesale.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionSet {
    /// Monotonic publication counter (0 = state as loaded at start)
    pub generation: u64,

    /// When this copy was published
    pub published_at: DateTime<Utc>,

    /// Subscriptions in registration order
    pub subscriptions: Vec<Subscription>,
}

impl SubscriptionSet {
    /// Number of subscriptions
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether there are no subscriptions
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Iterate subscriptions in registration order
    pub fn iter(&self) -> std::slice::Iter<'_, Subscription> {
        self.subscriptions.iter()
    }

    /// Look up a subscription by identifier
    pub fn get(&self, id: &str) -> Option<&Subscription> {
        self.subscriptions.iter().find(|sub| sub.id == id)
    }

    /// Look up a subscription by feed endpoint
    pub fn by_feed_url(&self, feed_url: &str) -> Option<&Subscription> {
        self.subscriptions.iter().find(|sub| sub.feed_url == feed_url)
    }

    /// Find an item by retrieval URL across all subscriptions
    pub fn find_item(&self, url: &str) -> Option<(&Subscription, &Item)> {
        self.subscriptions
            .iter()
            .find_map(|sub| sub.item(url).map(|item| (sub, item)))
    }

    /// Subscriptions ordered by display name (stable for equal names)
    pub fn sorted_by_name(&self) -> Vec<&Subscription> {
        let mut subs: Vec<&Subscription> = self.subscriptions.iter().collect();
        subs.sort_by(|a, b| a.name.cmp(&b.name));
        subs
    }
}

impl<'a> IntoIterator for &'a SubscriptionSet {
    type Item = &'a Subscription;
    type IntoIter = std::slice::Iter<'a, Subscription>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Event emitted by the refresh engine
///
/// Events are notifications only; failures are reported through logs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A new subscription was registered
    SubscriptionAdded {
        /// Assigned identifier
        id: String,
        /// Feed endpoint
        feed_url: String,
    },

    /// A refresh appended new items to a subscription
    ItemsDiscovered {
        /// Subscription identifier
        subscription_id: String,
        /// Number of new items
        count: usize,
    },

    /// Payload retrieval was started for an item
    RetrievalDispatched {
        /// Retrieval URL
        url: String,
        /// Destination on local storage
        path: PathBuf,
    },

    /// A new snapshot became visible to readers
    SnapshotPublished {
        /// Generation of the published snapshot
        generation: u64,
    },

    /// The engine stopped
    Shutdown,
}
