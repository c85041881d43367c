//! Registering new feeds.

use super::Engine;
use crate::error::{Error, Result};
use crate::merge::{acronym, merge_new_items, unique_identifier};
use crate::source_reader::FeedDocument;
use crate::types::{Event, Item, Subscription};
use chrono::Utc;
use tracing::{info, warn};
use url::Url;

impl Engine {
    /// Add the feed at `endpoint` unless it is already subscribed
    ///
    /// The feed is fetched once, inside the loop. Only its newest item is
    /// flagged for retrieval; older items are treated as already consumed.
    /// Any failure leaves the set untouched and is only logged.
    /// `SubscriptionAdded` goes out after the snapshot holding it is visible.
    pub(super) async fn subscribe(&mut self, endpoint: &str) {
        let feed_url = match normalize_endpoint(endpoint) {
            Ok(feed_url) => feed_url,
            Err(e) => {
                warn!(endpoint, error = %e, "Rejected subscription request");
                return;
            }
        };

        if self
            .subscriptions
            .iter()
            .any(|subscription| subscription.feed_url == feed_url)
        {
            info!(endpoint = %feed_url, "Already subscribed, ignoring request");
            return;
        }

        let document = match self.source.fetch(&feed_url).await {
            Ok(document) => document,
            Err(e) => {
                warn!(endpoint = %feed_url, error = %e, "Failed to subscribe to feed");
                return;
            }
        };

        let acronym = acronym(&document.title);
        let id = unique_identifier(
            &acronym,
            self.subscriptions
                .iter()
                .map(|subscription| subscription.id.as_str()),
        );
        let subscription = new_subscription(id, acronym, feed_url, document);

        info!(
            id = %subscription.id,
            name = %subscription.name,
            endpoint = %subscription.feed_url,
            items = subscription.items.len(),
            "Subscribed to feed"
        );
        let added = Event::SubscriptionAdded {
            id: subscription.id.clone(),
            feed_url: subscription.feed_url.clone(),
        };

        self.subscriptions.push(subscription);
        let index = self.subscriptions.len() - 1;
        self.dispatch_pending(index).await;
        self.publish();
        self.event_tx.send(added).ok();
    }
}

/// Canonical form of a feed endpoint, used as the subscription's identity
pub(crate) fn normalize_endpoint(endpoint: &str) -> Result<String> {
    Url::parse(endpoint.trim())
        .map(|url| url.to_string())
        .map_err(|e| Error::InvalidUrl(format!("{}: {}", endpoint, e)))
}

/// Build a subscription from a freshly fetched document
///
/// Items are deduplicated by URL in document order; only the newest one
/// carries the retrieval flag.
pub(crate) fn new_subscription(
    id: String,
    acronym: String,
    feed_url: String,
    document: FeedDocument,
) -> Subscription {
    let mut items = merge_new_items(&[], &document.items);
    for item in &mut items {
        item.needs_retrieval = false;
    }
    if let Some(newest) = newest_index(&items) {
        items[newest].needs_retrieval = true;
    }

    Subscription {
        id,
        acronym,
        name: document.title,
        feed_url,
        site: document.link,
        language: document.language,
        copyright: document.copyright,
        subtitle: document.subtitle,
        description: document.description,
        summary: document.summary,
        image: document.image,
        categories: document.categories,
        last_refreshed: Some(Utc::now()),
        items,
    }
}

/// Index of the most recently published item
///
/// Items whose date does not parse are only picked when no date parses at
/// all, in which case the first item (feeds list newest first) wins. Ties go
/// to the earlier item.
fn newest_index(items: &[Item]) -> Option<usize> {
    if items.is_empty() {
        return None;
    }

    let dated = items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| item.parsed_release_date().map(|date| (index, date)))
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)));

    Some(dated.map_or(0, |(index, _)| index))
}
