//! Full refresh cycle and the retrieval dispatch pass.

use super::Engine;
use crate::merge::merge_new_items;
use crate::source_reader::FeedDocument;
use crate::types::Event;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

impl Engine {
    /// Refresh every subscription in registration order, then publish
    ///
    /// Feed documents are fetched up to `fetch_concurrency` at a time, but
    /// results are applied one by one in registration order, so the loop
    /// remains the only writer. A subscription whose fetch fails is left
    /// exactly as it was for this cycle. Discoveries are announced only once
    /// the cycle's snapshot is visible.
    pub(super) async fn refresh_all(&mut self) {
        let started = std::time::Instant::now();
        let total = self.subscriptions.len();

        let endpoints: Vec<String> = self
            .subscriptions
            .iter()
            .map(|subscription| subscription.feed_url.clone())
            .collect();

        let source = Arc::clone(&self.source);
        let mut fetches = stream::iter(endpoints.into_iter().enumerate())
            .map(move |(index, endpoint)| {
                let source = Arc::clone(&source);
                async move {
                    let result = source.fetch(&endpoint).await;
                    (index, endpoint, result)
                }
            })
            .buffered(self.config.fetch_concurrency);

        let mut discovered = Vec::new();
        let mut new_items = 0usize;
        let mut dispatched = 0usize;
        let mut failed = 0usize;

        while let Some((index, endpoint, result)) = fetches.next().await {
            match result {
                Ok(document) => {
                    let count = self.apply_document(index, document);
                    if count > 0 {
                        new_items += count;
                        discovered.push(Event::ItemsDiscovered {
                            subscription_id: self.subscriptions[index].id.clone(),
                            count,
                        });
                    }
                    dispatched += self.dispatch_pending(index).await;
                }
                Err(e) => {
                    failed += 1;
                    warn!(endpoint = %endpoint, error = %e, "Failed to refresh feed, skipping this cycle");
                }
            }
        }

        self.publish();
        for event in discovered {
            self.event_tx.send(event).ok();
        }

        info!(
            subscriptions = total,
            new_items,
            dispatched,
            failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Refresh cycle complete"
        );
    }

    /// Append the genuinely new items of `document` to subscription `index`
    ///
    /// Returns the number of items appended.
    pub(super) fn apply_document(&mut self, index: usize, document: FeedDocument) -> usize {
        let Some(subscription) = self.subscriptions.get_mut(index) else {
            return 0;
        };

        let new_items = merge_new_items(&subscription.items, &document.items);
        let count = new_items.len();
        subscription.items.extend(new_items);
        subscription.last_refreshed = Some(Utc::now());

        if count > 0 {
            debug!(
                subscription = %subscription.id,
                count,
                "Discovered new items"
            );
        }
        count
    }

    /// Dispatch every flagged item of subscription `index` whose payload is
    /// not on local storage yet, clearing the flag of each one dispatched
    ///
    /// An item whose destination is still being written by an earlier
    /// transfer keeps its flag and waits for a later cycle.
    pub(super) async fn dispatch_pending(&mut self, index: usize) -> usize {
        let Some(subscription) = self.subscriptions.get_mut(index) else {
            return 0;
        };
        let dispatcher = &self.dispatcher;
        let mut dispatched = 0usize;

        for item in subscription
            .items
            .iter_mut()
            .filter(|item| item.needs_retrieval)
        {
            let Some(destination) = dispatcher.local_path(&item.url) else {
                warn!(
                    subscription = %subscription.id,
                    url = %item.url,
                    "Retrieval URL names no file, cannot dispatch"
                );
                continue;
            };

            if self.in_flight.contains_key(&destination) {
                debug!(url = %item.url, path = %destination.display(), "Destination busy, deferring");
                continue;
            }

            if tokio::fs::try_exists(&destination).await.unwrap_or(false) {
                debug!(url = %item.url, path = %destination.display(), "Payload already present");
                continue;
            }

            dispatcher.dispatch(&item.url, destination.clone());
            self.in_flight.insert(destination, item.url.clone());
            item.needs_retrieval = false;
            dispatched += 1;
        }

        dispatched
    }
}
