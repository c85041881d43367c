//! Latest-snapshot cell shared between the engine loop and readers.
//!
//! Uses `arc-swap` so reads never take a lock and publication is a single
//! atomic pointer swap: a reader holds either the previous set or the new
//! one, in full.

use crate::types::{Subscription, SubscriptionSet};
use arc_swap::ArcSwap;
use chrono::Utc;
use std::sync::Arc;

/// Single-slot holder of the most recently published [`SubscriptionSet`]
#[derive(Debug)]
pub struct SnapshotCell {
    current: ArcSwap<SubscriptionSet>,
}

impl SnapshotCell {
    /// Cell seeded with `initial`
    pub fn new(initial: SubscriptionSet) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
        }
    }

    /// Current snapshot; never blocks
    #[inline]
    pub fn load(&self) -> Arc<SubscriptionSet> {
        self.current.load_full()
    }

    /// Generation of the current snapshot
    pub fn generation(&self) -> u64 {
        self.current.load().generation
    }

    /// Replace the current snapshot with a copy of `subscriptions`
    ///
    /// Only the engine loop publishes, so generations increase by exactly one
    /// per call.
    pub(crate) fn publish(&self, subscriptions: &[Subscription]) -> Arc<SubscriptionSet> {
        let next = Arc::new(SubscriptionSet {
            generation: self.generation() + 1,
            published_at: Utc::now(),
            subscriptions: subscriptions.to_vec(),
        });
        self.current.store(Arc::clone(&next));
        next
    }
}

impl Default for SnapshotCell {
    fn default() -> Self {
        Self::new(SubscriptionSet::default())
    }
}
