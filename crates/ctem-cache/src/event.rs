//! Cache events and subscriptions
//!
//! Invalidation is a message: the cache broadcasts which keys went stale and
//! every mounted query decides for itself whether to refetch.

use crate::key::CacheKey;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Broadcast to every subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// These keys must be revalidated
    Stale(Arc<[CacheKey]>),
    /// Network connectivity came back
    Reconnected,
    /// The dashboard window regained focus
    Focused,
}

impl CacheEvent {
    /// Whether a stale event names this key
    #[must_use]
    pub fn marks_stale(&self, key: &CacheKey) -> bool {
        matches!(self, Self::Stale(keys) if keys.contains(key))
    }
}

/// Live interest in one key
///
/// Counted while alive: invalidation keeps (and marks stale) entries that
/// have subscribers and drops the rest. Dropping the subscription releases
/// the count.
#[derive(Debug)]
pub struct Subscription {
    key: CacheKey,
    counts: Arc<DashMap<CacheKey, usize>>,
    events: broadcast::Receiver<CacheEvent>,
}

impl Subscription {
    pub(crate) fn new(
        key: CacheKey,
        counts: Arc<DashMap<CacheKey, usize>>,
        events: broadcast::Receiver<CacheEvent>,
    ) -> Self {
        *counts.entry(key.clone()).or_insert(0) += 1;
        debug!(key = %key, "Subscribed");
        Self { key, counts, events }
    }

    /// Subscribed key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Next event, `None` once the cache is gone
    ///
    /// A lagging receiver missed events it can not recover, so it is told its
    /// own key went stale.
    pub async fn recv(&mut self) -> Option<CacheEvent> {
        match self.events.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(key = %self.key, missed, "Subscription lagged, forcing revalidation");
                Some(CacheEvent::Stale(Arc::from(vec![self.key.clone()])))
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(mut count) = self.counts.get_mut(&self.key) {
            *count = count.saturating_sub(1);
        }
        self.counts.remove_if(&self.key, |_, count| *count == 0);
    }
}
