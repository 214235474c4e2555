//! Shared query cache
//!
//! Values are stored type-erased in a bounded `moka` cache. Every fetch gets
//! a sequence number; an entry is only replaced by a fetch issued later than
//! the one that produced it, so a slow early response can never overwrite a
//! newer one. Concurrent fetches of one key share a single in-flight future.
//!
//! Invalidation also fences running requests: they stop being joinable, and
//! whatever they return is stored already stale.

use crate::error::{CacheError, CacheResult};
use crate::event::{CacheEvent, Subscription};
use crate::key::{CacheKey, KeyPattern};
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use moka::future::Cache;
use moka::ops::compute::Op;
use std::any::{type_name, Any};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info};

/// Default number of cached responses
pub const DEFAULT_CAPACITY: u64 = 1_000;

/// Default window in which identical requests are served from one fetch
pub const DEFAULT_DEDUPE_INTERVAL: Duration = Duration::from_secs(2);

const EVENT_BUFFER: usize = 256;

/// How a fetch treats existing data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Serve an entry fetched within the dedupe window, or join a running
    /// request, before starting a new one
    Dedupe,
    /// Always issue a new request; it supersedes any running one
    Revalidate,
}

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Cached responses
    pub entry_count: u64,
    /// Requests currently running
    pub in_flight: usize,
    /// Keys with at least one subscriber
    pub subscribed_keys: usize,
}

#[derive(Clone)]
struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    fetched_at: Instant,
    seq: u64,
    stale: bool,
}

type SharedFetch<T, E> = Shared<BoxFuture<'static, Result<Arc<T>, E>>>;

struct InFlight {
    seq: u64,
    // SharedFetch<T, E> for the T that started it
    handle: Arc<dyn Any + Send + Sync>,
}

struct Inner {
    store: Cache<CacheKey, CacheEntry>,
    in_flight: DashMap<CacheKey, InFlight>,
    // Highest sequence issued when the key was last invalidated mid-flight
    fences: DashMap<CacheKey, u64>,
    subscribers: Arc<DashMap<CacheKey, usize>>,
    events: broadcast::Sender<CacheEvent>,
    seq: AtomicU64,
    dedupe: Duration,
}

/// Client-side cache shared by every query and mutation of a data context
///
/// Cheap to clone; clones share state. `E` is the fetch error type handed to
/// every waiter of a failed request.
pub struct QueryCache<E> {
    inner: Arc<Inner>,
    _error: PhantomData<fn() -> E>,
}

impl<E> Clone for QueryCache<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _error: PhantomData,
        }
    }
}

impl<E> std::fmt::Debug for QueryCache<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.inner.store.entry_count())
            .field("in_flight", &self.inner.in_flight.len())
            .field("dedupe", &self.inner.dedupe)
            .finish()
    }
}

impl<E> Default for QueryCache<E>
where
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_DEDUPE_INTERVAL)
    }
}

impl<E> QueryCache<E>
where
    E: Clone + Send + Sync + 'static,
{
    /// Create a cache
    #[must_use]
    pub fn new(max_capacity: u64, dedupe: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            inner: Arc::new(Inner {
                store: Cache::new(max_capacity),
                in_flight: DashMap::new(),
                fences: DashMap::new(),
                subscribers: Arc::new(DashMap::new()),
                events,
                seq: AtomicU64::new(0),
                dedupe,
            }),
            _error: PhantomData,
        }
    }

    /// Window in which identical requests share one fetch
    #[inline]
    #[must_use]
    pub fn dedupe_interval(&self) -> Duration {
        self.inner.dedupe
    }

    /// Fetch through the cache
    ///
    /// `fetcher` is only called when a new request is issued.
    ///
    /// # Errors
    /// The fetch error, shared with every caller that joined the request.
    pub async fn fetch<T, F, Fut>(&self, key: &CacheKey, mode: FetchMode, fetcher: F) -> Result<Arc<T>, E>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        if mode == FetchMode::Dedupe {
            if let Some(value) = self.fresh::<T>(key).await {
                debug!(key = %key, "Cache hit");
                return Ok(value);
            }
            if let Some(running) = self.running::<T>(key) {
                debug!(key = %key, "Joining in-flight request");
                return running.await;
            }
        }

        self.start(key, fetcher()).await
    }

    fn start<T, Fut>(&self, key: &CacheKey, request: Fut) -> SharedFetch<T, E>
    where
        T: Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let seq = self.inner.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = Arc::clone(&self.inner);
        let owned_key = key.clone();

        let shared: SharedFetch<T, E> = async move {
            let result = request.await.map(Arc::new);
            if let Ok(value) = &result {
                inner.commit(&owned_key, seq, Arc::clone(value)).await;
            }
            inner
                .in_flight
                .remove_if(&owned_key, |_, running| running.seq == seq);
            result
        }
        .boxed()
        .shared();

        self.inner.in_flight.insert(
            key.clone(),
            InFlight {
                seq,
                handle: Arc::new(shared.clone()),
            },
        );
        debug!(key = %key, seq, "Request issued");

        // Drive the request to completion even if every caller goes away.
        tokio::spawn(shared.clone().map(|_| ()));
        shared
    }

    async fn fresh<T: Send + Sync + 'static>(&self, key: &CacheKey) -> Option<Arc<T>> {
        let entry = self.inner.store.get(key).await?;
        if entry.stale || entry.fetched_at.elapsed() >= self.inner.dedupe {
            return None;
        }
        entry.value.downcast::<T>().ok()
    }

    fn running<T: Send + Sync + 'static>(&self, key: &CacheKey) -> Option<SharedFetch<T, E>> {
        let running = self.inner.in_flight.get(key)?;
        let shared = running.handle.downcast_ref::<SharedFetch<T, E>>().cloned();
        shared
    }

    /// Cached value regardless of staleness
    ///
    /// # Errors
    /// [`CacheError::TypeMismatch`] if the entry holds another type.
    pub async fn peek<T: Send + Sync + 'static>(&self, key: &CacheKey) -> CacheResult<Option<Arc<T>>> {
        let Some(entry) = self.inner.store.get(key).await else {
            return Ok(None);
        };
        entry
            .value
            .downcast::<T>()
            .map(Some)
            .map_err(|_| CacheError::TypeMismatch {
                key: key.clone(),
                found: entry.type_name,
            })
    }

    /// Store a value as if it had just been fetched
    pub async fn prime<T: Send + Sync + 'static>(&self, key: &CacheKey, value: T) {
        let seq = self.inner.seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.commit(key, seq, Arc::new(value)).await;
    }

    /// Whether the entry was marked stale and not refetched since
    pub async fn is_stale(&self, key: &CacheKey) -> bool {
        self.inner
            .store
            .get(key)
            .await
            .is_some_and(|entry| entry.stale)
    }

    /// Whether a request for the key is running
    #[must_use]
    pub fn is_fetching(&self, key: &CacheKey) -> bool {
        self.inner.in_flight.contains_key(key)
    }

    /// Register interest in a key
    #[must_use]
    pub fn subscribe(&self, key: CacheKey) -> Subscription {
        Subscription::new(
            key,
            Arc::clone(&self.inner.subscribers),
            self.inner.events.subscribe(),
        )
    }

    /// Live subscriptions for a key
    #[must_use]
    pub fn subscriber_count(&self, key: &CacheKey) -> usize {
        self.inner.subscribers.get(key).map_or(0, |count| *count)
    }

    /// Mark every matching key stale
    ///
    /// Subscribed entries are kept (their data stays visible while they
    /// refetch) and the subscribers are told; unsubscribed entries are
    /// dropped. Requests still running for matching keys are fenced off.
    /// Returns the number of subscribed keys notified.
    pub async fn invalidate(&self, pattern: &KeyPattern) -> usize {
        let mut notify: Vec<CacheKey> = self
            .inner
            .subscribers
            .iter()
            .filter(|entry| *entry.value() > 0 && pattern.matches(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        notify.sort();

        let cached: Vec<CacheKey> = self
            .inner
            .store
            .iter()
            .filter(|(key, _)| pattern.matches(key))
            .map(|(key, _)| CacheKey::clone(&key))
            .collect();

        let fenced = self.inner.fence(|key| pattern.matches(key));

        let mut dropped = 0usize;
        for key in cached {
            if notify.binary_search(&key).is_ok() {
                self.inner.mark_stale(&key).await;
            } else {
                self.inner.store.invalidate(&key).await;
                dropped += 1;
            }
        }

        info!(
            pattern = %pattern,
            notified = notify.len(),
            dropped,
            fenced,
            "Invalidated cache keys"
        );

        let count = notify.len();
        if count > 0 {
            // No receivers is fine; nobody is mounted.
            let _ = self.inner.events.send(CacheEvent::Stale(Arc::from(notify)));
        }
        count
    }

    /// Tell subscribers the network came back
    pub fn notify_reconnect(&self) {
        debug!("Broadcasting reconnect");
        let _ = self.inner.events.send(CacheEvent::Reconnected);
    }

    /// Tell subscribers the window regained focus
    pub fn notify_focus(&self) {
        debug!("Broadcasting focus");
        let _ = self.inner.events.send(CacheEvent::Focused);
    }

    /// Drop every entry (e.g. on tenant switch or sign-out)
    pub fn clear(&self) {
        self.inner.fence(|_| true);
        self.inner.store.invalidate_all();
    }

    /// Current statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.inner.store.entry_count(),
            in_flight: self.inner.in_flight.len(),
            subscribed_keys: self.inner.subscribers.len(),
        }
    }
}

impl Inner {
    /// Detach running requests for matching keys
    ///
    /// Later fetches start their own request instead of joining these.
    fn fence(&self, matches: impl Fn(&CacheKey) -> bool) -> usize {
        let watermark = self.seq.load(Ordering::SeqCst);
        let running: Vec<CacheKey> = self
            .in_flight
            .iter()
            .filter(|entry| matches(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();

        let mut fenced = 0usize;
        for key in running {
            if self
                .in_flight
                .remove_if(&key, |_, running| running.seq <= watermark)
                .is_some()
            {
                self.fences.insert(key, watermark);
                fenced += 1;
            }
        }
        fenced
    }

    /// Store a result unless a later-issued one is already there
    async fn commit<T: Send + Sync + 'static>(&self, key: &CacheKey, seq: u64, value: Arc<T>) {
        let predates_fence = self.fences.get(key).is_some_and(|watermark| seq <= *watermark);
        if predates_fence {
            debug!(key = %key, seq, "Response predates invalidation, storing as stale");
        } else {
            self.fences.remove_if(key, |_, watermark| *watermark < seq);
        }

        let entry = CacheEntry {
            value: value as Arc<dyn Any + Send + Sync>,
            type_name: type_name::<T>(),
            fetched_at: Instant::now(),
            seq,
            stale: predates_fence,
        };
        let _ = self
            .store
            .entry(key.clone())
            .and_compute_with(|existing| {
                let op = match existing {
                    Some(current) if current.value().seq > seq => {
                        debug!(key = %key, seq, newer = current.value().seq, "Discarding superseded response");
                        Op::Nop
                    }
                    _ => Op::Put(entry),
                };
                std::future::ready(op)
            })
            .await;
    }

    async fn mark_stale(&self, key: &CacheKey) {
        let _ = self
            .store
            .entry(key.clone())
            .and_compute_with(|existing| {
                let op = match existing {
                    Some(current) => {
                        let mut entry = current.into_value();
                        entry.stale = true;
                        Op::Put(entry)
                    }
                    None => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctem_model::TenantId;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;

    type TestCache = QueryCache<String>;

    fn key(path: &str) -> CacheKey {
        CacheKey::new(TenantId::new("acme"), path)
    }

    fn counting(calls: &Arc<AtomicUsize>, value: u32) -> impl Future<Output = Result<u32, String>> + Send + 'static {
        let calls = Arc::clone(calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(value)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_fetches_share_one_request() {
        let cache = TestCache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let k = key("/api/v1/agents");

        let (a, b) = tokio::join!(
            cache.fetch(&k, FetchMode::Dedupe, || counting(&calls, 7)),
            cache.fetch(&k, FetchMode::Dedupe, || counting(&calls, 8)),
        );

        assert_eq!(*a.unwrap(), 7);
        assert_eq!(*b.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dedupe_window_expires() {
        let cache = TestCache::new(100, Duration::from_secs(2));
        let calls = Arc::new(AtomicUsize::new(0));
        let k = key("/api/v1/agents");

        cache.fetch(&k, FetchMode::Dedupe, || counting(&calls, 1)).await.unwrap();
        tokio::time::advance(Duration::from_millis(1500)).await;
        let cached = cache.fetch(&k, FetchMode::Dedupe, || counting(&calls, 2)).await.unwrap();
        assert_eq!(*cached, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        let fresh = cache.fetch(&k, FetchMode::Dedupe, || counting(&calls, 2)).await.unwrap();
        assert_eq!(*fresh, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn later_issued_request_wins() {
        let cache = TestCache::default();
        let k = key("/api/v1/exposures");

        let slow = {
            let cache = cache.clone();
            let k = k.clone();
            tokio::spawn(async move {
                cache
                    .fetch(&k, FetchMode::Revalidate, || async {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        Ok::<_, String>("old")
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;

        let fast = cache
            .fetch(&k, FetchMode::Revalidate, || async { Ok::<_, String>("new") })
            .await
            .unwrap();
        assert_eq!(*fast, "new");

        assert_eq!(*slow.await.unwrap().unwrap(), "old");
        assert_eq!(*cache.peek::<&str>(&k).await.unwrap().unwrap(), "new");
    }

    #[tokio::test]
    async fn errors_are_shared_and_not_cached() {
        let cache = TestCache::default();
        let k = key("/api/v1/agents");
        let err = cache
            .fetch::<u32, _, _>(&k, FetchMode::Dedupe, || async { Err("503".to_string()) })
            .await
            .unwrap_err();
        assert_eq!(err, "503");
        assert!(cache.peek::<u32>(&k).await.unwrap().is_none());
        assert!(!cache.is_fetching(&k));
    }

    #[tokio::test]
    async fn invalidate_marks_subscribed_and_drops_the_rest() {
        let cache = TestCache::default();
        let mounted = key("/api/v1/asset-groups?search=core");
        let unmounted = key("/api/v1/asset-groups?page=2");
        let unrelated = key("/api/v1/agents");
        cache.prime(&mounted, 1u32).await;
        cache.prime(&unmounted, 2u32).await;
        cache.prime(&unrelated, 3u32).await;

        let mut sub = cache.subscribe(mounted.clone());
        let notified = cache.invalidate(&KeyPattern::contains("/api/v1/asset-groups")).await;

        assert_eq!(notified, 1);
        assert!(cache.is_stale(&mounted).await);
        assert_eq!(*cache.peek::<u32>(&mounted).await.unwrap().unwrap(), 1);
        assert!(cache.peek::<u32>(&unmounted).await.unwrap().is_none());
        assert!(!cache.is_stale(&unrelated).await);

        let event = sub.recv().await.unwrap();
        assert!(event.marks_stale(&mounted));
        assert!(!event.marks_stale(&unrelated));
    }

    #[tokio::test]
    async fn stale_entries_are_not_served_from_dedupe() {
        let cache = TestCache::default();
        let k = key("/api/v1/agents");
        cache.prime(&k, 1u32).await;
        let _sub = cache.subscribe(k.clone());
        cache.invalidate(&KeyPattern::Exact(k.clone())).await;

        let value = cache
            .fetch(&k, FetchMode::Dedupe, || async { Ok::<_, String>(2u32) })
            .await
            .unwrap();
        assert_eq!(*value, 2);
        assert!(!cache.is_stale(&k).await);
    }

    #[tokio::test(start_paused = true)]
    async fn response_racing_an_invalidation_is_stored_stale() {
        let cache = TestCache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let k = key("/api/v1/asset-groups");

        let running = {
            let cache = cache.clone();
            let k = k.clone();
            let calls = Arc::clone(&calls);
            tokio::spawn(async move { cache.fetch(&k, FetchMode::Dedupe, || counting(&calls, 1)).await })
        };
        tokio::task::yield_now().await;
        assert!(cache.is_fetching(&k));

        cache.invalidate(&KeyPattern::prefix("/api/v1/asset-groups")).await;
        assert!(!cache.is_fetching(&k));

        // The caller that issued it still gets its answer.
        assert_eq!(*running.await.unwrap().unwrap(), 1);
        assert!(cache.is_stale(&k).await);

        let next = cache.fetch(&k, FetchMode::Dedupe, || counting(&calls, 2)).await.unwrap();
        assert_eq!(*next, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!cache.is_stale(&k).await);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_after_invalidation_does_not_join_old_request() {
        let cache = TestCache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let k = key("/api/v1/asset-groups?page=2");

        let running = {
            let cache = cache.clone();
            let k = k.clone();
            let calls = Arc::clone(&calls);
            tokio::spawn(async move { cache.fetch(&k, FetchMode::Dedupe, || counting(&calls, 1)).await })
        };
        tokio::task::yield_now().await;

        cache.invalidate(&KeyPattern::prefix("/api/v1/asset-groups")).await;
        let next = cache.fetch(&k, FetchMode::Dedupe, || counting(&calls, 2)).await.unwrap();
        running.await.unwrap().unwrap();

        assert_eq!(*next, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(*cache.peek::<u32>(&k).await.unwrap().unwrap(), 2);
    }

    #[tokio::test]
    async fn peek_reports_type_mismatch() {
        let cache = TestCache::default();
        let k = key("/api/v1/agents");
        cache.prime(&k, 1u32).await;
        let err = cache.peek::<String>(&k).await.unwrap_err();
        assert_eq!(
            err,
            CacheError::TypeMismatch {
                key: k,
                found: "u32"
            }
        );
    }

    #[tokio::test]
    async fn environment_events_reach_subscribers() {
        let cache = TestCache::default();
        let mut sub = cache.subscribe(key("/a"));
        cache.notify_reconnect();
        cache.notify_focus();
        assert_eq!(sub.recv().await, Some(CacheEvent::Reconnected));
        assert_eq!(sub.recv().await, Some(CacheEvent::Focused));
    }
}
