//! Read handles
//!
//! A mounted query computes its cache key at mount: `None` while the session
//! has no tenant, lacks the read permission, or the query is disabled. With a
//! key in real mode a background task loads through the shared cache and then
//! follows the cache's event stream, revalidating on invalidation and, if
//! configured, on reconnect, focus or a timer. The session is checked again
//! before every revalidation; once the tenant or permission is gone the query
//! drops its data and goes back to `Idle`. In mock mode the fixture result is
//! available immediately and never changes.
//!
//! State moves `Idle -> Loading -> Success`, then
//! `Revalidating -> Success | Error`. An error keeps the last good data.

use crate::context::DataContext;
use crate::notify::{Notification, Notifier};
use crate::repository::{DataSource, MockResource};
use ctem_cache::{CacheEvent, CacheKey, FetchMode, QueryCache, Subscription};
use ctem_client::{endpoint, ApiError, ApiResult};
use ctem_model::{ListResponse, Resource};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

/// Lifecycle of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    /// No key; nothing will be fetched
    Idle,
    /// First load, no data yet
    Loading,
    /// Data is current
    Success,
    /// Refetching while the previous data stays visible
    Revalidating,
    /// Last load failed
    Error,
}

/// What a consumer sees
#[derive(Debug, PartialEq)]
pub struct QueryState<T> {
    /// Lifecycle
    pub status: QueryStatus,
    /// Last good data
    pub data: Option<Arc<T>>,
    /// Last failure, cleared by the next success
    pub error: Option<ApiError>,
}

// No `T: Clone` bound; data sits behind an `Arc`.
impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
        }
    }
}

impl<T> QueryState<T> {
    fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
        }
    }

    fn loading() -> Self {
        Self {
            status: QueryStatus::Loading,
            data: None,
            error: None,
        }
    }

    fn settled(result: ApiResult<Arc<T>>) -> Self {
        match result {
            Ok(data) => Self {
                status: QueryStatus::Success,
                data: Some(data),
                error: None,
            },
            Err(err) => Self {
                status: QueryStatus::Error,
                data: None,
                error: Some(err),
            },
        }
    }

    /// First load in progress
    #[inline]
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    /// Any load in progress
    #[inline]
    #[must_use]
    pub fn is_validating(&self) -> bool {
        matches!(self.status, QueryStatus::Loading | QueryStatus::Revalidating)
    }

    /// Last load failed
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Borrow the data
    #[inline]
    #[must_use]
    pub fn data(&self) -> Option<&T> {
        self.data.as_deref()
    }
}

impl<T: Serialize> Serialize for QueryState<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("QueryState", 6)?;
        state.serialize_field("status", &self.status)?;
        state.serialize_field("data", &self.data.as_deref())?;
        state.serialize_field("error", &self.error.as_ref().map(ApiError::user_message))?;
        state.serialize_field("is_loading", &self.is_loading())?;
        state.serialize_field("is_validating", &self.is_validating())?;
        state.serialize_field("is_error", &self.is_error())?;
        state.end()
    }
}

/// Per-query overrides; unset fields fall back to the context configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// Fetch at all
    pub enabled: bool,
    /// Revalidate when the window regains focus
    pub revalidate_on_focus: Option<bool>,
    /// Revalidate when connectivity returns
    pub revalidate_on_reconnect: Option<bool>,
    /// Poll at this interval
    pub refresh_interval: Option<Duration>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            revalidate_on_focus: None,
            revalidate_on_reconnect: None,
            refresh_interval: None,
        }
    }
}

impl QueryOptions {
    /// Default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable fetching
    #[inline]
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Override focus revalidation
    #[inline]
    #[must_use]
    pub fn with_revalidate_on_focus(mut self, enabled: bool) -> Self {
        self.revalidate_on_focus = Some(enabled);
        self
    }

    /// Override reconnect revalidation
    #[inline]
    #[must_use]
    pub fn with_revalidate_on_reconnect(mut self, enabled: bool) -> Self {
        self.revalidate_on_reconnect = Some(enabled);
        self
    }

    /// Poll at a fixed interval
    #[inline]
    #[must_use]
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct Revalidation {
    on_focus: bool,
    on_reconnect: bool,
    every: Option<Duration>,
}

impl Revalidation {
    fn resolve(ctx: &DataContext, options: &QueryOptions) -> Self {
        let config = ctx.config();
        Self {
            on_focus: options.revalidate_on_focus.unwrap_or(config.revalidate_on_focus),
            on_reconnect: options
                .revalidate_on_reconnect
                .unwrap_or(config.revalidate_on_reconnect),
            every: options
                .refresh_interval
                .or_else(|| config.refresh_interval())
                .filter(|every| !every.is_zero()),
        }
    }
}

type Loader<T> = Arc<dyn Fn() -> BoxFuture<'static, ApiResult<T>> + Send + Sync>;
type Gate = Box<dyn Fn() -> bool + Send + Sync>;

fn failure_title(label: &str) -> String {
    format!("Failed to load {label}")
}

/// Settled state for a source that answers without a request
fn ready_state<T>(ctx: &DataContext, label: &str, result: ApiResult<T>) -> QueryState<T> {
    if let Err(err) = &result {
        ctx.notify(Notification::failure(failure_title(label), err));
    }
    QueryState::settled(result.map(Arc::new))
}

/// Re-checks the session on every revalidation
fn session_gate<R: Resource>(ctx: &DataContext, key: &CacheKey, enabled: bool) -> Gate {
    let ctx = ctx.clone();
    let key = key.clone();
    Box::new(move || ctx.read_key::<R>(key.path(), enabled).as_ref() == Some(&key))
}

struct Driver<T> {
    key: CacheKey,
    label: String,
    cache: QueryCache<ApiError>,
    loader: Loader<T>,
    state: Arc<watch::Sender<QueryState<T>>>,
    generation: AtomicU64,
    notifier: Arc<dyn Notifier>,
    allowed: Gate,
}

impl<T: Send + Sync + 'static> Driver<T> {
    /// Show whatever an earlier mount left in the cache
    async fn hydrate(&self) {
        if let Ok(Some(data)) = self.cache.peek::<T>(&self.key).await {
            self.state.send_modify(|state| state.data = Some(data));
        }
    }

    /// Whether the session still permits this read; resets to idle if not
    fn permitted(&self) -> bool {
        if (self.allowed)() {
            return true;
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        if self.state.borrow().status != QueryStatus::Idle {
            debug!(key = %self.key, "Read no longer permitted, going idle");
            self.state.send_replace(QueryState::idle());
        }
        false
    }

    async fn load(&self, mode: FetchMode) {
        if !self.permitted() {
            return;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|state| {
            state.status = if state.data.is_some() {
                QueryStatus::Revalidating
            } else {
                QueryStatus::Loading
            };
        });

        let loader = Arc::clone(&self.loader);
        let result = self.cache.fetch(&self.key, mode, move || loader()).await;

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(key = %self.key, generation, "Load superseded");
            return;
        }

        match result {
            Ok(data) => {
                self.state.send_replace(QueryState::settled(Ok(data)));
            }
            Err(err) => {
                if self.state.borrow().data.is_some() {
                    warn!(key = %self.key, error = %err, "Revalidation failed, keeping last data");
                }
                self.notifier
                    .notify(Notification::failure(failure_title(&self.label), &err));
                self.state.send_modify(|state| {
                    state.status = QueryStatus::Error;
                    state.error = Some(err);
                });
            }
        }
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn follow<T: Send + Sync + 'static>(
    driver: Arc<Driver<T>>,
    mut subscription: Subscription,
    policy: Revalidation,
) {
    driver.hydrate().await;
    driver.load(FetchMode::Dedupe).await;

    let mut interval = policy.every.map(|every| {
        let mut interval = tokio::time::interval_at(Instant::now() + every, every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    loop {
        tokio::select! {
            event = subscription.recv() => match event {
                None => break,
                Some(event) if event.marks_stale(&driver.key) => {
                    driver.load(FetchMode::Revalidate).await;
                }
                Some(CacheEvent::Reconnected) if policy.on_reconnect => {
                    driver.load(FetchMode::Dedupe).await;
                }
                Some(CacheEvent::Focused) if policy.on_focus => {
                    driver.load(FetchMode::Dedupe).await;
                }
                Some(_) => {}
            },
            () = tick(&mut interval) => driver.load(FetchMode::Revalidate).await,
        }
    }
    debug!(key = %driver.key, "Query stopped following cache events");
}

/// A mounted read
///
/// Dropping the handle stops its background task; a request already issued
/// still completes and fills the cache.
pub struct QueryHandle<T> {
    key: Option<CacheKey>,
    source: DataSource,
    state: Arc<watch::Sender<QueryState<T>>>,
    driver: Option<Arc<Driver<T>>>,
    task: Option<JoinHandle<()>>,
}

impl<T: Send + Sync + 'static> QueryHandle<T> {
    fn fixed(key: Option<CacheKey>, source: DataSource, state: QueryState<T>) -> Self {
        Self {
            key,
            source,
            state: Arc::new(watch::Sender::new(state)),
            driver: None,
            task: None,
        }
    }

    fn spawn(
        ctx: &DataContext,
        key: CacheKey,
        label: String,
        loader: Loader<T>,
        allowed: Gate,
        options: &QueryOptions,
    ) -> Self {
        let state = Arc::new(watch::Sender::new(QueryState::loading()));
        let subscription = ctx.cache().subscribe(key.clone());
        let driver = Arc::new(Driver {
            key: key.clone(),
            label,
            cache: ctx.cache().clone(),
            loader,
            state: Arc::clone(&state),
            generation: AtomicU64::new(0),
            notifier: ctx.notifier(),
            allowed,
        });
        let task = tokio::spawn(follow(
            Arc::clone(&driver),
            subscription,
            Revalidation::resolve(ctx, options),
        ));

        Self {
            key: Some(key),
            source: DataSource::Api,
            state,
            driver: Some(driver),
            task: Some(task),
        }
    }

    /// Cache key, `None` when fetching is disabled
    #[inline]
    #[must_use]
    pub fn key(&self) -> Option<&CacheKey> {
        self.key.as_ref()
    }

    /// Where the data comes from
    #[inline]
    #[must_use]
    pub fn source(&self) -> DataSource {
        self.source
    }

    /// Snapshot of the current state
    #[must_use]
    pub fn state(&self) -> QueryState<T> {
        self.state.borrow().clone()
    }

    /// Current data
    #[must_use]
    pub fn data(&self) -> Option<Arc<T>> {
        self.state.borrow().data.clone()
    }

    /// Current error
    #[must_use]
    pub fn error(&self) -> Option<ApiError> {
        self.state.borrow().error.clone()
    }

    /// First load in progress
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    /// Any load in progress
    #[must_use]
    pub fn is_validating(&self) -> bool {
        self.state.borrow().is_validating()
    }

    /// Last load failed
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.state.borrow().is_error()
    }

    /// Receiver observing every state change
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<QueryState<T>> {
        self.state.subscribe()
    }

    /// Wait until no load is in progress
    pub async fn settled(&self) -> QueryState<T> {
        let mut receiver = self.state.subscribe();
        let settled = receiver
            .wait_for(|state| !state.is_validating())
            .await
            .map(|state| state.clone());
        settled.unwrap_or_else(|_| self.state())
    }

    /// Refetch now, bypassing the dedupe window
    ///
    /// Without a key, or in mock mode, returns the current data unchanged.
    /// If the session lost the tenant or read permission since mount, the
    /// query goes idle instead of fetching.
    pub async fn mutate(&self) -> Option<Arc<T>> {
        if let Some(driver) = &self.driver {
            driver.load(FetchMode::Revalidate).await;
        }
        self.data()
    }
}

impl<T> Drop for QueryHandle<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl<T> fmt::Debug for QueryHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("QueryHandle")
            .field("key", &self.key)
            .field("source", &self.source)
            .field("status", &state.status)
            .field("has_data", &state.data.is_some())
            .finish_non_exhaustive()
    }
}

/// Filtered list of one resource
pub struct ResourceQuery<R: Resource> {
    handle: QueryHandle<ListResponse<R::Record>>,
    filters: R::Filters,
}

impl<R: MockResource> ResourceQuery<R> {
    /// Mount a list query
    ///
    /// Must be called inside a tokio runtime when the context uses the real
    /// API.
    #[must_use]
    pub fn mount(ctx: &DataContext, filters: R::Filters, options: QueryOptions) -> Self {
        let path = endpoint::list::<R>(Some(&filters));
        let repo = ctx.repository::<R>();

        let handle = match ctx.read_key::<R>(&path, options.enabled) {
            None => QueryHandle::fixed(None, repo.source(), QueryState::idle()),
            Some(key) => match repo.list_ready(&filters) {
                Some(page) => {
                    let label = format!("{} list", R::LABEL.to_lowercase());
                    QueryHandle::fixed(Some(key), repo.source(), ready_state(ctx, &label, Ok(page)))
                }
                None => {
                    let tenant = key.tenant().clone();
                    let query = filters.clone();
                    let loader: Loader<ListResponse<R::Record>> = Arc::new(move || {
                        let repo = Arc::clone(&repo);
                        let tenant = tenant.clone();
                        let query = query.clone();
                        async move { repo.list(&tenant, &query).await }.boxed()
                    });
                    let label = format!("{} list", R::LABEL.to_lowercase());
                    let allowed = session_gate::<R>(ctx, &key, options.enabled);
                    QueryHandle::spawn(ctx, key, label, loader, allowed, &options)
                }
            },
        };

        Self { handle, filters }
    }

    /// Filters this query was mounted with
    #[inline]
    #[must_use]
    pub fn filters(&self) -> &R::Filters {
        &self.filters
    }
}

impl<R: Resource> Deref for ResourceQuery<R> {
    type Target = QueryHandle<ListResponse<R::Record>>;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl<R: Resource> fmt::Debug for ResourceQuery<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceQuery")
            .field("namespace", &R::NAMESPACE)
            .field("filters", &self.filters)
            .field("handle", &self.handle)
            .finish()
    }
}

/// One record by id
pub struct RecordQuery<R: Resource> {
    handle: QueryHandle<R::Record>,
    id: Option<String>,
}

impl<R: MockResource> RecordQuery<R> {
    /// Mount a record query; no id means no fetch
    ///
    /// Must be called inside a tokio runtime when the context uses the real
    /// API.
    #[must_use]
    pub fn mount(ctx: &DataContext, id: Option<String>, options: QueryOptions) -> Self {
        let repo = ctx.repository::<R>();
        let key = id
            .as_deref()
            .and_then(|id| ctx.read_key::<R>(&endpoint::record::<R>(id), options.enabled));

        let handle = match (key, id.clone()) {
            (Some(key), Some(record_id)) => match repo.get_ready(&record_id) {
                Some(result) => {
                    let state = ready_state(ctx, &R::LABEL.to_lowercase(), result);
                    QueryHandle::fixed(Some(key), repo.source(), state)
                }
                None => {
                    let tenant = key.tenant().clone();
                    let loader: Loader<R::Record> = Arc::new(move || {
                        let repo = Arc::clone(&repo);
                        let tenant = tenant.clone();
                        let record_id = record_id.clone();
                        async move { repo.get(&tenant, &record_id).await }.boxed()
                    });
                    let allowed = session_gate::<R>(ctx, &key, options.enabled);
                    QueryHandle::spawn(ctx, key, R::LABEL.to_lowercase(), loader, allowed, &options)
                }
            },
            _ => QueryHandle::fixed(None, repo.source(), QueryState::idle()),
        };

        Self { handle, id }
    }

    /// Record id, if any
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

impl<R: Resource> Deref for RecordQuery<R> {
    type Target = QueryHandle<R::Record>;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl<R: Resource> fmt::Debug for RecordQuery<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordQuery")
            .field("namespace", &R::NAMESPACE)
            .field("id", &self.id)
            .field("handle", &self.handle)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use ctem_model::{AssetGroupFilters, AssetGroups, Agents, PermissionSet, Session};
    use pretty_assertions::assert_eq;

    fn mock_context(session: Session) -> DataContext {
        DataContext::builder(SyncConfig::default())
            .with_session(session)
            .build()
            .unwrap()
    }

    #[test]
    fn state_flags() {
        let state: QueryState<u32> = QueryState::loading();
        assert!(state.is_loading());
        assert!(state.is_validating());
        assert!(!state.is_error());

        let state = QueryState::settled(Err::<Arc<u32>, _>(ApiError::Timeout));
        assert!(state.is_error());
        assert!(!state.is_validating());
        assert_eq!(state.data(), None);
    }

    #[test]
    fn state_clones_without_clone_payload() {
        #[derive(Debug, PartialEq)]
        struct Opaque(u32);

        let state = QueryState::settled(Ok(Arc::new(Opaque(7))));
        let copy = state.clone();
        assert_eq!(copy, state);
        assert!(Arc::ptr_eq(
            copy.data.as_ref().unwrap(),
            state.data.as_ref().unwrap()
        ));
    }

    #[test]
    fn state_serializes_hook_shape() {
        let state = QueryState::settled(Ok(Arc::new(vec![1, 2])));
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "status": "success",
                "data": [1, 2],
                "error": null,
                "is_loading": false,
                "is_validating": false,
                "is_error": false,
            })
        );
    }

    #[test]
    fn options_fall_back_to_config() {
        let ctx = mock_context(Session::anonymous());
        let policy = Revalidation::resolve(&ctx, &QueryOptions::default());
        assert!(!policy.on_focus);
        assert!(policy.on_reconnect);
        assert_eq!(policy.every, None);

        let policy = Revalidation::resolve(
            &ctx,
            &QueryOptions::new()
                .with_revalidate_on_focus(true)
                .with_refresh_interval(Duration::from_secs(5)),
        );
        assert!(policy.on_focus);
        assert_eq!(policy.every, Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn mock_list_is_ready_immediately() {
        let ctx = mock_context(Session::for_tenant("acme", PermissionSet::all()));
        let query = ResourceQuery::<AssetGroups>::mount(
            &ctx,
            AssetGroupFilters::default().with_search("banking"),
            QueryOptions::default(),
        );

        assert!(!query.is_loading());
        assert!(query.key().is_some());
        assert_eq!(query.source(), DataSource::Mock);
        let page = query.data().unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].name, "Production - Core Banking");

        let again = query.mutate().await.unwrap();
        assert_eq!(*again, *page);
    }

    #[tokio::test]
    async fn disabled_query_is_idle() {
        let ctx = mock_context(Session::for_tenant("acme", PermissionSet::all()));
        let query = ResourceQuery::<Agents>::mount(
            &ctx,
            Default::default(),
            QueryOptions::new().with_enabled(false),
        );
        assert_eq!(query.key(), None);
        assert_eq!(query.state().status, QueryStatus::Idle);
        assert!(query.data().is_none());
    }

    #[tokio::test]
    async fn record_without_id_is_idle() {
        let ctx = mock_context(Session::for_tenant("acme", PermissionSet::all()));
        let query = RecordQuery::<AssetGroups>::mount(&ctx, None, QueryOptions::default());
        assert_eq!(query.key(), None);
        assert!(!query.is_loading());
    }

    #[tokio::test]
    async fn mock_missing_record_reports_not_found() {
        let ctx = mock_context(Session::for_tenant("acme", PermissionSet::all()));
        let query = ctx.record::<AssetGroups>("ag-404");
        assert_eq!(query.error().and_then(|e| e.status_code()), Some(404));
        assert!(!query.is_loading());
    }
}
