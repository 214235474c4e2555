//! Data context
//!
//! Owns everything queries and mutations share: configuration, the session
//! view, the query cache, the fetcher, the mock stores and the notifier.
//! Cheap to clone; clones share state.

use crate::config::{ConfigResult, SyncConfig};
use crate::mutation::ResourceMutation;
use crate::notify::{Notification, Notifier, TracingNotifier};
use crate::query::{QueryOptions, RecordQuery, ResourceQuery};
use crate::repository::{
    AssetGroupRepository, DataSource, HttpRepository, MockRepository, MockResource,
    OutboxRepository, ResourceRepository,
};
use ctem_cache::{CacheKey, KeyPattern, QueryCache};
use ctem_client::{endpoint, ApiError, Fetcher, HttpClient, NoAuth, ReqwestClient, TokenSource};
use ctem_model::{AssetGroups, NotificationOutbox, Resource, Session};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Shared state behind every query and mutation handle
#[derive(Clone)]
pub struct DataContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    config: SyncConfig,
    real_api: AtomicBool,
    session: RwLock<Session>,
    cache: QueryCache<ApiError>,
    fetcher: Fetcher,
    mock_stores: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    notifier: Arc<dyn Notifier>,
}

/// Builder for [`DataContext`]
pub struct DataContextBuilder {
    config: SyncConfig,
    client: Option<Arc<dyn HttpClient>>,
    token_source: Option<Arc<dyn TokenSource>>,
    notifier: Option<Arc<dyn Notifier>>,
    session: Session,
}

impl DataContextBuilder {
    /// Use this transport instead of building a `reqwest` client
    #[must_use]
    pub fn with_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Bearer token source for the `reqwest` client
    #[must_use]
    pub fn with_token_source(mut self, token_source: Arc<dyn TokenSource>) -> Self {
        self.token_source = Some(token_source);
        self
    }

    /// Notification sink
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Initial session
    #[must_use]
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    /// Build the context
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` for unusable configuration and
    /// `ConfigError::Client` when the HTTP client can not be created.
    pub fn build(self) -> ConfigResult<DataContext> {
        let config = self.config;
        config.validate()?;

        let client: Arc<dyn HttpClient> = match self.client {
            Some(client) => client,
            None => Arc::new(ReqwestClient::new(
                config.api_base_url.clone(),
                config.request_timeout(),
                self.token_source.unwrap_or_else(|| Arc::new(NoAuth)),
            )?),
        };

        info!(
            real_api = config.use_real_api,
            base_url = %config.api_base_url,
            "Data context ready"
        );

        Ok(DataContext {
            inner: Arc::new(ContextInner {
                real_api: AtomicBool::new(config.use_real_api),
                session: RwLock::new(self.session),
                cache: QueryCache::new(config.cache_capacity, config.dedupe_interval()),
                fetcher: Fetcher::new(client, config.retry),
                mock_stores: DashMap::new(),
                notifier: self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier)),
                config,
            }),
        })
    }
}

impl DataContext {
    /// Start building a context
    #[must_use]
    pub fn builder(config: SyncConfig) -> DataContextBuilder {
        DataContextBuilder {
            config,
            client: None,
            token_source: None,
            notifier: None,
            session: Session::anonymous(),
        }
    }

    /// Context with defaults for everything but the configuration
    ///
    /// # Errors
    /// As [`DataContextBuilder::build`].
    pub fn new(config: SyncConfig) -> ConfigResult<Self> {
        Self::builder(config).build()
    }

    /// Configuration the context was built with
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Whether repositories talk to the REST API
    #[inline]
    #[must_use]
    pub fn uses_real_api(&self) -> bool {
        self.inner.real_api.load(Ordering::Acquire)
    }

    /// Current data source
    #[must_use]
    pub fn source(&self) -> DataSource {
        if self.uses_real_api() {
            DataSource::Api
        } else {
            DataSource::Mock
        }
    }

    /// Switch between fixtures and the REST API
    ///
    /// Cached responses belong to the previous source and are dropped.
    pub fn set_real_api(&self, enabled: bool) {
        if self.inner.real_api.swap(enabled, Ordering::AcqRel) != enabled {
            info!(real_api = enabled, "Data source switched");
            self.inner.cache.clear();
        }
    }

    /// Snapshot of the session
    #[must_use]
    pub fn session(&self) -> Session {
        self.inner.session.read().clone()
    }

    /// Replace the session
    ///
    /// A tenant change drops every cached response.
    pub fn set_session(&self, session: Session) {
        let tenant_changed = {
            let mut current = self.inner.session.write();
            let changed = current.tenant != session.tenant;
            *current = session;
            changed
        };
        if tenant_changed {
            info!("Tenant changed, clearing cache");
            self.inner.cache.clear();
        }
    }

    /// Shared query cache
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &QueryCache<ApiError> {
        &self.inner.cache
    }

    /// Shared fetcher
    #[inline]
    #[must_use]
    pub fn fetcher(&self) -> &Fetcher {
        &self.inner.fetcher
    }

    /// Deliver a notification
    pub fn notify(&self, notification: Notification) {
        self.inner.notifier.notify(notification);
    }

    /// Cache key for a read, or `None` while fetching is not allowed
    ///
    /// Requires a tenant, the resource's read permission and `enabled`.
    #[must_use]
    pub fn read_key<R: Resource>(&self, path: &str, enabled: bool) -> Option<CacheKey> {
        let session = self.inner.session.read();
        let key = match &session.tenant {
            Some(tenant) if enabled && session.can(R::READ) => Some(CacheKey::new(tenant.clone(), path)),
            _ => None,
        };
        debug!(namespace = R::NAMESPACE, path, active = key.is_some(), "Read key");
        key
    }

    /// Repository for `R` in the current mode
    #[must_use]
    pub fn repository<R: MockResource>(&self) -> Arc<dyn ResourceRepository<R>> {
        if self.uses_real_api() {
            Arc::new(HttpRepository::<R>::new(self.inner.fetcher.clone()))
        } else {
            self.mock_store::<R>()
        }
    }

    /// Asset group repository in the current mode
    #[must_use]
    pub fn asset_group_repository(&self) -> Arc<dyn AssetGroupRepository> {
        if self.uses_real_api() {
            Arc::new(HttpRepository::<AssetGroups>::new(self.inner.fetcher.clone()))
        } else {
            self.mock_store::<AssetGroups>()
        }
    }

    /// Outbox repository in the current mode
    #[must_use]
    pub fn outbox_repository(&self) -> Arc<dyn OutboxRepository> {
        if self.uses_real_api() {
            Arc::new(HttpRepository::<NotificationOutbox>::new(self.inner.fetcher.clone()))
        } else {
            self.mock_store::<NotificationOutbox>()
        }
    }

    /// Fixture store for `R`, seeded on first use
    #[must_use]
    pub fn mock_store<R: MockResource>(&self) -> Arc<MockRepository<R>> {
        let store = self
            .inner
            .mock_stores
            .entry(TypeId::of::<R>())
            .or_insert_with(|| Arc::new(MockRepository::<R>::seeded()))
            .clone();
        match store.downcast::<MockRepository<R>>() {
            Ok(store) => store,
            // Stores are keyed by the resource's own TypeId.
            Err(_) => Arc::new(MockRepository::seeded()),
        }
    }

    /// Mark every cached read of `R` stale
    ///
    /// Returns the number of mounted keys told to revalidate.
    pub async fn invalidate<R: Resource>(&self) -> usize {
        self.inner
            .cache
            .invalidate(&KeyPattern::prefix(endpoint::namespace_prefix::<R>()))
            .await
    }

    /// Connectivity came back
    pub fn notify_reconnect(&self) {
        self.inner.cache.notify_reconnect();
    }

    /// The window regained focus
    pub fn notify_focus(&self) {
        self.inner.cache.notify_focus();
    }

    /// Mount a list query with default options
    #[must_use]
    pub fn query<R: MockResource>(&self, filters: R::Filters) -> ResourceQuery<R> {
        ResourceQuery::mount(self, filters, QueryOptions::default())
    }

    /// Mount a single-record query with default options
    #[must_use]
    pub fn record<R: MockResource>(&self, id: impl Into<String>) -> RecordQuery<R> {
        RecordQuery::mount(self, Some(id.into()), QueryOptions::default())
    }

    /// Mutation handle for `R`'s collection
    #[must_use]
    pub fn mutation<R: MockResource>(&self) -> ResourceMutation<R> {
        ResourceMutation::new(self)
    }

    /// Mutation handle for one record of `R`
    #[must_use]
    pub fn record_mutation<R: MockResource>(&self, id: impl Into<String>) -> ResourceMutation<R> {
        ResourceMutation::for_record(self, id)
    }

    pub(crate) fn notifier(&self) -> Arc<dyn Notifier> {
        Arc::clone(&self.inner.notifier)
    }
}

impl fmt::Debug for DataContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataContext")
            .field("source", &self.source())
            .field("session", &*self.inner.session.read())
            .field("cache", &self.inner.cache)
            .finish_non_exhaustive()
    }
}
