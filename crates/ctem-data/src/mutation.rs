//! Write handles
//!
//! A mutation handle is bound to a resource and optionally one record id.
//! Every trigger checks the session, validates locally, calls the repository
//! once, then invalidates the resource's cached reads and reports the outcome
//! through the notifier. Triggers are never deduplicated.

use crate::context::DataContext;
use crate::notify::Notification;
use crate::repository::MockResource;
use ctem_cache::CacheKey;
use ctem_client::{endpoint, ApiError, ApiResult};
use ctem_model::{
    AssetGroup, AssetGroups, BulkOutcome, NotificationOutbox, OutboxEntry, TenantId,
    UpdateAssetGroupInput, Validate, ValidationError,
};
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{error, info};

/// Write operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    /// Create a record
    Create,
    /// Update one record
    Update,
    /// Delete one record
    Delete,
    /// Update several records
    BulkUpdate,
    /// Delete several records
    BulkDelete,
    /// Add assets to a group
    AddAssets,
    /// Remove assets from a group
    RemoveAssets,
    /// Queue an outbox entry again
    Retry,
}

impl WriteOp {
    /// Whether the operation targets one record
    #[must_use]
    pub fn needs_id(self) -> bool {
        matches!(
            self,
            Self::Update | Self::Delete | Self::AddAssets | Self::RemoveAssets | Self::Retry
        )
    }

    /// Short name for logs
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::BulkUpdate => "bulk_update",
            Self::BulkDelete => "bulk_delete",
            Self::AddAssets => "add_assets",
            Self::RemoveAssets => "remove_assets",
            Self::Retry => "retry",
        }
    }

    fn success_title(self, label: &str) -> String {
        let lower = label.to_lowercase();
        match self {
            Self::Create => format!("{label} created"),
            Self::Update => format!("{label} updated"),
            Self::Delete => format!("{label} deleted"),
            Self::BulkUpdate => format!("{label}s updated"),
            Self::BulkDelete => format!("{label}s deleted"),
            Self::AddAssets => format!("Assets added to {lower}"),
            Self::RemoveAssets => format!("Assets removed from {lower}"),
            Self::Retry => format!("{label} queued for retry"),
        }
    }

    fn failure_title(self, label: &str) -> String {
        let lower = label.to_lowercase();
        match self {
            Self::Create => format!("Failed to create {lower}"),
            Self::Update => format!("Failed to update {lower}"),
            Self::Delete => format!("Failed to delete {lower}"),
            Self::BulkUpdate => format!("Failed to update {lower}s"),
            Self::BulkDelete => format!("Failed to delete {lower}s"),
            Self::AddAssets => format!("Failed to add assets to {lower}"),
            Self::RemoveAssets => format!("Failed to remove assets from {lower}"),
            Self::Retry => format!("Failed to retry {lower}"),
        }
    }
}

impl fmt::Display for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Mutation handle for one resource
pub struct ResourceMutation<R: MockResource> {
    ctx: DataContext,
    id: Option<String>,
    in_flight: AtomicUsize,
    _resource: PhantomData<fn() -> R>,
}

impl<R: MockResource> ResourceMutation<R> {
    /// Handle for collection-level writes (create, bulk)
    #[must_use]
    pub fn new(ctx: &DataContext) -> Self {
        Self {
            ctx: ctx.clone(),
            id: None,
            in_flight: AtomicUsize::new(0),
            _resource: PhantomData,
        }
    }

    /// Handle for writes to one record
    #[must_use]
    pub fn for_record(ctx: &DataContext, id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::new(ctx)
        }
    }

    /// Bound record id
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// True while a trigger of this handle is running
    #[inline]
    #[must_use]
    pub fn is_mutating(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Key of the collection write endpoint, `None` when writes are not allowed
    #[must_use]
    pub fn collection_key(&self) -> Option<CacheKey> {
        self.authorize(WriteOp::Create)
            .ok()
            .map(|tenant| CacheKey::new(tenant, endpoint::collection::<R>()))
    }

    /// Key of the record write endpoint, `None` without an id or when writes
    /// are not allowed
    #[must_use]
    pub fn record_key(&self) -> Option<CacheKey> {
        let tenant = self.authorize(WriteOp::Update).ok()?;
        let id = self.id.as_deref()?;
        Some(CacheKey::new(tenant, endpoint::record::<R>(id)))
    }

    fn authorize(&self, op: WriteOp) -> ApiResult<TenantId> {
        let session = self.ctx.session();
        let tenant = session
            .tenant
            .clone()
            .ok_or_else(|| ApiError::unavailable("No tenant selected"))?;
        if !session.can(R::WRITE) {
            return Err(ApiError::unavailable(format!(
                "Missing permission {}",
                R::WRITE.as_str()
            )));
        }
        if op.needs_id() && self.id.is_none() {
            return Err(ApiError::unavailable(format!("{} id required", R::LABEL)));
        }
        Ok(tenant)
    }

    fn record_id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    async fn perform<T, F, Fut>(
        &self,
        op: WriteOp,
        validation: Result<(), ValidationError>,
        call: F,
    ) -> ApiResult<T>
    where
        F: FnOnce(TenantId) -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let outcome: ApiResult<T> = async {
            let tenant = self.authorize(op)?;
            validation?;
            let _in_flight = InFlight::enter(&self.in_flight);
            call(tenant).await
        }
        .await;

        match outcome {
            Ok(value) => {
                let notified = self.ctx.invalidate::<R>().await;
                info!(
                    namespace = R::NAMESPACE,
                    op = %op,
                    id = self.id.as_deref(),
                    notified,
                    "Mutation succeeded"
                );
                self.ctx.notify(Notification::success(op.success_title(R::LABEL)));
                Ok(value)
            }
            Err(err) => {
                error!(
                    namespace = R::NAMESPACE,
                    op = %op,
                    id = self.id.as_deref(),
                    error = %err,
                    "Mutation failed"
                );
                self.ctx
                    .notify(Notification::failure(op.failure_title(R::LABEL), &err));
                Err(err)
            }
        }
    }

    /// Create a record
    ///
    /// # Errors
    /// Local errors (no tenant, no permission, invalid input) before any
    /// request; otherwise the server's error.
    pub async fn create(&self, input: &R::Create) -> ApiResult<R::Record> {
        let repo = self.ctx.repository::<R>();
        self.perform(WriteOp::Create, input.validate(), |tenant| async move {
            repo.create(&tenant, input).await
        })
        .await
    }

    /// Update the bound record
    ///
    /// # Errors
    /// As [`ResourceMutation::create`], plus a local error without an id.
    pub async fn update(&self, input: &R::Update) -> ApiResult<R::Record> {
        let repo = self.ctx.repository::<R>();
        let id = self.record_id();
        self.perform(WriteOp::Update, input.validate(), |tenant| async move {
            repo.update(&tenant, id, input).await
        })
        .await
    }

    /// Delete the bound record
    ///
    /// # Errors
    /// As [`ResourceMutation::update`].
    pub async fn delete(&self) -> ApiResult<()> {
        let repo = self.ctx.repository::<R>();
        let id = self.record_id();
        self.perform(WriteOp::Delete, Ok(()), |tenant| async move {
            repo.delete(&tenant, id).await
        })
        .await
    }
}

impl ResourceMutation<AssetGroups> {
    /// Apply one update to several groups
    ///
    /// # Errors
    /// As [`ResourceMutation::create`].
    pub async fn bulk_update(
        &self,
        ids: &[String],
        updates: &UpdateAssetGroupInput,
    ) -> ApiResult<BulkOutcome> {
        let repo = self.ctx.asset_group_repository();
        let validation = validate_ids(ids).and_then(|()| updates.validate());
        self.perform(WriteOp::BulkUpdate, validation, |tenant| async move {
            repo.bulk_update(&tenant, ids, updates).await
        })
        .await
    }

    /// Delete several groups
    ///
    /// # Errors
    /// As [`ResourceMutation::create`].
    pub async fn bulk_delete(&self, ids: &[String]) -> ApiResult<BulkOutcome> {
        let repo = self.ctx.asset_group_repository();
        self.perform(WriteOp::BulkDelete, validate_ids(ids), |tenant| async move {
            repo.bulk_delete(&tenant, ids).await
        })
        .await
    }

    /// Add assets to the bound group
    ///
    /// # Errors
    /// As [`ResourceMutation::update`].
    pub async fn add_assets(&self, asset_ids: &[String]) -> ApiResult<AssetGroup> {
        let repo = self.ctx.asset_group_repository();
        let id = self.record_id();
        self.perform(WriteOp::AddAssets, validate_asset_ids(asset_ids), |tenant| async move {
            repo.add_assets(&tenant, id, asset_ids).await
        })
        .await
    }

    /// Remove assets from the bound group
    ///
    /// # Errors
    /// As [`ResourceMutation::update`].
    pub async fn remove_assets(&self, asset_ids: &[String]) -> ApiResult<()> {
        let repo = self.ctx.asset_group_repository();
        let id = self.record_id();
        self.perform(WriteOp::RemoveAssets, validate_asset_ids(asset_ids), |tenant| async move {
            repo.remove_assets(&tenant, id, asset_ids).await
        })
        .await
    }
}

impl ResourceMutation<NotificationOutbox> {
    /// Queue the bound entry for another delivery attempt
    ///
    /// # Errors
    /// As [`ResourceMutation::update`].
    pub async fn retry(&self) -> ApiResult<OutboxEntry> {
        let repo = self.ctx.outbox_repository();
        let id = self.record_id();
        self.perform(WriteOp::Retry, Ok(()), |tenant| async move {
            repo.retry(&tenant, id).await
        })
        .await
    }
}

fn validate_ids(ids: &[String]) -> Result<(), ValidationError> {
    if ids.is_empty() {
        return Err(ValidationError::new("ids", "select at least one record"));
    }
    Ok(())
}

fn validate_asset_ids(asset_ids: &[String]) -> Result<(), ValidationError> {
    if asset_ids.is_empty() {
        return Err(ValidationError::new("asset_ids", "select at least one asset"));
    }
    Ok(())
}

impl<R: MockResource> fmt::Debug for ResourceMutation<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceMutation")
            .field("namespace", &R::NAMESPACE)
            .field("id", &self.id)
            .field("is_mutating", &self.is_mutating())
            .finish()
    }
}
