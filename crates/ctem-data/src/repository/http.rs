//! REST-backed repository

use super::{AssetGroupRepository, DataSource, OutboxRepository, ResourceRepository};
use async_trait::async_trait;
use ctem_client::{endpoint, ApiResult, Fetcher};
use ctem_model::{
    AssetGroup, AssetGroups, AssetMembershipPayload, BulkDeletePayload, BulkOutcome,
    BulkUpdatePayload, Envelope, ListResponse, NotificationOutbox, OutboxEntry, Resource,
    TenantId, UpdateAssetGroupInput,
};
use std::fmt;
use std::marker::PhantomData;
use tracing::debug;

/// Repository for one resource over the shared [`Fetcher`]
pub struct HttpRepository<R> {
    fetcher: Fetcher,
    _resource: PhantomData<fn() -> R>,
}

impl<R> HttpRepository<R> {
    /// Wrap a fetcher
    #[must_use]
    pub fn new(fetcher: Fetcher) -> Self {
        Self {
            fetcher,
            _resource: PhantomData,
        }
    }
}

impl<R> Clone for HttpRepository<R> {
    fn clone(&self) -> Self {
        Self::new(self.fetcher.clone())
    }
}

impl<R: Resource> fmt::Debug for HttpRepository<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRepository")
            .field("namespace", &R::NAMESPACE)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<R: Resource> ResourceRepository<R> for HttpRepository<R> {
    fn source(&self) -> DataSource {
        DataSource::Api
    }

    async fn list(&self, tenant: &TenantId, filters: &R::Filters) -> ApiResult<ListResponse<R::Record>> {
        let path = endpoint::list::<R>(Some(filters));
        debug!(path = %path, "Listing");
        self.fetcher.fetch(tenant, &path).await
    }

    async fn get(&self, tenant: &TenantId, id: &str) -> ApiResult<R::Record> {
        self.fetcher.fetch(tenant, &endpoint::record::<R>(id)).await
    }

    async fn create(&self, tenant: &TenantId, input: &R::Create) -> ApiResult<R::Record> {
        self.fetcher
            .create(tenant, &endpoint::collection::<R>(), &input.to_wire())
            .await
    }

    async fn update(&self, tenant: &TenantId, id: &str, input: &R::Update) -> ApiResult<R::Record> {
        self.fetcher
            .update(tenant, &endpoint::record::<R>(id), &input.to_wire())
            .await
    }

    async fn delete(&self, tenant: &TenantId, id: &str) -> ApiResult<()> {
        self.fetcher.delete(tenant, &endpoint::record::<R>(id)).await
    }
}

#[async_trait]
impl AssetGroupRepository for HttpRepository<AssetGroups> {
    async fn bulk_update(
        &self,
        tenant: &TenantId,
        ids: &[String],
        updates: &UpdateAssetGroupInput,
    ) -> ApiResult<BulkOutcome> {
        let body = BulkUpdatePayload {
            ids: ids.to_vec(),
            updates: updates.to_wire(),
        };
        self.fetcher
            .patch(tenant, &endpoint::bulk_update::<AssetGroups>(), &body)
            .await
    }

    async fn bulk_delete(&self, tenant: &TenantId, ids: &[String]) -> ApiResult<BulkOutcome> {
        let body = BulkDeletePayload { ids: ids.to_vec() };
        self.fetcher
            .create(tenant, &endpoint::bulk_delete::<AssetGroups>(), &body)
            .await
    }

    async fn add_assets(&self, tenant: &TenantId, id: &str, asset_ids: &[String]) -> ApiResult<AssetGroup> {
        let body = AssetMembershipPayload {
            asset_ids: asset_ids.to_vec(),
        };
        self.fetcher
            .create(tenant, &endpoint::members::<AssetGroups>(id), &body)
            .await
    }

    async fn remove_assets(&self, tenant: &TenantId, id: &str, asset_ids: &[String]) -> ApiResult<()> {
        let body = AssetMembershipPayload {
            asset_ids: asset_ids.to_vec(),
        };
        self.fetcher
            .delete_with(tenant, &endpoint::members::<AssetGroups>(id), &body)
            .await
    }
}

#[async_trait]
impl OutboxRepository for HttpRepository<NotificationOutbox> {
    async fn retry(&self, tenant: &TenantId, id: &str) -> ApiResult<OutboxEntry> {
        self.fetcher
            .action(tenant, &endpoint::retry::<NotificationOutbox>(id))
            .await
    }
}
