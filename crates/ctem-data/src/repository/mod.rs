//! Resource repositories
//!
//! One contract, two sources: [`HttpRepository`] talks to the REST API and
//! [`MockRepository`] serves in-memory fixtures with the server's filter
//! semantics. The [`DataContext`](crate::DataContext) factory decides which
//! one a handle gets.

pub mod http;
pub mod mock;

pub use http::HttpRepository;
pub use mock::{MockRepository, MockResource};

use async_trait::async_trait;
use ctem_client::ApiResult;
use ctem_model::{
    AssetGroup, AssetGroups, BulkOutcome, ListResponse, NotificationOutbox, OutboxEntry, Resource,
    TenantId, UpdateAssetGroupInput,
};
use serde::Serialize;
use std::fmt;

/// Where a repository's data comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// In-memory fixtures
    Mock,
    /// REST API
    Api,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mock => f.write_str("mock"),
            Self::Api => f.write_str("api"),
        }
    }
}

/// CRUD over one resource
///
/// Inputs arrive as client envelopes; implementations convert them at their
/// own boundary.
#[async_trait]
pub trait ResourceRepository<R: Resource>: Send + Sync {
    /// Data source
    fn source(&self) -> DataSource;

    /// Filtered, paginated list
    async fn list(&self, tenant: &TenantId, filters: &R::Filters) -> ApiResult<ListResponse<R::Record>>;

    /// One record
    async fn get(&self, tenant: &TenantId, id: &str) -> ApiResult<R::Record>;

    /// Create a record and return the stored copy
    async fn create(&self, tenant: &TenantId, input: &R::Create) -> ApiResult<R::Record>;

    /// Update a record and return the stored copy
    async fn update(&self, tenant: &TenantId, id: &str, input: &R::Update) -> ApiResult<R::Record>;

    /// Delete a record
    async fn delete(&self, tenant: &TenantId, id: &str) -> ApiResult<()>;

    /// List result available without suspending, if this source has one
    fn list_ready(&self, filters: &R::Filters) -> Option<ListResponse<R::Record>> {
        let _ = filters;
        None
    }

    /// Record available without suspending, if this source has one
    fn get_ready(&self, id: &str) -> Option<ApiResult<R::Record>> {
        let _ = id;
        None
    }
}

/// Asset group bulk and membership operations
#[async_trait]
pub trait AssetGroupRepository: ResourceRepository<AssetGroups> {
    /// Apply the same update to several groups
    async fn bulk_update(
        &self,
        tenant: &TenantId,
        ids: &[String],
        updates: &UpdateAssetGroupInput,
    ) -> ApiResult<BulkOutcome>;

    /// Delete several groups
    async fn bulk_delete(&self, tenant: &TenantId, ids: &[String]) -> ApiResult<BulkOutcome>;

    /// Add assets to a group
    async fn add_assets(&self, tenant: &TenantId, id: &str, asset_ids: &[String]) -> ApiResult<AssetGroup>;

    /// Remove assets from a group
    async fn remove_assets(&self, tenant: &TenantId, id: &str, asset_ids: &[String]) -> ApiResult<()>;
}

/// Outbox delivery control
#[async_trait]
pub trait OutboxRepository: ResourceRepository<NotificationOutbox> {
    /// Queue a failed or cancelled entry for another delivery attempt
    async fn retry(&self, tenant: &TenantId, id: &str) -> ApiResult<OutboxEntry>;
}
