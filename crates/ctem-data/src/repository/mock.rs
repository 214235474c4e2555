//! In-memory repository over fixtures
//!
//! Applies the same predicates the server does: case-insensitive substring
//! search, enum membership and inclusive numeric bounds, then sorts and pages.
//! Writes change the in-memory set so mutation flows behave end to end
//! without a backend.

use super::{AssetGroupRepository, DataSource, OutboxRepository, ResourceRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ctem_client::{ApiError, ApiResult};
use ctem_model::{
    AssetGroup, AssetGroups, BulkOutcome, DeliveryStatus, ListResponse, NotificationOutbox,
    OutboxEntry, Resource, ResourceFilter, SortDirection, TenantId, UpdateAssetGroupInput,
    Validate,
};
use parking_lot::RwLock;
use std::fmt;
use tracing::debug;

/// A resource that can be served from fixtures
pub trait MockResource: Resource {
    /// Prefix of generated ids, e.g. `ag`
    const ID_PREFIX: &'static str;

    /// Seed records
    fn fixtures() -> Vec<Self::Record>;

    /// Stored record for a create envelope
    fn from_create(id: String, input: &Self::Create, now: DateTime<Utc>) -> Self::Record;

    /// Apply an update envelope in place
    fn apply_update(record: &mut Self::Record, input: &Self::Update, now: DateTime<Utc>);
}

/// Fixture-backed repository
pub struct MockRepository<R: MockResource> {
    records: RwLock<Vec<R::Record>>,
}

impl<R: MockResource> MockRepository<R> {
    /// Repository holding the resource's fixtures
    #[must_use]
    pub fn seeded() -> Self {
        Self::with_records(R::fixtures())
    }

    /// Repository holding exactly `records`
    #[must_use]
    pub fn with_records(records: Vec<R::Record>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Number of stored records
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// True when no records are stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Copy of every stored record
    #[must_use]
    pub fn snapshot(&self) -> Vec<R::Record> {
        self.records.read().clone()
    }

    /// Filter, sort and page the stored records
    #[must_use]
    pub fn query(&self, filters: &R::Filters) -> ListResponse<R::Record> {
        let mut matching: Vec<R::Record> = self
            .records
            .read()
            .iter()
            .filter(|record| filters.matches(record))
            .cloned()
            .collect();

        if let Some(sort) = filters.sort() {
            matching.sort_by(|a, b| {
                let ordering = match (R::sort_key(a, &sort.field), R::sort_key(b, &sort.field)) {
                    (Some(a), Some(b)) => a.compare(&b),
                    _ => std::cmp::Ordering::Equal,
                };
                match sort.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }

        ListResponse::paginate(matching, filters.page())
    }

    fn find(&self, id: &str) -> ApiResult<R::Record> {
        self.records
            .read()
            .iter()
            .find(|record| R::id(record) == id)
            .cloned()
            .ok_or_else(|| not_found::<R>(id))
    }

    fn modify<T>(&self, id: &str, change: impl FnOnce(&mut R::Record) -> ApiResult<T>) -> ApiResult<T> {
        let mut records = self.records.write();
        let record = records
            .iter_mut()
            .find(|record| R::id(record) == id)
            .ok_or_else(|| not_found::<R>(id))?;
        change(record)
    }

    fn next_id() -> String {
        format!("{}-{}", R::ID_PREFIX, uuid::Uuid::new_v4().simple())
    }
}

impl<R: MockResource> Default for MockRepository<R> {
    fn default() -> Self {
        Self::seeded()
    }
}

impl<R: MockResource> fmt::Debug for MockRepository<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockRepository")
            .field("namespace", &R::NAMESPACE)
            .field("records", &self.len())
            .finish()
    }
}

fn not_found<R: Resource>(id: &str) -> ApiError {
    ApiError::Http {
        status: 404,
        code: Some("not_found".to_string()),
        message: format!("{} {id} not found", R::LABEL),
    }
}

#[async_trait]
impl<R: MockResource> ResourceRepository<R> for MockRepository<R> {
    fn source(&self) -> DataSource {
        DataSource::Mock
    }

    async fn list(&self, _tenant: &TenantId, filters: &R::Filters) -> ApiResult<ListResponse<R::Record>> {
        Ok(self.query(filters))
    }

    async fn get(&self, _tenant: &TenantId, id: &str) -> ApiResult<R::Record> {
        self.find(id)
    }

    async fn create(&self, _tenant: &TenantId, input: &R::Create) -> ApiResult<R::Record> {
        input.validate()?;
        let record = R::from_create(Self::next_id(), input, Utc::now());
        debug!(namespace = R::NAMESPACE, id = R::id(&record), "Mock record created");
        self.records.write().push(record.clone());
        Ok(record)
    }

    async fn update(&self, _tenant: &TenantId, id: &str, input: &R::Update) -> ApiResult<R::Record> {
        input.validate()?;
        self.modify(id, |record| {
            R::apply_update(record, input, Utc::now());
            Ok(record.clone())
        })
    }

    async fn delete(&self, _tenant: &TenantId, id: &str) -> ApiResult<()> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|record| R::id(record) != id);
        if records.len() == before {
            return Err(not_found::<R>(id));
        }
        Ok(())
    }

    fn list_ready(&self, filters: &R::Filters) -> Option<ListResponse<R::Record>> {
        Some(self.query(filters))
    }

    fn get_ready(&self, id: &str) -> Option<ApiResult<R::Record>> {
        Some(self.find(id))
    }
}

#[async_trait]
impl AssetGroupRepository for MockRepository<AssetGroups> {
    async fn bulk_update(
        &self,
        _tenant: &TenantId,
        ids: &[String],
        updates: &UpdateAssetGroupInput,
    ) -> ApiResult<BulkOutcome> {
        updates.validate()?;
        let now = Utc::now();
        let mut affected = 0;
        for group in self.records.write().iter_mut().filter(|g| ids.contains(&g.id)) {
            AssetGroups::apply_update(group, updates, now);
            affected += 1;
        }
        Ok(BulkOutcome { affected })
    }

    async fn bulk_delete(&self, _tenant: &TenantId, ids: &[String]) -> ApiResult<BulkOutcome> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|group| !ids.contains(&group.id));
        Ok(BulkOutcome {
            affected: (before - records.len()) as u64,
        })
    }

    async fn add_assets(&self, _tenant: &TenantId, id: &str, asset_ids: &[String]) -> ApiResult<AssetGroup> {
        let added = u32::try_from(asset_ids.len()).unwrap_or(u32::MAX);
        self.modify(id, |group| {
            group.asset_count = group.asset_count.saturating_add(added);
            group.updated_at = Utc::now();
            Ok(group.clone())
        })
    }

    async fn remove_assets(&self, _tenant: &TenantId, id: &str, asset_ids: &[String]) -> ApiResult<()> {
        let removed = u32::try_from(asset_ids.len()).unwrap_or(u32::MAX);
        self.modify(id, |group| {
            group.asset_count = group.asset_count.saturating_sub(removed);
            group.updated_at = Utc::now();
            Ok(())
        })
    }
}

#[async_trait]
impl OutboxRepository for MockRepository<NotificationOutbox> {
    async fn retry(&self, _tenant: &TenantId, id: &str) -> ApiResult<OutboxEntry> {
        self.modify(id, |entry| match entry.status {
            DeliveryStatus::Failed | DeliveryStatus::Cancelled => {
                entry.status = DeliveryStatus::Pending;
                entry.last_error = None;
                Ok(entry.clone())
            }
            DeliveryStatus::Pending | DeliveryStatus::Sent => Err(ApiError::Http {
                status: 409,
                code: Some("not_retryable".to_string()),
                message: format!("Notification {id} is not in a retryable state"),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctem_model::{
        AssetGroupFilters, CreateAssetGroupInput, Criticality, Environment, NumericRange, SortSpec,
    };
    use pretty_assertions::assert_eq;

    fn tenant() -> TenantId {
        TenantId::new("acme")
    }

    fn names(page: &ListResponse<AssetGroup>) -> Vec<&str> {
        page.data.iter().map(|g| g.name.as_str()).collect()
    }

    #[test]
    fn search_banking_finds_one_group() {
        let repo = MockRepository::<AssetGroups>::seeded();
        assert_eq!(repo.len(), 9);

        let page = repo.query(&AssetGroupFilters::default().with_search("banking"));
        assert_eq!(page.total, 1);
        assert_eq!(names(&page), vec!["Production - Core Banking"]);
    }

    #[test]
    fn search_is_case_insensitive() {
        let repo = MockRepository::<AssetGroups>::seeded();
        let page = repo.query(&AssetGroupFilters::default().with_search("STAGING"));
        assert_eq!(page.total, 2);
    }

    #[test]
    fn facets_and_ranges_combine() {
        let repo = MockRepository::<AssetGroups>::seeded();
        let filters = AssetGroupFilters::default()
            .with_environment([Environment::Production])
            .with_risk_score(NumericRange::between(60.0, 90.0))
            .with_sort(SortSpec::desc("risk_score"));
        let page = repo.query(&filters);

        assert!(page.data.iter().all(|g| g.environment == Environment::Production));
        assert!(page
            .data
            .windows(2)
            .all(|pair| pair[0].risk_score >= pair[1].risk_score));
        assert!(page.data.iter().all(|g| (60.0..=90.0).contains(&g.risk_score)));
    }

    #[test]
    fn paging_reports_totals() {
        let repo = MockRepository::<AssetGroups>::seeded();
        let page = repo.query(&AssetGroupFilters::default().with_page(2, 4));
        assert_eq!(page.total, 9);
        assert_eq!(page.len(), 4);
        assert_eq!(page.total_pages, 3);
    }

    #[tokio::test]
    async fn create_update_delete() {
        let repo = MockRepository::<AssetGroups>::seeded();
        let created = repo
            .create(
                &tenant(),
                &CreateAssetGroupInput::new("Retail Banking", Environment::Staging, Criticality::High),
            )
            .await
            .unwrap();
        assert!(created.id.starts_with("ag-"));
        assert_eq!(repo.len(), 10);

        let updated = repo
            .update(
                &tenant(),
                &created.id,
                &UpdateAssetGroupInput {
                    criticality: Some(Criticality::Critical),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.criticality, Criticality::Critical);
        assert_eq!(updated.name, "Retail Banking");

        repo.delete(&tenant(), &created.id).await.unwrap();
        let err = repo.get(&tenant(), &created.id).await.unwrap_err();
        assert_eq!(err.status_code(), Some(404));
    }

    #[tokio::test]
    async fn create_rejects_invalid_input() {
        let repo = MockRepository::<AssetGroups>::seeded();
        let err = repo
            .create(
                &tenant(),
                &CreateAssetGroupInput::new("", Environment::Staging, Criticality::Low),
            )
            .await
            .unwrap_err();
        assert!(err.is_local());
        assert_eq!(repo.len(), 9);
    }

    #[tokio::test]
    async fn bulk_delete_counts_only_existing() {
        let repo = MockRepository::<AssetGroups>::seeded();
        let outcome = repo
            .bulk_delete(&tenant(), &["ag-002".into(), "ag-003".into(), "ag-404".into()])
            .await
            .unwrap();
        assert_eq!(outcome.affected, 2);
        assert_eq!(repo.len(), 7);
    }

    #[tokio::test]
    async fn membership_adjusts_counts() {
        let repo = MockRepository::<AssetGroups>::seeded();
        let before = repo.get(&tenant(), "ag-001").await.unwrap().asset_count;
        let group = repo
            .add_assets(&tenant(), "ag-001", &["a-1".into(), "a-2".into()])
            .await
            .unwrap();
        assert_eq!(group.asset_count, before + 2);

        repo.remove_assets(&tenant(), "ag-001", &["a-1".into()]).await.unwrap();
        assert_eq!(repo.get(&tenant(), "ag-001").await.unwrap().asset_count, before + 1);
    }

    #[tokio::test]
    async fn outbox_retry_only_from_failed_or_cancelled() {
        let repo = MockRepository::<NotificationOutbox>::seeded();
        let failed = repo
            .snapshot()
            .into_iter()
            .find(|e| e.status == DeliveryStatus::Failed)
            .unwrap();
        let entry = repo.retry(&tenant(), &failed.id).await.unwrap();
        assert_eq!(entry.status, DeliveryStatus::Pending);
        assert_eq!(entry.last_error, None);

        let err = repo.retry(&tenant(), &failed.id).await.unwrap_err();
        assert_eq!(err.status_code(), Some(409));
    }
}
