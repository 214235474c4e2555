//! Write path: mutations, invalidation and the reads that follow them.

use ctem_client::{ApiError, Method};
use ctem_data::prelude::*;
use ctem_model::{
    AssetGroupFilters, AssetGroups, CreateAssetGroupInput, Criticality, DeliveryStatus,
    Environment, NotificationOutbox, OutboxFilters, Permission, PermissionSet, Session,
    UpdateAssetGroupInput,
};
use ctem_test_utils::{
    mock_context, real_context, wait_until, FakeBackend, RecordingNotifier, TEST_TENANT,
};
use pretty_assertions::assert_eq;
use std::time::Duration;

const GROUPS: &str = "/api/v1/asset-groups";

fn ids(raw: &[&str]) -> Vec<String> {
    raw.iter().map(ToString::to_string).collect()
}

fn edge_group() -> CreateAssetGroupInput {
    CreateAssetGroupInput::new("Edge Routers", Environment::Production, Criticality::High)
}

/// Bulk delete refetches the mounted list, which no longer has the ids.
#[tokio::test]
async fn bulk_delete_refreshes_mounted_list() {
    let backend = FakeBackend::seeded();
    let notifier = RecordingNotifier::new();
    let ctx = real_context(backend.clone(), notifier.clone());

    let query = ctx.query::<AssetGroups>(AssetGroupFilters::default());
    assert_eq!(query.settled().await.data().map(|p| p.total), Some(9));

    let outcome = ctx
        .mutation::<AssetGroups>()
        .bulk_delete(&ids(&["ag-001", "ag-002"]))
        .await
        .expect("bulk delete succeeds");
    assert_eq!(outcome.affected, 2);

    let state = wait_until(&query, |state| {
        state.status == QueryStatus::Success && state.data().is_some_and(|p| p.total == 7)
    })
    .await;
    let page = state.data().expect("page");
    assert!(page.data.iter().all(|g| g.id != "ag-001" && g.id != "ag-002"));
    assert_eq!(backend.count(Method::Post, "/api/v1/asset-groups/bulk-delete"), 1);
    assert_eq!(notifier.successes().len(), 1);
}

/// While the list refetches, the previous page stays visible.
#[tokio::test]
async fn revalidation_keeps_previous_data_visible() {
    let backend = FakeBackend::seeded();
    let ctx = real_context(backend.clone(), RecordingNotifier::new());

    let query = ctx.query::<AssetGroups>(AssetGroupFilters::default());
    let before = query.settled().await;
    backend.set_latency(Some(Duration::from_millis(100)));

    ctx.record_mutation::<AssetGroups>("ag-005")
        .delete()
        .await
        .expect("delete succeeds");

    let revalidating = wait_until(&query, |state| state.status == QueryStatus::Revalidating).await;
    assert!(revalidating.is_validating());
    assert!(!revalidating.is_loading());
    assert_eq!(revalidating.data, before.data);

    let done = wait_until(&query, |state| state.status == QueryStatus::Success).await;
    assert_eq!(done.data().map(|p| p.total), Some(8));
}

/// A failed create rejects, clears the in-flight flag, notifies and leaves
/// every read alone.
#[tokio::test]
async fn failed_create_does_not_invalidate() {
    let backend = FakeBackend::seeded();
    let notifier = RecordingNotifier::new();
    let ctx = real_context(backend.clone(), notifier.clone());

    let query = ctx.query::<AssetGroups>(AssetGroupFilters::default());
    let before = query.settled().await;

    backend.fail_next_with(Method::Post, ApiError::Network("connection reset".into()));
    let mutation = ctx.mutation::<AssetGroups>();
    let err = mutation.create(&edge_group()).await.unwrap_err();

    assert_eq!(err, ApiError::Network("connection reset".into()));
    assert!(!mutation.is_mutating());

    let errors = notifier.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].description.as_deref(),
        Some("Network error. Check your connection and try again.")
    );
    assert!(notifier.successes().is_empty());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(backend.count(Method::Get, GROUPS), 1);
    assert_eq!(query.state().data, before.data);
}

/// A successful create shows up in the mounted list.
#[tokio::test]
async fn create_appears_in_list() {
    let backend = FakeBackend::seeded();
    let ctx = real_context(backend.clone(), RecordingNotifier::new());

    let query = ctx.query::<AssetGroups>(AssetGroupFilters::default());
    query.settled().await;

    let created = ctx
        .mutation::<AssetGroups>()
        .create(&edge_group())
        .await
        .expect("create succeeds");
    assert_eq!(created.name, "Edge Routers");

    let state = wait_until(&query, |state| state.data().is_some_and(|p| p.total == 10)).await;
    let page = state.data().expect("page");
    assert!(page.data.iter().any(|g| g.id == created.id));
}

/// Invalid input never reaches the server.
#[tokio::test]
async fn invalid_input_is_rejected_locally() {
    let backend = FakeBackend::seeded();
    let notifier = RecordingNotifier::new();
    let ctx = real_context(backend.clone(), notifier.clone());

    let mut input = edge_group();
    input.name = "   ".into();
    let err = ctx.mutation::<AssetGroups>().create(&input).await.unwrap_err();

    assert!(err.is_local());
    assert!(matches!(err, ApiError::Validation(ref v) if v.field == "name"));
    assert_eq!(backend.request_count(), 0);
    assert_eq!(notifier.errors().len(), 1);
}

/// Empty bulk selections are rejected before any request.
#[tokio::test]
async fn bulk_operations_need_ids() {
    let backend = FakeBackend::seeded();
    let ctx = real_context(backend.clone(), RecordingNotifier::new());
    let mutation = ctx.mutation::<AssetGroups>();

    let err = mutation.bulk_delete(&[]).await.unwrap_err();
    assert!(matches!(err, ApiError::Validation(ref v) if v.field == "ids"));

    let err = mutation
        .bulk_update(&[], &UpdateAssetGroupInput::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(ref v) if v.field == "ids"));
    assert_eq!(backend.request_count(), 0);
}

/// Writes need the resource's write permission.
#[tokio::test]
async fn writes_need_permission() {
    let backend = FakeBackend::seeded();
    let ctx = real_context(backend.clone(), RecordingNotifier::new());
    ctx.set_session(Session::for_tenant(
        TEST_TENANT,
        PermissionSet::all().without(Permission::AssetGroupsWrite),
    ));

    let err = ctx.mutation::<AssetGroups>().create(&edge_group()).await.unwrap_err();
    assert!(err.is_local());
    assert!(err.user_message().starts_with("Missing permission"));
    assert_eq!(backend.request_count(), 0);
}

/// Record-level writes need a bound id.
#[tokio::test]
async fn record_writes_need_an_id() {
    let backend = FakeBackend::seeded();
    let ctx = real_context(backend.clone(), RecordingNotifier::new());
    let mutation = ctx.mutation::<AssetGroups>();

    let err = mutation.delete().await.unwrap_err();
    assert_eq!(err.user_message(), "Asset group id required");
    assert!(!mutation.is_mutating());
    assert_eq!(backend.request_count(), 0);
}

/// Bulk update sends one PATCH and refreshes the list.
#[tokio::test]
async fn bulk_update_patches_every_target() {
    let backend = FakeBackend::seeded();
    let ctx = real_context(backend.clone(), RecordingNotifier::new());

    let query = ctx.query::<AssetGroups>(
        AssetGroupFilters::default().with_criticality([Criticality::Low]),
    );
    assert_eq!(query.settled().await.data().map(|p| p.total), Some(2));

    let updates = UpdateAssetGroupInput {
        criticality: Some(Criticality::Low),
        ..UpdateAssetGroupInput::default()
    };
    let outcome = ctx
        .mutation::<AssetGroups>()
        .bulk_update(&ids(&["ag-004", "ag-009"]), &updates)
        .await
        .expect("bulk update succeeds");
    assert_eq!(outcome.affected, 2);
    assert_eq!(backend.count(Method::Patch, "/api/v1/asset-groups/bulk"), 1);

    wait_until(&query, |state| state.data().is_some_and(|p| p.total == 4)).await;
}

/// Membership changes go to the group's assets endpoint.
#[tokio::test]
async fn membership_changes() {
    let backend = FakeBackend::seeded();
    let ctx = real_context(backend.clone(), RecordingNotifier::new());
    let mutation = ctx.record_mutation::<AssetGroups>("ag-003");

    let group = mutation
        .add_assets(&ids(&["asset-1", "asset-2"]))
        .await
        .expect("add succeeds");
    assert_eq!(group.asset_count, 14);

    mutation
        .remove_assets(&ids(&["asset-1"]))
        .await
        .expect("remove succeeds");
    assert_eq!(backend.count(Method::Post, "/api/v1/asset-groups/ag-003/assets"), 1);
    assert_eq!(backend.count(Method::Delete, "/api/v1/asset-groups/ag-003/assets"), 1);
}

/// Retrying a failed delivery requeues it and refreshes the record read.
#[tokio::test]
async fn outbox_retry_refreshes_record() {
    let backend = FakeBackend::seeded();
    let ctx = real_context(backend.clone(), RecordingNotifier::new());

    let record = ctx.record::<NotificationOutbox>("nt-003");
    let before = record.settled().await;
    assert_eq!(before.data().map(|e| e.status), Some(DeliveryStatus::Failed));

    let entry = ctx
        .record_mutation::<NotificationOutbox>("nt-003")
        .retry()
        .await
        .expect("retry succeeds");
    assert_eq!(entry.status, DeliveryStatus::Pending);

    wait_until(&record, |state| {
        state.data().is_some_and(|e| e.status == DeliveryStatus::Pending)
    })
    .await;
    assert_eq!(backend.count(Method::Post, "/api/v1/notification-outbox/nt-003/retry"), 1);
}

/// Invalidation is scoped to the mutated resource.
#[tokio::test]
async fn other_resources_are_not_refetched() {
    let backend = FakeBackend::seeded();
    let ctx = real_context(backend.clone(), RecordingNotifier::new());

    let outbox = ctx.query::<NotificationOutbox>(OutboxFilters::default());
    outbox.settled().await;

    ctx.record_mutation::<AssetGroups>("ag-007")
        .delete()
        .await
        .expect("delete succeeds");
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(backend.count(Method::Get, "/api/v1/notification-outbox"), 1);
}

/// In mock mode writes land in the fixture store and later mounts see them.
#[tokio::test]
async fn mock_writes_update_fixture_store() {
    let notifier = RecordingNotifier::new();
    let ctx = mock_context(notifier.clone());

    let created = ctx
        .mutation::<AssetGroups>()
        .create(&edge_group())
        .await
        .expect("create succeeds");
    assert!(created.id.starts_with("ag-"));

    let query = ctx.query::<AssetGroups>(AssetGroupFilters::default());
    assert_eq!(query.data().map(|p| p.total), Some(10));
    assert_eq!(notifier.successes().len(), 1);
}

/// Only failed or cancelled deliveries can be retried.
#[tokio::test]
async fn mock_retry_rejects_pending_entry() {
    let ctx = mock_context(RecordingNotifier::new());

    let err = ctx
        .record_mutation::<NotificationOutbox>("nt-001")
        .retry()
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), Some(409));
    assert_eq!(err.code(), Some("not_retryable"));
}
