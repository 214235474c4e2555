//! Mock/real switching, tenant changes and file-based configuration.

use anyhow::Result;
use ctem_client::Method;
use ctem_data::prelude::*;
use ctem_data::ConfigError;
use ctem_model::{
    AssetGroup, AssetGroupFilters, AssetGroups, Environment, ListResponse, PermissionSet, Session,
    TenantId,
};
use ctem_test_utils::{mock_context, real_context, FakeBackend, RecordingNotifier};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::io::Write;
use std::time::Duration;

fn field_names(value: &serde_json::Value) -> BTreeSet<String> {
    value
        .as_object()
        .map(|fields| fields.keys().cloned().collect())
        .unwrap_or_default()
}

fn ids(page: &ListResponse<AssetGroup>) -> Vec<String> {
    page.data.iter().map(|g| g.id.clone()).collect()
}

/// Fixtures answer searches synchronously.
#[tokio::test]
async fn mock_search_is_ready_immediately() {
    let ctx = mock_context(RecordingNotifier::new());

    let query = ctx.query::<AssetGroups>(AssetGroupFilters::default().with_search("banking"));
    assert_eq!(query.source(), DataSource::Mock);
    assert_eq!(query.state().status, QueryStatus::Success);

    let page = query.data().expect("fixtures loaded");
    assert_eq!(page.total, 1);
    assert_eq!(page.data[0].name, "Production - Core Banking");
}

/// Fixture filtering matches what the server would do.
#[tokio::test]
async fn mock_and_api_agree_on_filters() {
    let filters = AssetGroupFilters::default()
        .with_environment([Environment::Staging])
        .with_page(1, 5);

    let mock = mock_context(RecordingNotifier::new());
    let mocked = mock.query::<AssetGroups>(filters.clone());

    let real = real_context(FakeBackend::seeded(), RecordingNotifier::new());
    let fetched = real.query::<AssetGroups>(filters);
    let fetched = fetched.settled().await;

    let mocked = mocked.data().expect("mock page");
    let fetched = fetched.data().expect("api page");
    assert_eq!(ids(&mocked), vec!["ag-004", "ag-009"]);
    assert_eq!(ids(&mocked), ids(fetched));
    assert_eq!(mocked.total, fetched.total);
}

/// Both modes expose the same state shape to consumers.
#[tokio::test]
async fn state_shape_is_mode_independent() -> Result<()> {
    let mock = mock_context(RecordingNotifier::new());
    let mocked = mock.query::<AssetGroups>(AssetGroupFilters::default());

    let real = real_context(FakeBackend::seeded(), RecordingNotifier::new());
    let fetched = real.query::<AssetGroups>(AssetGroupFilters::default());
    let settled = fetched.settled().await;

    let mocked = serde_json::to_value(mocked.state())?;
    let settled = serde_json::to_value(settled)?;
    assert_eq!(field_names(&mocked), field_names(&settled));
    assert_eq!(mocked["status"], "success");
    assert_eq!(settled["is_loading"], false);
    assert_eq!(mocked["data"]["total"], settled["data"]["total"]);
    Ok(())
}

/// A failed read notifies the same way whether it came from fixtures or the API.
#[tokio::test]
async fn missing_record_notifies_in_both_modes() {
    let mock_notifier = RecordingNotifier::new();
    let mock = mock_context(mock_notifier.clone());
    let mocked = mock.record::<AssetGroups>("ag-404");
    assert_eq!(mocked.state().status, QueryStatus::Error);

    let real_notifier = RecordingNotifier::new();
    let real = real_context(FakeBackend::seeded(), real_notifier.clone());
    let fetched = real.record::<AssetGroups>("ag-404");
    assert_eq!(fetched.settled().await.status, QueryStatus::Error);

    let mocked = mock_notifier.errors();
    let fetched = real_notifier.errors();
    assert_eq!(mocked.len(), 1);
    assert_eq!(fetched.len(), 1);
    assert_eq!(mocked[0].title, fetched[0].title);
    assert_eq!(mocked[0].title, "Failed to load asset group");
    assert_eq!(mocked[0].status, Some(404));
    assert_eq!(fetched[0].status, Some(404));
}

/// Switching sources changes where new mounts read from.
#[tokio::test]
async fn switching_source_changes_repository() {
    let backend = FakeBackend::seeded();
    let ctx = real_context(backend.clone(), RecordingNotifier::new());
    assert!(ctx.uses_real_api());

    ctx.set_real_api(false);
    assert_eq!(ctx.source(), DataSource::Mock);
    let query = ctx.query::<AssetGroups>(AssetGroupFilters::default());
    assert_eq!(query.source(), DataSource::Mock);
    assert_eq!(backend.request_count(), 0);

    ctx.set_real_api(true);
    let query = ctx.query::<AssetGroups>(AssetGroupFilters::default());
    query.settled().await;
    assert_eq!(query.source(), DataSource::Api);
    assert_eq!(backend.count(Method::Get, "/api/v1/asset-groups"), 1);
}

/// Reads are keyed by tenant, so a tenant switch never reuses a response.
#[tokio::test]
async fn tenant_switch_refetches() {
    let backend = FakeBackend::seeded();
    let ctx = real_context(backend.clone(), RecordingNotifier::new());

    let first = ctx.query::<AssetGroups>(AssetGroupFilters::default());
    first.settled().await;

    ctx.set_session(Session::for_tenant("globex", PermissionSet::all()));
    let second = ctx.query::<AssetGroups>(AssetGroupFilters::default());
    second.settled().await;

    assert_ne!(first.key(), second.key());
    let tenants: Vec<_> = backend.requests().into_iter().map(|r| r.tenant).collect();
    assert_eq!(
        tenants,
        vec![Some(TenantId::new("acme")), Some(TenantId::new("globex"))]
    );
}

/// A remount inside the dedupe window is served from the cache.
#[tokio::test]
async fn remount_within_window_uses_cache() {
    let backend = FakeBackend::seeded();
    let ctx = real_context(backend.clone(), RecordingNotifier::new());

    let first = ctx.query::<AssetGroups>(AssetGroupFilters::default());
    let loaded = first.settled().await;
    drop(first);

    let second = ctx.query::<AssetGroups>(AssetGroupFilters::default());
    let again = second.settled().await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(loaded.data, again.data);
    assert_eq!(backend.request_count(), 1);
}

/// Configuration read from a TOML file drives the context.
#[test]
fn context_from_config_file() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(
        file,
        r#"
use_real_api = false
api_base_url = "https://ctem.example.com"
dedupe_interval_ms = 500
cache_capacity = 64

[retry]
max_attempts = 2
interval_ms = 250

[log]
filter = "ctem_data=debug"
"#
    )?;

    let config = SyncConfig::from_toml_file(file.path())?;
    assert_eq!(config.dedupe_interval(), Duration::from_millis(500));
    assert_eq!(config.retry.max_attempts, 2);
    assert_eq!(config.log.filter, "ctem_data=debug");

    let ctx = DataContext::new(config)?;
    assert_eq!(ctx.source(), DataSource::Mock);
    assert_eq!(ctx.fetcher().retry_policy().interval(), Duration::from_millis(250));
    Ok(())
}

/// A missing file names its path.
#[test]
fn missing_config_file_is_io_error() {
    let err = SyncConfig::from_toml_file("/nonexistent/ctem.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Io { ref path, .. } if path.ends_with("ctem.toml")));
}
