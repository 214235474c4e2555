//! Testing utilities for the CTEM data layer
//!
//! An in-memory REST backend, a notifier that records what it is told, and
//! context builders wired to either.

#![allow(missing_docs)]

pub mod backend;

pub use backend::FakeBackend;

use ctem_client::RetryPolicy;
use ctem_data::{DataContext, Notification, Notifier, QueryHandle, QueryState, SyncConfig};
use ctem_model::{PermissionSet, Session, TenantId};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound for background revalidation in tests
pub const WAIT: Duration = Duration::from_secs(2);

pub const TEST_TENANT: &str = "acme";

/// Notifier keeping every notification
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn all(&self) -> Vec<Notification> {
        self.seen.lock().clone()
    }

    pub fn errors(&self) -> Vec<Notification> {
        self.seen.lock().iter().filter(|n| n.is_error()).cloned().collect()
    }

    pub fn successes(&self) -> Vec<Notification> {
        self.seen.lock().iter().filter(|n| !n.is_error()).cloned().collect()
    }

    pub fn clear(&self) {
        self.seen.lock().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().push(notification);
    }
}

pub fn tenant() -> TenantId {
    TenantId::new(TEST_TENANT)
}

pub fn full_session() -> Session {
    Session::for_tenant(TEST_TENANT, PermissionSet::all())
}

/// Config for real-mode tests: no retry delay surprises
pub fn test_config() -> SyncConfig {
    SyncConfig::default()
        .with_real_api(true)
        .with_retry(RetryPolicy::none())
}

/// Fixture-backed context with every permission
pub fn mock_context(notifier: Arc<RecordingNotifier>) -> DataContext {
    DataContext::builder(SyncConfig::default())
        .with_session(full_session())
        .with_notifier(notifier)
        .build()
        .unwrap()
}

/// Context talking to `backend` with every permission
pub fn real_context(backend: Arc<FakeBackend>, notifier: Arc<RecordingNotifier>) -> DataContext {
    real_context_with(test_config(), backend, notifier)
}

pub fn real_context_with(
    config: SyncConfig,
    backend: Arc<FakeBackend>,
    notifier: Arc<RecordingNotifier>,
) -> DataContext {
    DataContext::builder(config.with_real_api(true))
        .with_client(backend)
        .with_session(full_session())
        .with_notifier(notifier)
        .build()
        .unwrap()
}

/// Wait until the handle's state satisfies `ready`
///
/// Panics after [`WAIT`].
pub async fn wait_until<T, F>(handle: &QueryHandle<T>, ready: F) -> QueryState<T>
where
    T: Send + Sync + 'static,
    F: FnMut(&QueryState<T>) -> bool,
{
    let mut receiver = handle.watch();
    let waited = tokio::time::timeout(WAIT, async move {
        receiver.wait_for(ready).await.map(|state| QueryState::clone(&state))
    })
    .await;
    waited
        .expect("query state did not change in time")
        .expect("query task ended")
}
