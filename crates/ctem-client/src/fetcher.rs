//! Fetcher
//!
//! Thin typed wrapper over the shared [`HttpClient`]. Reads go through the
//! retry policy; writes are sent exactly once so a timed-out create can not
//! be duplicated.

use crate::error::ApiResult;
use crate::http::{encode, HttpClient, HttpClientExt, Method};
use crate::retry::RetryPolicy;
use ctem_model::TenantId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

/// Typed access to the API
#[derive(Clone)]
pub struct Fetcher {
    client: Arc<dyn HttpClient>,
    retry: RetryPolicy,
}

impl Fetcher {
    /// Wrap a transport
    #[must_use]
    pub fn new(client: Arc<dyn HttpClient>, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// Retry policy applied to reads
    #[inline]
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Underlying transport
    #[inline]
    #[must_use]
    pub fn client(&self) -> &Arc<dyn HttpClient> {
        &self.client
    }

    /// GET with retries
    ///
    /// # Errors
    /// The last error after the retry policy gives up.
    #[instrument(skip(self, tenant), fields(tenant = %tenant))]
    pub async fn fetch<T>(&self, tenant: &TenantId, path: &str) -> ApiResult<T>
    where
        T: DeserializeOwned + Send,
    {
        let client = self.client.as_ref();
        self.retry
            .run(path, || client.get::<T>(tenant, path))
            .await
    }

    /// POST a create payload
    ///
    /// # Errors
    /// Transport, status or decode failure.
    pub async fn create<B, T>(&self, tenant: &TenantId, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned + Send,
    {
        self.client.as_ref().post(tenant, path, body).await
    }

    /// PUT an update payload
    ///
    /// # Errors
    /// Transport, status or decode failure.
    pub async fn update<B, T>(&self, tenant: &TenantId, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned + Send,
    {
        self.client.as_ref().put(tenant, path, body).await
    }

    /// PATCH a partial payload
    ///
    /// # Errors
    /// Transport, status or decode failure.
    pub async fn patch<B, T>(&self, tenant: &TenantId, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned + Send,
    {
        self.client.as_ref().patch(tenant, path, body).await
    }

    /// POST without a body, e.g. an action endpoint
    ///
    /// # Errors
    /// Transport, status or decode failure.
    pub async fn action<T>(&self, tenant: &TenantId, path: &str) -> ApiResult<T>
    where
        T: DeserializeOwned + Send,
    {
        self.client.as_ref().write(Method::Post, tenant, path, None).await
    }

    /// DELETE
    ///
    /// # Errors
    /// Transport or status failure.
    pub async fn delete(&self, tenant: &TenantId, path: &str) -> ApiResult<()> {
        self.client.as_ref().del(tenant, path).await
    }

    /// DELETE with a body, ignoring the reply
    ///
    /// # Errors
    /// Transport or status failure.
    pub async fn delete_with<B>(&self, tenant: &TenantId, path: &str, body: &B) -> ApiResult<()>
    where
        B: Serialize + Sync + ?Sized,
    {
        let body = encode(body)?;
        self.client
            .as_ref()
            .write::<Value>(Method::Delete, tenant, path, Some(body))
            .await
            .map(|_| ())
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
