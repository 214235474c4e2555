//! HTTP boundary
//!
//! [`HttpClient`] is the single seam between the data layer and the network.
//! It moves JSON values; typing happens in [`HttpClientExt`] so every
//! implementation (reqwest, the in-memory test backend, mocks) stays small.

use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use ctem_model::TenantId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl Method {
    /// Upper-case verb
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Whether the request changes server state
    #[inline]
    #[must_use]
    pub fn is_write(self) -> bool {
        !matches!(self, Self::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outgoing request
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// Verb
    pub method: Method,
    /// Path with query string, relative to the API origin
    pub path: String,
    /// Tenant the request is scoped to
    pub tenant: Option<TenantId>,
    /// JSON body
    pub body: Option<Value>,
}

impl ApiRequest {
    /// Request without body or tenant
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            tenant: None,
            body: None,
        }
    }

    /// Scope to a tenant
    #[must_use]
    pub fn with_tenant(mut self, tenant: TenantId) -> Self {
        self.tenant = Some(tenant);
        self
    }

    /// Attach a JSON body
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Path without the query string
    #[must_use]
    pub fn route(&self) -> &str {
        self.path.split_once('?').map_or(self.path.as_str(), |(route, _)| route)
    }
}

/// Transport used by the fetcher
///
/// Implementations attach auth and tenant context and map non-2xx responses
/// to [`ApiError::Http`]. An empty success body is returned as `Value::Null`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpClient: Send + Sync + 'static {
    /// Execute a request
    async fn send(&self, request: ApiRequest) -> ApiResult<Value>;
}

/// Typed helpers over [`HttpClient::send`]
#[async_trait]
pub trait HttpClientExt: HttpClient {
    /// GET and decode
    async fn get<T: DeserializeOwned + Send>(&self, tenant: &TenantId, path: &str) -> ApiResult<T> {
        let request = ApiRequest::new(Method::Get, path).with_tenant(tenant.clone());
        decode(self.send(request).await?)
    }

    /// POST a body and decode the reply
    async fn post<B, T>(&self, tenant: &TenantId, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned + Send,
    {
        self.write(Method::Post, tenant, path, Some(encode(body)?)).await
    }

    /// PUT a body and decode the reply
    async fn put<B, T>(&self, tenant: &TenantId, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned + Send,
    {
        self.write(Method::Put, tenant, path, Some(encode(body)?)).await
    }

    /// PATCH a body and decode the reply
    async fn patch<B, T>(&self, tenant: &TenantId, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned + Send,
    {
        self.write(Method::Patch, tenant, path, Some(encode(body)?)).await
    }

    /// DELETE, ignoring any reply body
    async fn del(&self, tenant: &TenantId, path: &str) -> ApiResult<()> {
        let request = ApiRequest::new(Method::Delete, path).with_tenant(tenant.clone());
        self.send(request).await.map(|_| ())
    }

    /// Any write with an optional body
    async fn write<T: DeserializeOwned + Send>(
        &self,
        method: Method,
        tenant: &TenantId,
        path: &str,
        body: Option<Value>,
    ) -> ApiResult<T> {
        let mut request = ApiRequest::new(method, path).with_tenant(tenant.clone());
        request.body = body;
        decode(self.send(request).await?)
    }
}

impl<C: HttpClient + ?Sized> HttpClientExt for C {}

/// Serialize a request body
///
/// # Errors
/// Returns [`ApiError::Encode`] if serialization fails.
pub fn encode<B: Serialize + ?Sized>(body: &B) -> ApiResult<Value> {
    serde_json::to_value(body).map_err(|e| ApiError::Encode(e.to_string()))
}

/// Decode a response body; `Null` decodes into unit-like targets
///
/// # Errors
/// Returns [`ApiError::Decode`] when the value has the wrong shape.
pub fn decode<T: DeserializeOwned>(value: Value) -> ApiResult<T> {
    serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn ext_attaches_tenant_and_body() {
        let mut mock = MockHttpClient::new();
        mock.expect_send()
            .withf(|req| {
                req.method == Method::Post
                    && req.path == "/api/v1/workflows"
                    && req.tenant.as_ref().map(TenantId::as_str) == Some("acme")
                    && req.body == Some(json!({ "name": "Triage" }))
            })
            .times(1)
            .returning(|_| Ok(json!({ "id": "wf-1" })));

        let reply: Value = mock
            .post(&TenantId::new("acme"), "/api/v1/workflows", &json!({ "name": "Triage" }))
            .await
            .unwrap();
        assert_eq!(reply["id"], "wf-1");
    }

    #[tokio::test]
    async fn decode_mismatch_is_decode_error() {
        let mut mock = MockHttpClient::new();
        mock.expect_send().returning(|_| Ok(json!("not a number")));
        let err = mock.get::<u32>(&TenantId::new("acme"), "/x").await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn route_strips_query() {
        let req = ApiRequest::new(Method::Get, "/api/v1/agents?status=online");
        assert_eq!(req.route(), "/api/v1/agents");
        assert!(!Method::Get.is_write());
        assert!(Method::Delete.is_write());
    }
}
