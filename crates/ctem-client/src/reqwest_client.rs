//! Production transport over `reqwest`

use crate::error::{ApiError, ApiResult};
use crate::http::{ApiRequest, HttpClient, Method};
use crate::token::TokenSource;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Header carrying the tenant scope
pub const TENANT_HEADER: &str = "X-Tenant-ID";

/// Error body the backend sends with non-2xx responses
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

/// HTTP client backed by `reqwest`
///
/// Attaches the bearer token and tenant header to every request and maps
/// non-2xx responses to [`ApiError::Http`].
pub struct ReqwestClient {
    http: reqwest::Client,
    base_url: String,
    token_source: Arc<dyn TokenSource>,
}

impl ReqwestClient {
    /// Build a client for an API origin
    ///
    /// # Errors
    /// Fails if the TLS backend can not be initialized.
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        token_source: Arc<dyn TokenSource>,
    ) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::from)?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token_source,
        })
    }

    /// API origin without trailing slash
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

impl std::fmt::Debug for ReqwestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: ApiRequest) -> ApiResult<Value> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.http.request(Self::method(request.method), &url);

        if let Some(token) = self.token_source.token().await? {
            builder = builder.bearer_auth(token);
        }
        if let Some(tenant) = &request.tenant {
            builder = builder.header(TENANT_HEADER, tenant.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(method = %request.method, path = %request.path, "Sending request");
        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(error_from_body(status.as_u16(), &bytes));
        }
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Map a non-2xx body to an HTTP error, falling back to the raw text
fn error_from_body(status: u16, bytes: &[u8]) -> ApiError {
    let body: ErrorBody = serde_json::from_slice(bytes).unwrap_or_default();
    let message = body
        .message
        .or(body.error)
        .unwrap_or_else(|| String::from_utf8_lossy(bytes).trim().to_string());
    ApiError::Http {
        status,
        code: body.code,
        message,
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::http(status.as_u16(), err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}
