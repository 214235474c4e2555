//! Bearer token providers
//!
//! Session handling lives outside the data layer. The surrounding app hands
//! the client a [`TokenSource`], which is asked for a token before every
//! request.

use crate::error::ApiResult;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

/// Pluggable token provider
///
/// `Ok(None)` sends the request without an `Authorization` header.
#[async_trait]
pub trait TokenSource: Send + Sync + 'static {
    /// Current access token
    async fn token(&self) -> ApiResult<Option<String>>;
}

/// Anonymous requests
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

#[async_trait]
impl TokenSource for NoAuth {
    async fn token(&self) -> ApiResult<Option<String>> {
        Ok(None)
    }
}

/// Token obtained elsewhere and swapped in place when the session refreshes it
#[derive(Debug, Clone, Default)]
pub struct SharedToken {
    inner: Arc<RwLock<Option<String>>>,
}

impl SharedToken {
    /// Start with a token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(token.into()))),
        }
    }

    /// Replace the token
    pub fn set(&self, token: impl Into<String>) {
        *self.inner.write() = Some(token.into());
    }

    /// Drop the token (signed out)
    pub fn clear(&self) {
        *self.inner.write() = None;
    }
}

#[async_trait]
impl TokenSource for SharedToken {
    async fn token(&self) -> ApiResult<Option<String>> {
        Ok(self.inner.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shared_token_swaps_in_place() {
        let token = SharedToken::new("a");
        let handle = token.clone();
        assert_eq!(token.token().await.unwrap().as_deref(), Some("a"));
        handle.set("b");
        assert_eq!(token.token().await.unwrap().as_deref(), Some("b"));
        handle.clear();
        assert_eq!(token.token().await.unwrap(), None);
        assert_eq!(NoAuth.token().await.unwrap(), None);
    }
}
