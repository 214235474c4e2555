//! Error types for the API boundary
//!
//! Every failure a read or write can produce ends up here:
//! - HTTP status errors (4xx client errors, 5xx server errors)
//! - Transport failures and timeouts
//! - Payload encode/decode failures
//! - Local validation, which never reaches the network

use ctem_model::ValidationError;

/// Result alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// API error
///
/// `Clone` so one failed coalesced request can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// Non-2xx response
    #[error("HTTP {status}: {message}")]
    Http {
        /// Status code
        status: u16,
        /// Machine-readable code from the error body
        code: Option<String>,
        /// Server message, or the status reason
        message: String,
    },

    /// Connection refused, reset, DNS failure
    #[error("network: {0}")]
    Network(String),

    /// Request exceeded the configured timeout
    #[error("request timed out")]
    Timeout,

    /// Response body did not match the expected shape
    #[error("decode: {0}")]
    Decode(String),

    /// Request body could not be serialized
    #[error("encode: {0}")]
    Encode(String),

    /// Token source failed
    #[error("auth: {0}")]
    Auth(String),

    /// Input rejected before any network call
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Operation not possible in the current session (no tenant, no id, no permission)
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl ApiError {
    /// Build an HTTP error
    #[inline]
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            code: None,
            message: message.into(),
        }
    }

    /// Build an unavailable error
    #[inline]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }

    /// Server errors and transport failures; 4xx is never retried
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => *status >= 500,
            Self::Network(_) | Self::Timeout => true,
            _ => false,
        }
    }

    /// 4xx response
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Http { status, .. } if (400..500).contains(status))
    }

    /// Failed before reaching the network
    #[inline]
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Unavailable(_) | Self::Encode(_))
    }

    /// HTTP status, if the server answered
    #[inline]
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Machine-readable error code, if the server sent one
    #[inline]
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Http { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Message suitable for a toast
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Http { status, message, .. } => {
                if message.trim().is_empty() {
                    status_reason(*status).to_string()
                } else {
                    message.clone()
                }
            }
            Self::Network(_) => "Network error. Check your connection and try again.".into(),
            Self::Timeout => "The server took too long to respond.".into(),
            Self::Decode(_) => "Unexpected response from the server.".into(),
            Self::Encode(_) => "The request could not be prepared.".into(),
            Self::Auth(_) => "Your session has expired. Sign in again.".into(),
            Self::Validation(err) => err.to_string(),
            Self::Unavailable(reason) => reason.clone(),
        }
    }
}

fn status_reason(status: u16) -> &'static str {
    match status {
        400 => "Bad request",
        401 => "Not authenticated",
        403 => "You do not have permission to do that",
        404 => "Not found",
        409 => "Conflict with the current state",
        422 => "Invalid input",
        429 => "Too many requests",
        500..=599 => "Server error",
        _ => "Request failed",
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_classification() {
        assert!(ApiError::http(503, "down").is_retryable());
        assert!(ApiError::Network("reset".into()).is_retryable());
        assert!(ApiError::Timeout.is_retryable());
        assert!(!ApiError::http(404, "gone").is_retryable());
        assert!(!ApiError::http(429, "slow down").is_retryable());
        assert!(!ApiError::Validation(ValidationError::required("name")).is_retryable());
    }

    #[test]
    fn error_display() {
        let err = ApiError::Http {
            status: 409,
            code: Some("duplicate_name".into()),
            message: "name already used".into(),
        };
        assert_eq!(err.to_string(), "HTTP 409: name already used");
        assert_eq!(err.code(), Some("duplicate_name"));
        assert_eq!(err.status_code(), Some(409));
        assert!(err.is_client_error());
    }

    #[test]
    fn user_message_falls_back_to_reason() {
        assert_eq!(ApiError::http(403, "").user_message(), "You do not have permission to do that");
        assert_eq!(ApiError::http(500, "db unavailable").user_message(), "db unavailable");
    }

    #[test]
    fn local_errors() {
        assert!(ApiError::unavailable("no tenant selected").is_local());
        assert!(!ApiError::Timeout.is_local());
    }
}
