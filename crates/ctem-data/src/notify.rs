//! User-facing notifications
//!
//! Query failures and mutation outcomes are reported through an injected
//! [`Notifier`]; the data layer never talks to a toast system directly.

use ctem_client::ApiError;
use serde::Serialize;
use tracing::{error, info};

/// Outcome kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Operation succeeded
    Success,
    /// Operation failed
    Error,
}

/// A message for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Outcome kind
    pub kind: NotificationKind,
    /// Headline
    pub title: String,
    /// Detail line
    pub description: Option<String>,
    /// HTTP status behind an error, if any
    pub status: Option<u16>,
}

impl Notification {
    /// Success message
    pub fn success(title: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            title: title.into(),
            description: None,
            status: None,
        }
    }

    /// Error message derived from an API error
    pub fn failure(title: impl Into<String>, err: &ApiError) -> Self {
        Self {
            kind: NotificationKind::Error,
            title: title.into(),
            description: Some(err.user_message()),
            status: err.status_code(),
        }
    }

    /// Whether this reports a failure
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.kind == NotificationKind::Error
    }
}

/// Receives notifications
pub trait Notifier: Send + Sync + 'static {
    /// Deliver one notification
    fn notify(&self, notification: Notification);
}

/// Notifier writing to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let description = notification.description.as_deref().unwrap_or_default();
        match notification.kind {
            NotificationKind::Success => info!(title = %notification.title, "{description}"),
            NotificationKind::Error => error!(
                title = %notification.title,
                status = ?notification.status,
                "{description}"
            ),
        }
    }
}
