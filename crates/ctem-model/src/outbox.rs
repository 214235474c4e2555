//! Notification outbox
//!
//! Outgoing notifications queued by the backend. The dashboard lists them,
//! enqueues manual ones, cancels pending ones and asks for failed ones to be
//! retried.

use crate::error::{require_text, ValidationError};
use crate::permission::Permission;
use crate::query::{
    facet_matches, text_matches, PageRequest, QueryParams, ResourceFilter, SortKey, SortSpec,
};
use crate::resource::{Envelope, Resource, Validate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Delivery channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryChannel {
    /// Email
    Email,
    /// Slack
    Slack,
    /// Microsoft Teams
    Teams,
    /// Generic webhook
    Webhook,
}

impl DeliveryChannel {
    /// Wire form
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Slack => "slack",
            Self::Teams => "teams",
            Self::Webhook => "webhook",
        }
    }
}

impl fmt::Display for DeliveryChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Waiting for the dispatcher
    Pending,
    /// Delivered
    Sent,
    /// Gave up or last attempt failed
    Failed,
    /// Cancelled by a user
    Cancelled,
}

impl DeliveryStatus {
    /// Wire form
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    /// Opaque identifier
    pub id: String,
    /// Channel
    pub channel: DeliveryChannel,
    /// Address, channel name or URL
    pub recipient: String,
    /// Subject line
    pub subject: String,
    /// Delivery state
    pub status: DeliveryStatus,
    /// Delivery attempts so far
    pub attempts: u32,
    /// Error from the last failed attempt
    pub last_error: Option<String>,
    /// Enqueue time
    pub created_at: DateTime<Utc>,
    /// Delivery time
    pub sent_at: Option<DateTime<Utc>>,
}

/// Filter object for `GET /notification-outbox`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutboxFilters {
    /// Substring of subject or recipient
    pub search: Option<String>,
    /// Any of these channels
    pub channel: Vec<DeliveryChannel>,
    /// Any of these states
    pub status: Vec<DeliveryStatus>,
    /// Page selection
    pub page: PageRequest,
    /// Ordering
    pub sort: Option<SortSpec>,
}

impl OutboxFilters {
    /// With status facet
    #[must_use]
    pub fn with_status(mut self, status: impl IntoIterator<Item = DeliveryStatus>) -> Self {
        self.status = status.into_iter().collect();
        self
    }
}

impl ResourceFilter<OutboxEntry> for OutboxFilters {
    fn query_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        params.push_opt("search", self.search.as_deref());
        params.push_list("channel", &self.channel);
        params.push_list("status", &self.status);
        self.page.write(&mut params);
        SortSpec::write(self.sort.as_ref(), &mut params);
        params
    }

    fn matches(&self, entry: &OutboxEntry) -> bool {
        text_matches(
            self.search.as_deref(),
            &[entry.subject.as_str(), entry.recipient.as_str()],
        ) && facet_matches(&self.channel, &entry.channel)
            && facet_matches(&self.status, &entry.status)
    }

    fn page(&self) -> PageRequest {
        self.page
    }

    fn sort(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }
}

/// Manually enqueued notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOutboxEntryInput {
    /// Channel
    pub channel: DeliveryChannel,
    /// Recipient
    pub recipient: String,
    /// Subject line
    pub subject: String,
    /// Message body
    pub body: String,
}

/// Wire payload for `POST /notification-outbox`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOutboxEntryPayload {
    /// Channel
    pub channel: DeliveryChannel,
    /// Recipient
    pub recipient: String,
    /// Subject line
    pub subject: String,
    /// Message body
    pub body: String,
}

impl Validate for CreateOutboxEntryInput {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("recipient", &self.recipient, 320)?;
        require_text("subject", &self.subject, 200)?;
        if self.channel == DeliveryChannel::Email && !self.recipient.contains('@') {
            return Err(ValidationError::new("recipient", "must be an email address"));
        }
        Ok(())
    }
}

impl Envelope for CreateOutboxEntryInput {
    type Wire = CreateOutboxEntryPayload;

    fn to_wire(&self) -> Self::Wire {
        CreateOutboxEntryPayload {
            channel: self.channel,
            recipient: self.recipient.trim().to_string(),
            subject: self.subject.trim().to_string(),
            body: self.body.clone(),
        }
    }
}

/// Status change for an entry; only cancellation is user-initiated
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutboxEntryInput {
    /// New state
    pub status: Option<DeliveryStatus>,
}

/// Wire payload for `PUT /notification-outbox/{id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateOutboxEntryPayload {
    /// New state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DeliveryStatus>,
}

impl Validate for UpdateOutboxEntryInput {
    fn validate(&self) -> Result<(), ValidationError> {
        match self.status {
            None | Some(DeliveryStatus::Cancelled) => Ok(()),
            Some(other) => Err(ValidationError::new(
                "status",
                format!("can not be set to {other} manually"),
            )),
        }
    }
}

impl Envelope for UpdateOutboxEntryInput {
    type Wire = UpdateOutboxEntryPayload;

    fn to_wire(&self) -> Self::Wire {
        UpdateOutboxEntryPayload {
            status: self.status,
        }
    }
}

/// Marker for the notification outbox resource
#[derive(Debug, Clone, Copy)]
pub struct NotificationOutbox;

impl Resource for NotificationOutbox {
    const NAMESPACE: &'static str = "notification-outbox";
    const LABEL: &'static str = "Notification";
    const READ: Permission = Permission::NotificationsRead;
    const WRITE: Permission = Permission::NotificationsWrite;

    type Record = OutboxEntry;
    type Filters = OutboxFilters;
    type Create = CreateOutboxEntryInput;
    type Update = UpdateOutboxEntryInput;

    fn id(record: &OutboxEntry) -> &str {
        &record.id
    }

    fn sort_key(record: &OutboxEntry, field: &str) -> Option<SortKey> {
        match field {
            "created_at" => Some(SortKey::Time(record.created_at)),
            "attempts" => Some(SortKey::Number(f64::from(record.attempts))),
            "subject" => Some(SortKey::Text(record.subject.clone())),
            _ => None,
        }
    }
}
