//! Notification outbox fixtures

use super::days_ago;
use crate::repository::MockResource;
use chrono::{DateTime, Utc};
use ctem_model::{
    CreateOutboxEntryInput, DeliveryChannel, DeliveryStatus, NotificationOutbox, OutboxEntry,
    UpdateOutboxEntryInput,
};

#[allow(clippy::too_many_arguments)]
fn entry(
    id: &str,
    channel: DeliveryChannel,
    recipient: &str,
    subject: &str,
    status: DeliveryStatus,
    attempts: u32,
    last_error: Option<&str>,
    age_days: i64,
) -> OutboxEntry {
    OutboxEntry {
        id: id.to_string(),
        channel,
        recipient: recipient.to_string(),
        subject: subject.to_string(),
        status,
        attempts,
        last_error: last_error.map(ToString::to_string),
        created_at: days_ago(age_days),
        sent_at: (status == DeliveryStatus::Sent).then(|| days_ago(age_days)),
    }
}

/// Seed outbox entries, one per delivery state plus a second failure
#[must_use]
pub fn outbox_entries() -> Vec<OutboxEntry> {
    use DeliveryChannel::{Email, Slack, Teams, Webhook};
    use DeliveryStatus::{Cancelled, Failed, Pending, Sent};

    vec![
        entry(
            "nt-001",
            Email,
            "secops@acme.example",
            "Critical exposure on core-ledger-01",
            Sent,
            1,
            None,
            5,
        ),
        entry(
            "nt-002",
            Slack,
            "#security-alerts",
            "Weekly exposure digest",
            Pending,
            0,
            None,
            1,
        ),
        entry(
            "nt-003",
            Webhook,
            "https://hooks.acme.example/ctem",
            "Scan completed: PCI compliance audit",
            Failed,
            3,
            Some("HTTP 502 from receiver"),
            2,
        ),
        entry(
            "nt-004",
            Teams,
            "Security Operations",
            "New high severity finding",
            Failed,
            5,
            Some("connection timed out"),
            3,
        ),
        entry(
            "nt-005",
            Email,
            "ciso@acme.example",
            "Monthly risk report",
            Cancelled,
            0,
            None,
            10,
        ),
    ]
}

impl MockResource for NotificationOutbox {
    const ID_PREFIX: &'static str = "nt";

    fn fixtures() -> Vec<OutboxEntry> {
        outbox_entries()
    }

    fn from_create(id: String, input: &CreateOutboxEntryInput, now: DateTime<Utc>) -> OutboxEntry {
        OutboxEntry {
            id,
            channel: input.channel,
            recipient: input.recipient.trim().to_string(),
            subject: input.subject.trim().to_string(),
            status: DeliveryStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: now,
            sent_at: None,
        }
    }

    fn apply_update(entry: &mut OutboxEntry, input: &UpdateOutboxEntryInput, _now: DateTime<Utc>) {
        if let Some(status) = input.status {
            entry.status = status;
        }
    }
}
