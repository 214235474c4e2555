//! Fixture data for mock mode
//!
//! Each submodule holds one resource's seed records and its
//! [`MockResource`](crate::repository::MockResource) implementation.

pub mod agents;
pub mod asset_groups;
pub mod exposures;
pub mod outbox;
pub mod scan_profiles;
pub mod workflows;

pub use agents::agents;
pub use asset_groups::asset_groups;
pub use exposures::exposures;
pub use outbox::outbox_entries;
pub use scan_profiles::scan_profiles;
pub use workflows::workflows;

use chrono::{DateTime, Utc};

// 2024-06-01T00:00:00Z
const REFERENCE_TIME: i64 = 1_717_200_000;

/// Fixed fixture timestamp, `days` before the reference date
pub(crate) fn days_ago(days: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(REFERENCE_TIME - days * 86_400, 0).unwrap_or_default()
}
