//! The per-resource contract
//!
//! A [`Resource`] is a zero-sized marker tying together everything the data
//! layer needs to know about one backend entity type: where it lives, who may
//! read and write it, what its filter looks like and how its create/update
//! envelopes are converted to wire payloads.

use crate::error::ValidationError;
use crate::permission::Permission;
use crate::query::{ResourceFilter, SortKey};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// Local checks run before any network call
pub trait Validate {
    /// Reject the input with a field-level error
    ///
    /// # Errors
    /// Returns the first failing field.
    fn validate(&self) -> Result<(), ValidationError>;
}

/// A client-side mutation input with a distinct wire shape
///
/// Inputs use the field names the dashboard forms produce (camelCase); the
/// wire payload uses the backend's snake_case names.
pub trait Envelope: Validate + Clone + Debug + Send + Sync + 'static {
    /// Payload sent to the server
    type Wire: Serialize + Send + Sync;

    /// Convert at the boundary
    fn to_wire(&self) -> Self::Wire;
}

/// A backend-owned entity type exposed via REST
pub trait Resource: Send + Sync + 'static {
    /// Path segment under `/api/v1`, e.g. `asset-groups`
    const NAMESPACE: &'static str;

    /// Singular, human-readable name used in notifications
    const LABEL: &'static str;

    /// Capability required to list or get
    const READ: Permission;

    /// Capability required to create, update or delete
    const WRITE: Permission;

    /// Read-side record
    type Record: Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Filter object for list queries
    type Filters: ResourceFilter<Self::Record>;

    /// Create envelope
    type Create: Envelope;

    /// Update envelope (every field optional)
    type Update: Envelope;

    /// Opaque record identifier
    fn id(record: &Self::Record) -> &str;

    /// Sortable projection of a field, by wire name
    fn sort_key(record: &Self::Record, field: &str) -> Option<SortKey> {
        let _ = (record, field);
        None
    }
}
