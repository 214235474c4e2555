//! CTEM Model - records, filters and envelopes
//!
//! Plain data transfer objects mirroring the backend's resources. The client
//! holds no authoritative state: every record here is a projection of what the
//! server last returned.
//!
//! # Resources
//!
//! | Marker | Namespace | Record |
//! |---|---|---|
//! | [`AssetGroups`] | `asset-groups` | [`AssetGroup`] |
//! | [`Exposures`] | `exposures` | [`ExposureEvent`] |
//! | [`ScanProfiles`] | `scan-profiles` | [`ScanProfile`] |
//! | [`NotificationOutbox`] | `notification-outbox` | [`OutboxEntry`] |
//! | [`Workflows`] | `workflows` | [`Workflow`] |
//! | [`Agents`] | `agents` | [`Agent`] |
//!
//! Each marker implements [`Resource`], which ties a record type to its
//! filter object and its create/update envelopes.
//!
//! # Example
//!
//! ```rust
//! use ctem_model::{AssetGroupFilters, AssetGroups, Resource, ResourceFilter};
//!
//! let filters = AssetGroupFilters::default().with_search("banking");
//! let params = filters.query_params();
//! assert_eq!(params.get("search"), Some("banking"));
//! assert_eq!(AssetGroups::NAMESPACE, "asset-groups");
//! ```

#![warn(unreachable_pub)]

pub mod agent;
pub mod asset_group;
pub mod error;
pub mod exposure;
pub mod license;
pub mod outbox;
pub mod permission;
pub mod query;
pub mod resource;
pub mod scan_profile;
pub mod session;
pub mod workflow;

pub use agent::{Agent, AgentFilters, AgentStatus, Agents, RegisterAgentInput, UpdateAgentInput};
pub use asset_group::{
    AssetGroup, AssetGroupFilters, AssetGroups, AssetMembershipPayload, BulkDeletePayload,
    BulkOutcome, BulkUpdatePayload, CreateAssetGroupInput, Criticality, Environment,
    UpdateAssetGroupInput,
};
pub use error::ValidationError;
pub use exposure::{
    CreateExposureInput, ExposureEvent, ExposureFilters, ExposureStatus, Exposures, Severity,
    UpdateExposureInput,
};
pub use license::{LicenseCategory, LicenseEntry, LicenseRiskSummary};
pub use outbox::{
    CreateOutboxEntryInput, DeliveryChannel, DeliveryStatus, NotificationOutbox, OutboxEntry,
    OutboxFilters, UpdateOutboxEntryInput,
};
pub use permission::{Permission, PermissionSet};
pub use query::{
    ListResponse, NumericRange, PageRequest, QueryParams, ResourceFilter, SortDirection, SortKey,
    SortSpec,
};
pub use resource::{Envelope, Resource, Validate};
pub use scan_profile::{
    CreateScanProfileInput, ScanProfile, ScanProfileFilters, ScanProfiles, ScanType,
    UpdateScanProfileInput,
};
pub use session::{Session, TenantId};
pub use workflow::{
    CreateWorkflowInput, UpdateWorkflowInput, Workflow, WorkflowFilters, WorkflowStatus,
    WorkflowTrigger, Workflows,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with CTEM records
    pub use crate::permission::{Permission, PermissionSet};
    pub use crate::query::{ListResponse, QueryParams, ResourceFilter, SortDirection, SortSpec};
    pub use crate::resource::{Envelope, Resource, Validate};
    pub use crate::session::{Session, TenantId};
}
