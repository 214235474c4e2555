//! Scan profiles

use crate::error::{optional_text, require_text, ValidationError};
use crate::permission::Permission;
use crate::query::{
    facet_matches, text_matches, PageRequest, QueryParams, ResourceFilter, SortKey, SortSpec,
};
use crate::resource::{Envelope, Resource, Validate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of scan a profile runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    /// Asset discovery
    Discovery,
    /// Vulnerability assessment
    Vulnerability,
    /// Compliance benchmark
    Compliance,
    /// Configuration audit
    Configuration,
}

impl ScanType {
    /// Wire form
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::Vulnerability => "vulnerability",
            Self::Compliance => "compliance",
            Self::Configuration => "configuration",
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scan profile record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanProfile {
    /// Opaque identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Description
    pub description: Option<String>,
    /// Scan kind
    pub scan_type: ScanType,
    /// CIDRs, hostnames or asset group ids
    pub targets: Vec<String>,
    /// Cron expression; `None` means on-demand only
    pub schedule: Option<String>,
    /// Whether scheduled runs fire
    pub enabled: bool,
    /// Last completed run
    pub last_run_at: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Filter object for `GET /scan-profiles`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanProfileFilters {
    /// Substring of name or description
    pub search: Option<String>,
    /// Any of these kinds
    pub scan_type: Vec<ScanType>,
    /// Enabled state
    pub enabled: Option<bool>,
    /// Page selection
    pub page: PageRequest,
    /// Ordering
    pub sort: Option<SortSpec>,
}

impl ResourceFilter<ScanProfile> for ScanProfileFilters {
    fn query_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        params.push_opt("search", self.search.as_deref());
        params.push_list("scan_type", &self.scan_type);
        params.push_opt("enabled", self.enabled);
        self.page.write(&mut params);
        SortSpec::write(self.sort.as_ref(), &mut params);
        params
    }

    fn matches(&self, profile: &ScanProfile) -> bool {
        text_matches(
            self.search.as_deref(),
            &[
                profile.name.as_str(),
                profile.description.as_deref().unwrap_or_default(),
            ],
        ) && facet_matches(&self.scan_type, &profile.scan_type)
            && self.enabled.map_or(true, |e| e == profile.enabled)
    }

    fn page(&self) -> PageRequest {
        self.page
    }

    fn sort(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }
}

/// Create form input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScanProfileInput {
    /// Display name
    pub name: String,
    /// Description
    pub description: Option<String>,
    /// Scan kind
    pub scan_type: ScanType,
    /// Targets
    pub targets: Vec<String>,
    /// Cron expression
    pub schedule: Option<String>,
    /// Start enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Wire payload for `POST /scan-profiles`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateScanProfilePayload {
    /// Display name
    pub name: String,
    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Scan kind
    pub scan_type: ScanType,
    /// Targets
    pub targets: Vec<String>,
    /// Cron expression
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    /// Start enabled
    pub enabled: bool,
}

impl Validate for CreateScanProfileInput {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name, 100)?;
        optional_text("description", self.description.as_deref(), 500)?;
        if self.targets.iter().all(|t| t.trim().is_empty()) {
            return Err(ValidationError::new("targets", "at least one target is required"));
        }
        optional_text("schedule", self.schedule.as_deref(), 100)
    }
}

impl Envelope for CreateScanProfileInput {
    type Wire = CreateScanProfilePayload;

    fn to_wire(&self) -> Self::Wire {
        CreateScanProfilePayload {
            name: self.name.trim().to_string(),
            description: self.description.clone(),
            scan_type: self.scan_type,
            targets: self
                .targets
                .iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            schedule: self.schedule.clone(),
            enabled: self.enabled,
        }
    }
}

/// Edit form input
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateScanProfileInput {
    /// New name
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
    /// Replacement targets
    pub targets: Option<Vec<String>>,
    /// New schedule
    pub schedule: Option<String>,
    /// Enable or disable
    pub enabled: Option<bool>,
}

/// Wire payload for `PUT /scan-profiles/{id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateScanProfilePayload {
    /// New name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Replacement targets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<String>>,
    /// New schedule
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    /// Enable or disable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl Validate for UpdateScanProfileInput {
    fn validate(&self) -> Result<(), ValidationError> {
        optional_text("name", self.name.as_deref(), 100)?;
        if let Some(targets) = &self.targets {
            if targets.iter().all(|t| t.trim().is_empty()) {
                return Err(ValidationError::new("targets", "at least one target is required"));
            }
        }
        Ok(())
    }
}

impl Envelope for UpdateScanProfileInput {
    type Wire = UpdateScanProfilePayload;

    fn to_wire(&self) -> Self::Wire {
        UpdateScanProfilePayload {
            name: self.name.as_ref().map(|n| n.trim().to_string()),
            description: self.description.clone(),
            targets: self.targets.clone(),
            schedule: self.schedule.clone(),
            enabled: self.enabled,
        }
    }
}

/// Marker for the scan profile resource
#[derive(Debug, Clone, Copy)]
pub struct ScanProfiles;

impl Resource for ScanProfiles {
    const NAMESPACE: &'static str = "scan-profiles";
    const LABEL: &'static str = "Scan profile";
    const READ: Permission = Permission::ScanProfilesRead;
    const WRITE: Permission = Permission::ScanProfilesWrite;

    type Record = ScanProfile;
    type Filters = ScanProfileFilters;
    type Create = CreateScanProfileInput;
    type Update = UpdateScanProfileInput;

    fn id(record: &ScanProfile) -> &str {
        &record.id
    }

    fn sort_key(record: &ScanProfile, field: &str) -> Option<SortKey> {
        match field {
            "name" => Some(SortKey::Text(record.name.clone())),
            "created_at" => Some(SortKey::Time(record.created_at)),
            _ => None,
        }
    }
}
