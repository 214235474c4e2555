//! Exposure events

use crate::error::{optional_text, require_text, ValidationError};
use crate::permission::Permission;
use crate::query::{
    facet_matches, text_matches, NumericRange, PageRequest, QueryParams, ResourceFilter, SortKey,
    SortSpec,
};
use crate::resource::{Envelope, Resource, Validate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Finding severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Critical
    Critical,
    /// High
    High,
    /// Medium
    Medium,
    /// Low
    Low,
    /// Informational
    Info,
}

impl Severity {
    /// Wire form
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Triage state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureStatus {
    /// Newly detected
    Open,
    /// Being remediated
    InProgress,
    /// Fixed
    Resolved,
    /// Risk accepted
    Accepted,
    /// Not a real exposure
    FalsePositive,
}

impl ExposureStatus {
    /// Wire form
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Accepted => "accepted",
            Self::FalsePositive => "false_positive",
        }
    }
}

impl fmt::Display for ExposureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected exposure on an asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureEvent {
    /// Opaque identifier
    pub id: String,
    /// Short title
    pub title: String,
    /// Details
    pub description: Option<String>,
    /// Severity
    pub severity: Severity,
    /// Triage state
    pub status: ExposureStatus,
    /// Affected asset
    pub asset_id: String,
    /// Affected asset's display name
    pub asset_name: String,
    /// Group the asset belongs to, if any
    pub asset_group_id: Option<String>,
    /// Detecting scanner or feed
    pub source: String,
    /// CVSS base score, when the finding maps to a CVE
    pub cvss_score: Option<f64>,
    /// Contextual risk score 0-100 (server-computed)
    pub risk_score: f64,
    /// First detection
    pub first_seen: DateTime<Utc>,
    /// Most recent detection
    pub last_seen: DateTime<Utc>,
}

/// Filter object for `GET /exposures`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExposureFilters {
    /// Substring of title or asset name
    pub search: Option<String>,
    /// Any of these severities
    pub severity: Vec<Severity>,
    /// Any of these states
    pub status: Vec<ExposureStatus>,
    /// Restrict to one asset group
    pub asset_group_id: Option<String>,
    /// Risk score bounds
    pub risk_score: NumericRange,
    /// Page selection
    pub page: PageRequest,
    /// Ordering
    pub sort: Option<SortSpec>,
}

impl ExposureFilters {
    /// With search text
    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// With severity facet
    #[must_use]
    pub fn with_severity(mut self, severity: impl IntoIterator<Item = Severity>) -> Self {
        self.severity = severity.into_iter().collect();
        self
    }

    /// With status facet
    #[must_use]
    pub fn with_status(mut self, status: impl IntoIterator<Item = ExposureStatus>) -> Self {
        self.status = status.into_iter().collect();
        self
    }

    /// Restrict to an asset group
    #[must_use]
    pub fn in_group(mut self, asset_group_id: impl Into<String>) -> Self {
        self.asset_group_id = Some(asset_group_id.into());
        self
    }
}

impl ResourceFilter<ExposureEvent> for ExposureFilters {
    fn query_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        params.push_opt("search", self.search.as_deref());
        params.push_list("severity", &self.severity);
        params.push_list("status", &self.status);
        params.push_opt("asset_group_id", self.asset_group_id.as_deref());
        self.risk_score.write("risk_score", &mut params);
        self.page.write(&mut params);
        SortSpec::write(self.sort.as_ref(), &mut params);
        params
    }

    fn matches(&self, event: &ExposureEvent) -> bool {
        let group_ok = match &self.asset_group_id {
            Some(id) => event.asset_group_id.as_deref() == Some(id.as_str()),
            None => true,
        };
        group_ok
            && text_matches(
                self.search.as_deref(),
                &[event.title.as_str(), event.asset_name.as_str()],
            )
            && facet_matches(&self.severity, &event.severity)
            && facet_matches(&self.status, &event.status)
            && self.risk_score.contains(event.risk_score)
    }

    fn page(&self) -> PageRequest {
        self.page
    }

    fn sort(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }
}

/// Manual exposure report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExposureInput {
    /// Short title
    pub title: String,
    /// Details
    pub description: Option<String>,
    /// Severity
    pub severity: Severity,
    /// Affected asset
    pub asset_id: String,
    /// Reporting source
    pub source: String,
}

/// Wire payload for `POST /exposures`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateExposurePayload {
    /// Short title
    pub title: String,
    /// Details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Severity
    pub severity: Severity,
    /// Affected asset
    pub asset_id: String,
    /// Reporting source
    pub source: String,
}

impl Validate for CreateExposureInput {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title, 200)?;
        require_text("assetId", &self.asset_id, 64)?;
        require_text("source", &self.source, 64)
    }
}

impl Envelope for CreateExposureInput {
    type Wire = CreateExposurePayload;

    fn to_wire(&self) -> Self::Wire {
        CreateExposurePayload {
            title: self.title.trim().to_string(),
            description: self.description.clone(),
            severity: self.severity,
            asset_id: self.asset_id.clone(),
            source: self.source.clone(),
        }
    }
}

/// Triage update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExposureInput {
    /// New state
    pub status: Option<ExposureStatus>,
    /// Re-graded severity
    pub severity: Option<Severity>,
    /// Triage note
    pub resolution_note: Option<String>,
}

/// Wire payload for `PUT /exposures/{id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateExposurePayload {
    /// New state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ExposureStatus>,
    /// Re-graded severity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// Triage note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_note: Option<String>,
}

impl Validate for UpdateExposureInput {
    fn validate(&self) -> Result<(), ValidationError> {
        optional_text("resolutionNote", self.resolution_note.as_deref(), 1000)
    }
}

impl Envelope for UpdateExposureInput {
    type Wire = UpdateExposurePayload;

    fn to_wire(&self) -> Self::Wire {
        UpdateExposurePayload {
            status: self.status,
            severity: self.severity,
            resolution_note: self.resolution_note.clone(),
        }
    }
}

/// Marker for the exposure resource
#[derive(Debug, Clone, Copy)]
pub struct Exposures;

impl Resource for Exposures {
    const NAMESPACE: &'static str = "exposures";
    const LABEL: &'static str = "Exposure";
    const READ: Permission = Permission::ExposuresRead;
    const WRITE: Permission = Permission::ExposuresWrite;

    type Record = ExposureEvent;
    type Filters = ExposureFilters;
    type Create = CreateExposureInput;
    type Update = UpdateExposureInput;

    fn id(record: &ExposureEvent) -> &str {
        &record.id
    }

    fn sort_key(record: &ExposureEvent, field: &str) -> Option<SortKey> {
        match field {
            "title" => Some(SortKey::Text(record.title.clone())),
            "risk_score" => Some(SortKey::Number(record.risk_score)),
            "first_seen" => Some(SortKey::Time(record.first_seen)),
            "last_seen" => Some(SortKey::Time(record.last_seen)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_form_is_snake_case() {
        let json = serde_json::to_string(&ExposureStatus::FalsePositive).unwrap();
        assert_eq!(json, "\"false_positive\"");
        assert_eq!(ExposureStatus::InProgress.to_string(), "in_progress");
    }

    #[test]
    fn filters_serialize_group_and_facets() {
        let params = ExposureFilters::default()
            .with_severity([Severity::Critical, Severity::High])
            .with_status([ExposureStatus::Open])
            .in_group("ag-001")
            .query_params();
        assert_eq!(params.get("severity"), Some("critical,high"));
        assert_eq!(params.get("status"), Some("open"));
        assert_eq!(params.get("asset_group_id"), Some("ag-001"));
    }

    #[test]
    fn update_envelope_converts_note() {
        let input: UpdateExposureInput =
            serde_json::from_str(r#"{"status":"resolved","resolutionNote":"patched"}"#).unwrap();
        let wire = serde_json::to_value(input.to_wire()).unwrap();
        assert_eq!(
            wire,
            serde_json::json!({ "status": "resolved", "resolution_note": "patched" })
        );
    }

    #[test]
    fn create_requires_asset() {
        let input = CreateExposureInput {
            title: "Open SMB share".into(),
            description: None,
            severity: Severity::High,
            asset_id: String::new(),
            source: "manual".into(),
        };
        assert_eq!(input.validate().unwrap_err().field, "assetId");
    }
}
