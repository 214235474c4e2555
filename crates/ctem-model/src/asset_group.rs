//! Asset groups
//!
//! Named collections of assets scoped to an environment and criticality.
//! Counts and the risk score are computed by the server.

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

const NAME_MAX: usize = 100;
const DESCRIPTION_MAX: usize = 500;

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Production
    Production,
    /// Staging
    Staging,
    /// Development
    Development,
    /// Testing / QA
    Testing,
}

impl Environment {
    /// Wire form
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Staging => "staging",
            Self::Development => "development",
            Self::Testing => "testing",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business criticality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
    /// Critical
    Critical,
    /// High
    High,
    /// Medium
    Medium,
    /// Low
    Low,
}

impl Criticality {
    /// Wire form
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Asset group record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetGroup {
    /// Opaque identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Free-form description
    pub description: Option<String>,
    /// Environment
    pub environment: Environment,
    /// Business criticality
    pub criticality: Criticality,
    /// Owning business unit
    pub business_unit: Option<String>,
    /// Owner (user or team)
    pub owner: Option<String>,
    /// Tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Member asset count (server-computed)
    pub asset_count: u32,
    /// Open exposure count (server-computed)
    pub exposure_count: u32,
    /// Risk score 0-100 (server-computed)
    pub risk_score: f64,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

/// Filter object for `GET /asset-groups`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetGroupFilters {
    /// Substring of name or description
    pub search: Option<String>,
    /// Any of these environments
    pub environment: Vec<Environment>,
    /// Any of these criticalities
    pub criticality: Vec<Criticality>,
    /// Risk score bounds
    pub risk_score: NumericRange,
    /// Page selection
    pub page: PageRequest,
    /// Ordering
    pub sort: Option<SortSpec>,
}

impl AssetGroupFilters {
    /// With search text
    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// With environment facet
    #[must_use]
    pub fn with_environment(mut self, environment: impl IntoIterator<Item = Environment>) -> Self {
        self.environment = environment.into_iter().collect();
        self
    }

    /// With criticality facet
    #[must_use]
    pub fn with_criticality(mut self, criticality: impl IntoIterator<Item = Criticality>) -> Self {
        self.criticality = criticality.into_iter().collect();
        self
    }

    /// With risk score bounds
    #[must_use]
    pub fn with_risk_score(mut self, range: NumericRange) -> Self {
        self.risk_score = range;
        self
    }

    /// With page selection
    #[must_use]
    pub fn with_page(mut self, page: u32, per_page: u32) -> Self {
        self.page = PageRequest::new(page, per_page);
        self
    }

    /// With ordering
    #[must_use]
    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }
}

impl ResourceFilter<AssetGroup> for AssetGroupFilters {
    fn query_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        params.push_opt("search", self.search.as_deref());
        params.push_list("environment", &self.environment);
        params.push_list("criticality", &self.criticality);
        self.risk_score.write("risk_score", &mut params);
        self.page.write(&mut params);
        SortSpec::write(self.sort.as_ref(), &mut params);
        params
    }

    fn matches(&self, group: &AssetGroup) -> bool {
        text_matches(
            self.search.as_deref(),
            &[group.name.as_str(), group.description.as_deref().unwrap_or_default()],
        ) && facet_matches(&self.environment, &group.environment)
            && facet_matches(&self.criticality, &group.criticality)
            && self.risk_score.contains(group.risk_score)
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
pub struct CreateAssetGroupInput {
    /// Display name
    pub name: String,
    /// Description
    pub description: Option<String>,
    /// Environment
    pub environment: Environment,
    /// Criticality
    pub criticality: Criticality,
    /// Business unit
    pub business_unit: Option<String>,
    /// Owner
    pub owner: Option<String>,
    /// Tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Assets to add on creation
    #[serde(default)]
    pub asset_ids: Vec<String>,
}

impl CreateAssetGroupInput {
    /// Minimal input
    pub fn new(name: impl Into<String>, environment: Environment, criticality: Criticality) -> Self {
        Self {
            name: name.into(),
            description: None,
            environment,
            criticality,
            business_unit: None,
            owner: None,
            tags: Vec::new(),
            asset_ids: Vec::new(),
        }
    }
}

/// Wire payload for `POST /asset-groups`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateAssetGroupPayload {
    /// Display name
    pub name: String,
    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Environment
    pub environment: Environment,
    /// Criticality
    pub criticality: Criticality,
    /// Business unit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_unit: Option<String>,
    /// Owner
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Tags
    pub tags: Vec<String>,
    /// Initial members
    pub asset_ids: Vec<String>,
}

impl Validate for CreateAssetGroupInput {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name, NAME_MAX)?;
        optional_text("description", self.description.as_deref(), DESCRIPTION_MAX)
    }
}

impl Envelope for CreateAssetGroupInput {
    type Wire = CreateAssetGroupPayload;

    fn to_wire(&self) -> Self::Wire {
        CreateAssetGroupPayload {
            name: self.name.trim().to_string(),
            description: self.description.clone(),
            environment: self.environment,
            criticality: self.criticality,
            business_unit: self.business_unit.clone(),
            owner: self.owner.clone(),
            tags: self.tags.clone(),
            asset_ids: self.asset_ids.clone(),
        }
    }
}

/// Edit form input; absent fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAssetGroupInput {
    /// New name
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New environment
    pub environment: Option<Environment>,
    /// New criticality
    pub criticality: Option<Criticality>,
    /// New business unit
    pub business_unit: Option<String>,
    /// New owner
    pub owner: Option<String>,
    /// Replacement tag list
    pub tags: Option<Vec<String>>,
}

/// Wire payload for `PUT /asset-groups/{id}` and bulk updates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateAssetGroupPayload {
    /// New name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New environment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
    /// New criticality
    #[serde(skip_serializing_if = "Option::is_none")]
    pub criticality: Option<Criticality>,
    /// New business unit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_unit: Option<String>,
    /// New owner
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Replacement tag list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl Validate for UpdateAssetGroupInput {
    fn validate(&self) -> Result<(), ValidationError> {
        optional_text("name", self.name.as_deref(), NAME_MAX)?;
        optional_text("description", self.description.as_deref(), DESCRIPTION_MAX)
    }
}

impl Envelope for UpdateAssetGroupInput {
    type Wire = UpdateAssetGroupPayload;

    fn to_wire(&self) -> Self::Wire {
        UpdateAssetGroupPayload {
            name: self.name.as_ref().map(|n| n.trim().to_string()),
            description: self.description.clone(),
            environment: self.environment,
            criticality: self.criticality,
            business_unit: self.business_unit.clone(),
            owner: self.owner.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Body of `PATCH /asset-groups/bulk`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkUpdatePayload<U> {
    /// Target records
    pub ids: Vec<String>,
    /// Fields applied to every target
    pub updates: U,
}

/// Body of `POST /asset-groups/bulk-delete`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkDeletePayload {
    /// Target records
    pub ids: Vec<String>,
}

/// Reply to bulk update and bulk delete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOutcome {
    /// Records touched
    pub affected: u64,
}

/// Body of `POST|DELETE /asset-groups/{id}/assets`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMembershipPayload {
    /// Assets to add or remove
    pub asset_ids: Vec<String>,
}

/// Marker for the asset group resource
#[derive(Debug, Clone, Copy)]
pub struct AssetGroups;

impl Resource for AssetGroups {
    const NAMESPACE: &'static str = "asset-groups";
    const LABEL: &'static str = "Asset group";
    const READ: Permission = Permission::AssetGroupsRead;
    const WRITE: Permission = Permission::AssetGroupsWrite;

    type Record = AssetGroup;
    type Filters = AssetGroupFilters;
    type Create = CreateAssetGroupInput;
    type Update = UpdateAssetGroupInput;

    fn id(record: &AssetGroup) -> &str {
        &record.id
    }

    fn sort_key(record: &AssetGroup, field: &str) -> Option<SortKey> {
        match field {
            "name" => Some(SortKey::Text(record.name.clone())),
            "risk_score" => Some(SortKey::Number(record.risk_score)),
            "asset_count" => Some(SortKey::Number(f64::from(record.asset_count))),
            "exposure_count" => Some(SortKey::Number(f64::from(record.exposure_count))),
            "created_at" => Some(SortKey::Time(record.created_at)),
            "updated_at" => Some(SortKey::Time(record.updated_at)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn group(name: &str, env: Environment, risk: f64) -> AssetGroup {
        let now = Utc::now();
        AssetGroup {
            id: "ag-1".into(),
            name: name.into(),
            description: None,
            environment: env,
            criticality: Criticality::High,
            business_unit: None,
            owner: None,
            tags: vec![],
            asset_count: 0,
            exposure_count: 0,
            risk_score: risk,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn filters_serialize_present_fields_only() {
        let filters = AssetGroupFilters::default()
            .with_environment([Environment::Production, Environment::Staging])
            .with_risk_score(NumericRange {
                min: Some(50.0),
                max: None,
            });
        let params = filters.query_params();
        assert_eq!(params.get("environment"), Some("production,staging"));
        assert_eq!(params.get("risk_score_min"), Some("50"));
        assert_eq!(params.get("risk_score_max"), None);
        assert_eq!(params.get("search"), None);
    }

    #[test]
    fn filters_match_all_predicates() {
        let filters = AssetGroupFilters::default()
            .with_search("core")
            .with_environment([Environment::Production])
            .with_risk_score(NumericRange::between(80.0, 90.0));

        assert!(filters.matches(&group("Production - Core Banking", Environment::Production, 87.5)));
        assert!(!filters.matches(&group("Production - Core Banking", Environment::Staging, 87.5)));
        assert!(!filters.matches(&group("Production - Core Banking", Environment::Production, 95.0)));
        assert!(!filters.matches(&group("Web Frontend", Environment::Production, 85.0)));
    }

    #[test]
    fn create_input_uses_camel_case() {
        let input: CreateAssetGroupInput = serde_json::from_str(
            r#"{"name":"Payments","environment":"production","criticality":"critical","businessUnit":"Finance","assetIds":["a1"]}"#,
        )
        .unwrap();
        assert_eq!(input.business_unit.as_deref(), Some("Finance"));

        let wire = serde_json::to_value(input.to_wire()).unwrap();
        assert_eq!(wire["business_unit"], "Finance");
        assert_eq!(wire["asset_ids"][0], "a1");
        assert!(wire.get("businessUnit").is_none());
        assert!(wire.get("owner").is_none());
    }

    #[test]
    fn create_input_requires_name() {
        let input = CreateAssetGroupInput::new("  ", Environment::Staging, Criticality::Low);
        assert_eq!(input.validate().unwrap_err().field, "name");
    }

    #[test]
    fn update_wire_omits_absent_fields() {
        let input = UpdateAssetGroupInput {
            criticality: Some(Criticality::Critical),
            ..Default::default()
        };
        let wire = serde_json::to_value(input.to_wire()).unwrap();
        assert_eq!(wire, serde_json::json!({ "criticality": "critical" }));
    }
}
