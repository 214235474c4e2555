//! Asset group fixtures

use super::days_ago;
use crate::repository::MockResource;
use chrono::{DateTime, Utc};
use ctem_model::{
    AssetGroup, AssetGroups, CreateAssetGroupInput, Criticality, Environment, UpdateAssetGroupInput,
};

#[allow(clippy::too_many_arguments)]
fn group(
    id: &str,
    name: &str,
    description: &str,
    environment: Environment,
    criticality: Criticality,
    business_unit: &str,
    counts: (u32, u32),
    risk_score: f64,
    age_days: i64,
) -> AssetGroup {
    AssetGroup {
        id: id.to_string(),
        name: name.to_string(),
        description: Some(description.to_string()),
        environment,
        criticality,
        business_unit: Some(business_unit.to_string()),
        owner: Some(format!("{}-team", business_unit.to_lowercase().replace(' ', "-"))),
        tags: vec![environment.as_str().to_string()],
        asset_count: counts.0,
        exposure_count: counts.1,
        risk_score,
        created_at: days_ago(age_days),
        updated_at: days_ago(age_days / 4),
    }
}

/// The nine seed groups
#[must_use]
pub fn asset_groups() -> Vec<AssetGroup> {
    use Criticality::{Critical, High, Low, Medium};
    use Environment::{Development, Production, Staging, Testing};

    vec![
        group(
            "ag-001",
            "Production - Core Banking",
            "Core banking ledger and transaction processing",
            Production,
            Critical,
            "Finance",
            (42, 17),
            87.5,
            180,
        ),
        group(
            "ag-002",
            "Web Frontend",
            "Public website servers and CDN edge nodes",
            Production,
            High,
            "Marketing",
            (18, 6),
            64.0,
            160,
        ),
        group(
            "ag-003",
            "Payment Gateway",
            "Card processing and payment APIs",
            Production,
            Critical,
            "Finance",
            (12, 9),
            91.2,
            150,
        ),
        group(
            "ag-004",
            "Staging - API Services",
            "Pre-release REST and GraphQL services",
            Staging,
            Medium,
            "Engineering",
            (25, 4),
            42.3,
            120,
        ),
        group(
            "ag-005",
            "Development - Internal Tools",
            "Developer tooling, CI runners and artifact storage",
            Development,
            Low,
            "Engineering",
            (31, 2),
            18.7,
            100,
        ),
        group(
            "ag-006",
            "Customer Portal",
            "Self-service account management portal",
            Production,
            High,
            "Customer Success",
            (15, 5),
            58.9,
            90,
        ),
        group(
            "ag-007",
            "Testing - QA Environment",
            "Automated regression and load test hosts",
            Testing,
            Low,
            "Quality",
            (20, 1),
            12.4,
            60,
        ),
        group(
            "ag-008",
            "Data Warehouse",
            "Analytics cluster and reporting databases",
            Production,
            High,
            "Analytics",
            (8, 3),
            71.6,
            45,
        ),
        group(
            "ag-009",
            "Staging - Mobile Backend",
            "Pre-release push notification and sync services",
            Staging,
            Medium,
            "Mobile",
            (10, 2),
            35.0,
            30,
        ),
    ]
}

impl MockResource for AssetGroups {
    const ID_PREFIX: &'static str = "ag";

    fn fixtures() -> Vec<AssetGroup> {
        asset_groups()
    }

    fn from_create(id: String, input: &CreateAssetGroupInput, now: DateTime<Utc>) -> AssetGroup {
        AssetGroup {
            id,
            name: input.name.trim().to_string(),
            description: input.description.clone(),
            environment: input.environment,
            criticality: input.criticality,
            business_unit: input.business_unit.clone(),
            owner: input.owner.clone(),
            tags: input.tags.clone(),
            asset_count: u32::try_from(input.asset_ids.len()).unwrap_or(u32::MAX),
            exposure_count: 0,
            risk_score: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_update(group: &mut AssetGroup, input: &UpdateAssetGroupInput, now: DateTime<Utc>) {
        if let Some(name) = &input.name {
            group.name = name.trim().to_string();
        }
        if let Some(description) = &input.description {
            group.description = Some(description.clone());
        }
        if let Some(environment) = input.environment {
            group.environment = environment;
        }
        if let Some(criticality) = input.criticality {
            group.criticality = criticality;
        }
        if let Some(business_unit) = &input.business_unit {
            group.business_unit = Some(business_unit.clone());
        }
        if let Some(owner) = &input.owner {
            group.owner = Some(owner.clone());
        }
        if let Some(tags) = &input.tags {
            group.tags = tags.clone();
        }
        group.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique() {
        let groups = asset_groups();
        let ids: HashSet<_> = groups.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids.len(), groups.len());
    }

    #[test]
    fn only_core_banking_mentions_banking() {
        let hits: Vec<_> = asset_groups()
            .into_iter()
            .filter(|g| {
                let text = format!("{} {}", g.name, g.description.as_deref().unwrap_or_default());
                text.to_lowercase().contains("bank")
            })
            .collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].business_unit.as_deref(), Some("Finance"));
    }
}
