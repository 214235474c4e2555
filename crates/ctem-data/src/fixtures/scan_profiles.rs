//! Scan profile fixtures

use super::days_ago;
use crate::repository::MockResource;
use chrono::{DateTime, Utc};
use ctem_model::{
    CreateScanProfileInput, ScanProfile, ScanProfiles, ScanType, UpdateScanProfileInput,
};

fn profile(
    id: &str,
    name: &str,
    scan_type: ScanType,
    targets: &[&str],
    schedule: Option<&str>,
    enabled: bool,
    age_days: i64,
) -> ScanProfile {
    ScanProfile {
        id: id.to_string(),
        name: name.to_string(),
        description: None,
        scan_type,
        targets: targets.iter().map(ToString::to_string).collect(),
        schedule: schedule.map(ToString::to_string),
        enabled,
        last_run_at: enabled.then(|| days_ago(1)),
        created_at: days_ago(age_days),
    }
}

/// Seed scan profiles
#[must_use]
pub fn scan_profiles() -> Vec<ScanProfile> {
    vec![
        profile(
            "sp-001",
            "Weekly external discovery",
            ScanType::Discovery,
            &["203.0.113.0/24", "198.51.100.0/24"],
            Some("0 2 * * 0"),
            true,
            200,
        ),
        profile(
            "sp-002",
            "Nightly production vulnerability scan",
            ScanType::Vulnerability,
            &["ag-001", "ag-003"],
            Some("0 1 * * *"),
            true,
            150,
        ),
        profile(
            "sp-003",
            "PCI compliance audit",
            ScanType::Compliance,
            &["ag-001", "ag-003"],
            Some("0 3 1 * *"),
            true,
            90,
        ),
        profile(
            "sp-004",
            "Staging configuration drift",
            ScanType::Configuration,
            &["ag-004", "ag-009"],
            None,
            false,
            30,
        ),
    ]
}

impl MockResource for ScanProfiles {
    const ID_PREFIX: &'static str = "sp";

    fn fixtures() -> Vec<ScanProfile> {
        scan_profiles()
    }

    fn from_create(id: String, input: &CreateScanProfileInput, now: DateTime<Utc>) -> ScanProfile {
        ScanProfile {
            id,
            name: input.name.trim().to_string(),
            description: input.description.clone(),
            scan_type: input.scan_type,
            targets: input.targets.clone(),
            schedule: input.schedule.clone(),
            enabled: input.enabled,
            last_run_at: None,
            created_at: now,
        }
    }

    fn apply_update(profile: &mut ScanProfile, input: &UpdateScanProfileInput, _now: DateTime<Utc>) {
        if let Some(name) = &input.name {
            profile.name = name.trim().to_string();
        }
        if let Some(description) = &input.description {
            profile.description = Some(description.clone());
        }
        if let Some(targets) = &input.targets {
            profile.targets = targets.clone();
        }
        if let Some(schedule) = &input.schedule {
            profile.schedule = Some(schedule.clone());
        }
        if let Some(enabled) = input.enabled {
            profile.enabled = enabled;
        }
    }
}
