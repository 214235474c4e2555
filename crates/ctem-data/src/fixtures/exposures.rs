//! Exposure fixtures

use super::days_ago;
use crate::repository::MockResource;
use chrono::{DateTime, Utc};
use ctem_model::{
    CreateExposureInput, ExposureEvent, ExposureStatus, Exposures, Severity, UpdateExposureInput,
};

struct Seed<'a> {
    id: &'a str,
    title: &'a str,
    severity: Severity,
    status: ExposureStatus,
    asset: (&'a str, &'a str),
    group: &'a str,
    source: &'a str,
    cvss: Option<f64>,
    risk: f64,
    first_seen: i64,
}

impl Seed<'_> {
    fn build(self) -> ExposureEvent {
        ExposureEvent {
            id: self.id.to_string(),
            title: self.title.to_string(),
            description: None,
            severity: self.severity,
            status: self.status,
            asset_id: self.asset.0.to_string(),
            asset_name: self.asset.1.to_string(),
            asset_group_id: Some(self.group.to_string()),
            source: self.source.to_string(),
            cvss_score: self.cvss,
            risk_score: self.risk,
            first_seen: days_ago(self.first_seen),
            last_seen: days_ago(1),
        }
    }
}

/// Seed exposures spread over the asset group fixtures
#[must_use]
pub fn exposures() -> Vec<ExposureEvent> {
    [
        Seed {
            id: "exp-001",
            title: "OpenSSL buffer overflow (CVE-2022-3602)",
            severity: Severity::Critical,
            status: ExposureStatus::Open,
            asset: ("asset-101", "core-ledger-01"),
            group: "ag-001",
            source: "vulnerability-scan",
            cvss: Some(9.8),
            risk: 94.0,
            first_seen: 21,
        },
        Seed {
            id: "exp-002",
            title: "TLS 1.0 enabled on public listener",
            severity: Severity::Medium,
            status: ExposureStatus::InProgress,
            asset: ("asset-204", "web-edge-03"),
            group: "ag-002",
            source: "configuration-scan",
            cvss: Some(5.3),
            risk: 48.5,
            first_seen: 40,
        },
        Seed {
            id: "exp-003",
            title: "Default admin credentials on payment console",
            severity: Severity::High,
            status: ExposureStatus::Open,
            asset: ("asset-310", "pay-console-01"),
            group: "ag-003",
            source: "pentest",
            cvss: None,
            risk: 82.0,
            first_seen: 9,
        },
        Seed {
            id: "exp-004",
            title: "Outdated Log4j dependency",
            severity: Severity::Critical,
            status: ExposureStatus::Resolved,
            asset: ("asset-412", "api-staging-02"),
            group: "ag-004",
            source: "sca",
            cvss: Some(10.0),
            risk: 20.0,
            first_seen: 120,
        },
        Seed {
            id: "exp-005",
            title: "Unauthenticated metrics endpoint",
            severity: Severity::Low,
            status: ExposureStatus::Accepted,
            asset: ("asset-507", "ci-runner-07"),
            group: "ag-005",
            source: "attack-surface",
            cvss: Some(3.1),
            risk: 15.0,
            first_seen: 60,
        },
        Seed {
            id: "exp-006",
            title: "Open S3 bucket listing",
            severity: Severity::High,
            status: ExposureStatus::FalsePositive,
            asset: ("asset-802", "dw-export-bucket"),
            group: "ag-008",
            source: "cloud-posture",
            cvss: None,
            risk: 5.0,
            first_seen: 14,
        },
    ]
    .into_iter()
    .map(Seed::build)
    .collect()
}

impl MockResource for Exposures {
    const ID_PREFIX: &'static str = "exp";

    fn fixtures() -> Vec<ExposureEvent> {
        exposures()
    }

    fn from_create(id: String, input: &CreateExposureInput, now: DateTime<Utc>) -> ExposureEvent {
        ExposureEvent {
            id,
            title: input.title.trim().to_string(),
            description: input.description.clone(),
            severity: input.severity,
            status: ExposureStatus::Open,
            asset_id: input.asset_id.clone(),
            asset_name: input.asset_id.clone(),
            asset_group_id: None,
            source: input.source.clone(),
            cvss_score: None,
            risk_score: 0.0,
            first_seen: now,
            last_seen: now,
        }
    }

    fn apply_update(exposure: &mut ExposureEvent, input: &UpdateExposureInput, now: DateTime<Utc>) {
        if let Some(status) = input.status {
            exposure.status = status;
        }
        if let Some(severity) = input.severity {
            exposure.severity = severity;
        }
        exposure.last_seen = now;
    }
}
