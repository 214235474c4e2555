//! License inventory aggregation
//!
//! Roll-up of dependency license counts into the three stat cards of the
//! licenses page. Per-license risk scoring stays on the server; this only
//! sums categories.

use serde::{Deserialize, Serialize};
use std::fmt;

/// License family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LicenseCategory {
    /// MIT, Apache-2.0, BSD
    Permissive,
    /// GPL, AGPL
    Copyleft,
    /// LGPL, MPL, EPL
    WeakCopyleft,
    /// Commercial terms
    Proprietary,
    /// Not identified
    Unknown,
}

impl LicenseCategory {
    /// Wire form
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Permissive => "permissive",
            Self::Copyleft => "copyleft",
            Self::WeakCopyleft => "weak-copyleft",
            Self::Proprietary => "proprietary",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the category counts toward the high risk card
    #[inline]
    #[must_use]
    pub fn is_high_risk(self) -> bool {
        matches!(self, Self::Copyleft | Self::WeakCopyleft)
    }
}

impl fmt::Display for LicenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the license inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseEntry {
    /// SPDX identifier or display name
    pub name: String,
    /// Family
    pub category: LicenseCategory,
    /// Components using this license
    pub count: u64,
}

/// Stat card totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRiskSummary {
    /// All components
    pub total: u64,
    /// Copyleft and weak copyleft
    pub high_risk: u64,
    /// Permissive
    pub low_risk: u64,
    /// Proprietary and unidentified
    pub review_needed: u64,
}

impl LicenseRiskSummary {
    /// Aggregate inventory rows
    #[must_use]
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a LicenseEntry>) -> Self {
        Self::from_counts(entries.into_iter().map(|e| (e.category, e.count)))
    }

    /// Aggregate `(category, count)` pairs
    #[must_use]
    pub fn from_counts(counts: impl IntoIterator<Item = (LicenseCategory, u64)>) -> Self {
        counts
            .into_iter()
            .fold(Self::default(), |mut summary, (category, count)| {
                summary.total += count;
                match category {
                    LicenseCategory::Copyleft | LicenseCategory::WeakCopyleft => {
                        summary.high_risk += count;
                    }
                    LicenseCategory::Permissive => summary.low_risk += count,
                    LicenseCategory::Proprietary | LicenseCategory::Unknown => {
                        summary.review_needed += count;
                    }
                }
                summary
            })
    }

    /// Share of high risk components, 0.0 when the inventory is empty
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn high_risk_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.high_risk as f64 / self.total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn copyleft_families_sum_to_high_risk() {
        let summary = LicenseRiskSummary::from_counts([
            (LicenseCategory::Permissive, 10),
            (LicenseCategory::Copyleft, 3),
            (LicenseCategory::WeakCopyleft, 2),
        ]);
        assert_eq!(summary.high_risk, 5);
        assert_eq!(summary.low_risk, 10);
        assert_eq!(summary.review_needed, 0);
        assert_eq!(summary.total, 15);
    }

    #[test]
    fn entries_deserialize_kebab_case() {
        let entries: Vec<LicenseEntry> = serde_json::from_str(
            r#"[{"name":"LGPL-2.1","category":"weak-copyleft","count":4},
                {"name":"Acme EULA","category":"proprietary","count":1}]"#,
        )
        .unwrap();
        let summary = LicenseRiskSummary::from_entries(&entries);
        assert_eq!(summary.high_risk, 4);
        assert_eq!(summary.review_needed, 1);
        assert!(LicenseCategory::WeakCopyleft.is_high_risk());
    }

    #[test]
    fn empty_inventory_has_zero_ratio() {
        assert_eq!(LicenseRiskSummary::default().high_risk_ratio(), 0.0);
    }
}
