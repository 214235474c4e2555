//! Capabilities held by the current user
//!
//! A [`PermissionSet`] gates both whether a query fetches and whether a
//! mutation is reachable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A single capability, serialized as `resource:action`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Permission {
    /// View asset groups
    AssetGroupsRead,
    /// Create, edit and delete asset groups
    AssetGroupsWrite,
    /// View exposure events
    ExposuresRead,
    /// Triage exposure events
    ExposuresWrite,
    /// View scan profiles
    ScanProfilesRead,
    /// Manage scan profiles
    ScanProfilesWrite,
    /// View the notification outbox
    NotificationsRead,
    /// Enqueue, retry and cancel notifications
    NotificationsWrite,
    /// View workflows
    WorkflowsRead,
    /// Build and edit workflows
    WorkflowsWrite,
    /// View the agent fleet
    AgentsRead,
    /// Register and reconfigure agents
    AgentsWrite,
}

impl Permission {
    /// Every known permission
    pub const ALL: [Permission; 12] = [
        Self::AssetGroupsRead,
        Self::AssetGroupsWrite,
        Self::ExposuresRead,
        Self::ExposuresWrite,
        Self::ScanProfilesRead,
        Self::ScanProfilesWrite,
        Self::NotificationsRead,
        Self::NotificationsWrite,
        Self::WorkflowsRead,
        Self::WorkflowsWrite,
        Self::AgentsRead,
        Self::AgentsWrite,
    ];

    /// Wire form, e.g. `asset_groups:read`
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AssetGroupsRead => "asset_groups:read",
            Self::AssetGroupsWrite => "asset_groups:write",
            Self::ExposuresRead => "exposures:read",
            Self::ExposuresWrite => "exposures:write",
            Self::ScanProfilesRead => "scan_profiles:read",
            Self::ScanProfilesWrite => "scan_profiles:write",
            Self::NotificationsRead => "notifications:read",
            Self::NotificationsWrite => "notifications:write",
            Self::WorkflowsRead => "workflows:read",
            Self::WorkflowsWrite => "workflows:write",
            Self::AgentsRead => "agents:read",
            Self::AgentsWrite => "agents:write",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown permission: {s}"))
    }
}

impl TryFrom<String> for Permission {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Permission> for String {
    fn from(value: Permission) -> Self {
        value.as_str().to_string()
    }
}

/// The capability set of the signed-in user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    /// Empty set (nothing is reachable)
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every permission (tenant administrators)
    #[must_use]
    pub fn all() -> Self {
        Self(Permission::ALL.into_iter().collect())
    }

    /// Add a permission
    #[inline]
    #[must_use]
    pub fn with(mut self, permission: Permission) -> Self {
        self.0.insert(permission);
        self
    }

    /// Remove a permission
    #[inline]
    #[must_use]
    pub fn without(mut self, permission: Permission) -> Self {
        self.0.remove(&permission);
        self
    }

    /// Check a capability
    #[inline]
    #[must_use]
    pub fn grants(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    /// Number of granted permissions
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when nothing is granted
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_string_roundtrip() {
        for p in Permission::ALL {
            assert_eq!(p.as_str().parse::<Permission>().unwrap(), p);
        }
        assert!("assets:delete".parse::<Permission>().is_err());
    }

    #[test]
    fn permission_set_grants() {
        let set = PermissionSet::empty().with(Permission::AssetGroupsRead);
        assert!(set.grants(Permission::AssetGroupsRead));
        assert!(!set.grants(Permission::AssetGroupsWrite));

        let set = set.without(Permission::AssetGroupsRead);
        assert!(set.is_empty());
    }

    #[test]
    fn permission_set_deserializes_from_strings() {
        let set: PermissionSet =
            serde_json::from_str(r#"["exposures:read","agents:write"]"#).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.grants(Permission::AgentsWrite));
    }
}
