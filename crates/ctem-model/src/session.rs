//! Tenant scope and the signed-in user's session view

use crate::permission::{Permission, PermissionSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Customer/organization scope namespacing every resource and cache key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Wrap a tenant identifier
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the data layer knows about the current user
///
/// Both halves may be missing while the surrounding app is still resolving
/// them; queries stay disabled until they are present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Active tenant, if one has been selected
    pub tenant: Option<TenantId>,
    /// Granted capabilities
    pub permissions: PermissionSet,
}

impl Session {
    /// Session without a tenant or permissions
    #[inline]
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Session scoped to a tenant
    #[inline]
    #[must_use]
    pub fn for_tenant(tenant: impl Into<String>, permissions: PermissionSet) -> Self {
        Self {
            tenant: Some(TenantId::new(tenant)),
            permissions,
        }
    }

    /// Check a capability
    #[inline]
    #[must_use]
    pub fn can(&self, permission: Permission) -> bool {
        self.permissions.grants(permission)
    }
}
