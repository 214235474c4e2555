//! Cache keys and invalidation patterns

use ctem_model::TenantId;
use std::fmt;
use std::sync::Arc;

/// Identity of one cached fetch
///
/// Tenant plus the request path with its serialized filters. Compared by
/// value, so equal filters share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    tenant: TenantId,
    path: Arc<str>,
}

impl CacheKey {
    /// Key for a tenant-scoped path
    #[must_use]
    pub fn new(tenant: TenantId, path: impl AsRef<str>) -> Self {
        Self {
            tenant,
            path: Arc::from(path.as_ref()),
        }
    }

    /// Tenant scope
    #[inline]
    #[must_use]
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// Request path including query string
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tenant, self.path)
    }
}

/// Which keys an invalidation applies to
///
/// Patterns match the path; a tenant restriction is optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPattern {
    /// Path starts with
    Prefix(String),
    /// Path contains
    Contains(String),
    /// Exactly this key
    Exact(CacheKey),
    /// Every key of one tenant
    Tenant(TenantId),
}

impl KeyPattern {
    /// Path prefix pattern
    #[inline]
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self::Prefix(prefix.into())
    }

    /// Substring pattern
    #[inline]
    pub fn contains(needle: impl Into<String>) -> Self {
        Self::Contains(needle.into())
    }

    /// Check a key
    #[must_use]
    pub fn matches(&self, key: &CacheKey) -> bool {
        match self {
            Self::Prefix(prefix) => key.path().starts_with(prefix.as_str()),
            Self::Contains(needle) => key.path().contains(needle.as_str()),
            Self::Exact(exact) => exact == key,
            Self::Tenant(tenant) => key.tenant() == tenant,
        }
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prefix(p) => write!(f, "prefix({p})"),
            Self::Contains(c) => write!(f, "contains({c})"),
            Self::Exact(k) => write!(f, "exact({k})"),
            Self::Tenant(t) => write!(f, "tenant({t})"),
        }
    }
}
