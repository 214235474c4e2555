//! Error types for the query cache

use crate::key::CacheKey;

/// Result alias for direct cache access
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache access errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// Entry holds a different type than requested
    #[error("cached value for {key} is a {found}, not the requested type")]
    TypeMismatch {
        /// Offending key
        key: CacheKey,
        /// Type name stored with the entry
        found: &'static str,
    },
}
