//! CTEM Cache - shared query cache for the dashboard data layer
//!
//! One [`QueryCache`] per data context holds every fetched response, keyed by
//! tenant and request path.
//!
//! - Concurrent reads of one key share a single request
//! - A later-issued request always wins over an earlier one
//! - [`QueryCache::invalidate`] broadcasts a [`CacheEvent::Stale`] message to
//!   every [`Subscription`] instead of touching consumers directly
//!
//! # Example
//!
//! ```rust
//! use ctem_cache::{CacheKey, FetchMode, KeyPattern, QueryCache};
//! use ctem_model::TenantId;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let cache: QueryCache<String> = QueryCache::default();
//! let key = CacheKey::new(TenantId::new("acme"), "/api/v1/agents");
//!
//! let value = cache
//!     .fetch(&key, FetchMode::Dedupe, || async { Ok::<_, String>(vec![1, 2, 3]) })
//!     .await
//!     .unwrap();
//! assert_eq!(value.len(), 3);
//!
//! cache.invalidate(&KeyPattern::prefix("/api/v1/agents")).await;
//! # }
//! ```

pub mod error;
pub mod event;
pub mod key;
pub mod store;

pub use error::{CacheError, CacheResult};
pub use event::{CacheEvent, Subscription};
pub use key::{CacheKey, KeyPattern};
pub use store::{CacheStats, FetchMode, QueryCache, DEFAULT_CAPACITY, DEFAULT_DEDUPE_INTERVAL};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
