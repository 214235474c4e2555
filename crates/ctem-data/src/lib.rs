//! CTEM Data - the dashboard's data synchronization layer
//!
//! Ties the model, the REST client and the query cache together into the
//! handles consumers hold:
//!
//! - [`ResourceQuery`] / [`RecordQuery`]: mounted reads gated on tenant and
//!   permission, revalidated when the cache says their key went stale
//! - [`ResourceMutation`]: validated writes that invalidate the resource's
//!   reads and report through a [`Notifier`]
//! - [`DataContext`]: shared state plus the mock/real repository factory
//!
//! # Example
//!
//! ```rust
//! use ctem_data::prelude::*;
//! use ctem_model::{AssetGroupFilters, AssetGroups, PermissionSet, Session};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ctx = DataContext::builder(SyncConfig::default())
//!     .with_session(Session::for_tenant("acme", PermissionSet::all()))
//!     .build()?;
//!
//! let query = ctx.query::<AssetGroups>(AssetGroupFilters::default().with_search("banking"));
//! assert_eq!(query.data().map(|page| page.total), Some(1));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod fixtures;
pub mod mutation;
pub mod notify;
pub mod query;
pub mod repository;
pub mod telemetry;

pub use config::{ConfigError, ConfigResult, LogConfig, SyncConfig};
pub use context::{DataContext, DataContextBuilder};
pub use mutation::{ResourceMutation, WriteOp};
pub use notify::{Notification, NotificationKind, Notifier, TracingNotifier};
pub use query::{QueryHandle, QueryOptions, QueryState, QueryStatus, RecordQuery, ResourceQuery};
pub use repository::{
    AssetGroupRepository, DataSource, HttpRepository, MockRepository, MockResource,
    OutboxRepository, ResourceRepository,
};
pub use telemetry::init_tracing;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for mounting queries and running mutations
    pub use crate::config::SyncConfig;
    pub use crate::context::DataContext;
    pub use crate::mutation::ResourceMutation;
    pub use crate::notify::{Notification, Notifier};
    pub use crate::query::{QueryOptions, QueryState, QueryStatus, RecordQuery, ResourceQuery};
    pub use crate::repository::{DataSource, ResourceRepository};
}
