//! CTEM Client - REST boundary for the dashboard data layer
//!
//! Turns resources and filter objects into request paths and executes them
//! against the backend.
//!
//! # Layers
//!
//! - [`endpoint`]: pure path and query-string construction
//! - [`HttpClient`]: the transport seam; [`ReqwestClient`] in production
//! - [`Fetcher`]: typed reads (with [`RetryPolicy`]) and writes (sent once)
//!
//! # Example
//!
//! ```rust
//! use ctem_client::endpoint;
//! use ctem_model::{AssetGroupFilters, AssetGroups, Environment};
//!
//! let filters = AssetGroupFilters::default()
//!     .with_environment([Environment::Production, Environment::Staging]);
//! assert_eq!(
//!     endpoint::list::<AssetGroups>(Some(&filters)),
//!     "/api/v1/asset-groups?environment=production,staging"
//! );
//! ```

pub mod endpoint;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod reqwest_client;
pub mod retry;
pub mod token;

pub use error::{ApiError, ApiResult};
pub use fetcher::Fetcher;
pub use http::{ApiRequest, HttpClient, HttpClientExt, Method};
pub use reqwest_client::{ReqwestClient, TENANT_HEADER};
pub use retry::RetryPolicy;
pub use token::{NoAuth, SharedToken, TokenSource};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
