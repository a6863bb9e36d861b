//! Shared configuration, error types, IDs, and observability primitives for FedQ crates.
//!
//! Architecture role:
//! - defines connector configuration passed across layers
//! - provides common [`FedqError`] / [`Result`] contracts
//! - hosts the Prometheus metrics registry
//!
//! Key modules:
//! - [`config`]
//! - [`error`]
//! - [`ids`]
//! - [`metrics`]

pub mod config;
pub mod error;
pub mod ids;
pub mod metrics;

pub use config::ConnectorConfig;
pub use error::{FedqError, Result};
pub use ids::*;
pub use metrics::MetricsRegistry;
