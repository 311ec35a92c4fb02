//! Common types for the elastic-config operator: CRDs, errors, and utilities

#![deny(missing_docs)]

pub mod crd;
pub mod dialect;
pub mod error;
pub mod interval;

pub use dialect::Dialect;
pub use error::Error;
pub use interval::{parse_sync_interval, DEFAULT_SYNC_INTERVAL};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// API group shared by every elastic-config CRD
pub const API_GROUP: &str = "elastic-config-operator.freepik.com";

/// Finalizer guarding remote cleanup before a record is removed
pub const RESOURCE_FINALIZER: &str = "elastic-config-operator.freepik.com/finalizer";

/// Field manager used for status and metadata patches
pub const FIELD_MANAGER: &str = "elastic-config-operator";

/// Well-known superuser created by the auto-managed cluster provisioner
pub const AUTO_MANAGED_USERNAME: &str = "elastic";
