//! Error types for the elastic-config operator
//!
//! Variants follow the failure taxonomy of a sync attempt: configuration and
//! dependency problems on the Kubernetes side, connection and detection
//! problems while building a cluster client, and remote API failures while
//! applying configuration objects.

use thiserror::Error;

use crate::Dialect;

/// Main error type for elastic-config operations
#[derive(Debug, Error)]
pub enum Error {
    /// Bad or missing selector fields; never succeeds until the record is edited
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A referenced auto-managed cluster resource does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// A conventionally-named secret of an auto-managed cluster is missing
    #[error("dependency error: {0}")]
    Dependency(String),

    /// TLS or network failure establishing or using a cluster client
    #[error("connection error: {0}")]
    Connection(String),

    /// Cluster-info probe failed or returned an unparseable document
    #[error("detection error: {0}")]
    Detection(String),

    /// Configuration kind not supported by the detected cluster dialect
    #[error("{kind} is not supported by {dialect} clusters: {hint}")]
    DialectMismatch {
        /// Configuration kind that was rejected
        kind: String,
        /// Dialect detected for the target cluster
        dialect: Dialect,
        /// What to use instead
        hint: String,
    },

    /// Non-2xx response from the cluster, surfaced verbatim
    #[error("remote API error: {operation} returned {status} - {body}")]
    RemoteApi {
        /// Request that failed (e.g. "PUT /_ilm/policy/hot-warm")
        operation: String,
        /// HTTP status code
        status: u16,
        /// Response body as returned by the cluster
        body: String,
    },

    /// Resync interval could not be parsed
    #[error("invalid sync interval {value:?}: {message}")]
    InvalidInterval {
        /// The offending value from the record
        value: String,
        /// Parser message
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },
}

impl Error {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a dependency error
    pub fn dependency(msg: impl Into<String>) -> Self {
        Self::Dependency(msg.into())
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a detection error
    pub fn detection(msg: impl Into<String>) -> Self {
        Self::Detection(msg.into())
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a remote API error from a failed request
    pub fn remote_api(operation: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::RemoteApi {
            operation: operation.into(),
            status,
            body: body.into(),
        }
    }

    /// Create a dialect mismatch error
    pub fn dialect_mismatch(
        kind: impl Into<String>,
        dialect: Dialect,
        hint: impl Into<String>,
    ) -> Self {
        Self::DialectMismatch {
            kind: kind.into(),
            dialect,
            hint: hint.into(),
        }
    }

    /// Whether a later attempt may succeed without the record being edited
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Configuration(_)
            | Error::DialectMismatch { .. }
            | Error::InvalidInterval { .. }
            | Error::Serialization(_) => false,
            Error::RemoteApi { status, .. } => *status >= 500 || *status == 429,
            Error::NotFound(_)
            | Error::Dependency(_)
            | Error::Connection(_)
            | Error::Detection(_)
            | Error::Kube { .. } => true,
        }
    }

    /// Whether a cached cluster connection should be dropped after this error.
    ///
    /// Transport failures and rejected credentials usually mean the endpoint
    /// moved or the password rotated; rebuilding the connection picks that up.
    pub fn evicts_connection(&self) -> bool {
        match self {
            Error::Connection(_) => true,
            Error::RemoteApi { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }

    /// Short machine-readable reason, used for status conditions
    pub fn reason(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "ConfigurationError",
            Error::NotFound(_) => "NotFound",
            Error::Dependency(_) => "DependencyError",
            Error::Connection(_) => "ConnectionError",
            Error::Detection(_) => "DetectionError",
            Error::DialectMismatch { .. } => "DialectMismatch",
            Error::RemoteApi { .. } => "RemoteAPIError",
            Error::InvalidInterval { .. } => "InvalidSyncInterval",
            Error::Serialization(_) => "SerializationError",
            Error::Kube { .. } => "KubernetesApiCallError",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
