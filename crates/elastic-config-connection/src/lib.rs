//! Connections to Elasticsearch and OpenSearch clusters
//!
//! Resolves credentials and TLS material for a [`ResourceSelector`], probes the
//! cluster to learn its dialect and version, and caches the resulting
//! [`ClusterConnection`] per cluster key in a [`ConnectionRegistry`].
//!
//! [`ResourceSelector`]: elastic_config_common::crd::ResourceSelector

#![deny(missing_docs)]

pub mod detect;
pub mod registry;
pub mod resolver;
pub mod transport;

pub use detect::{detect, ClusterInfo};
pub use registry::{ClusterConnection, ClusterKey, ConnectionRegistry, Connector, HttpConnector};
pub use resolver::{
    ClusterCredentials, ClusterLookup, KubeClusterLookup, KubeSecretStore, Resolver, SecretStore,
};
pub use transport::{
    ClusterTransport, HttpTransport, Method, RemoteRequest, RemoteResponse, TransportOptions,
};
