//! Kubernetes operator syncing declarative index, snapshot, and cluster
//! configuration to Elasticsearch and OpenSearch clusters

#![deny(missing_docs)]

/// Command-line configuration
pub mod config;
/// Per-kind reconcile entry points and kube-backed collaborators
pub mod controller;
/// CRD manifests and start-up installation
pub mod crds;
/// Controller construction
pub mod runner;
/// Tracing subscriber setup
pub mod telemetry;
