//! The six configuration kinds synchronized to search clusters
//!
//! Every kind carries the same spec shape (selector, name → body map, resync
//! interval) and the same [`SyncStatus`]; only the remote endpoint differs.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{preserve_unknown_fields, ResourceSelector, SyncStatus};

/// Composable index templates, keyed by template name
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "elastic-config-operator.freepik.com",
    version = "v1alpha1",
    kind = "IndexTemplate",
    namespaced,
    status = "SyncStatus",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Message","type":"string","jsonPath":".status.message","priority":1}"#,
    printcolumn = r#"{"name":"Last Sync","type":"date","jsonPath":".status.lastSyncTime"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct IndexTemplateSpec {
    /// Target cluster
    pub resource_selector: ResourceSelector,

    /// Template bodies keyed by template name
    #[serde(default)]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub resources: BTreeMap<String, Value>,

    /// Resync interval, e.g. "30s" (default 10s)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_interval: Option<String>,
}

/// Elasticsearch ILM policies, keyed by policy name
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "elastic-config-operator.freepik.com",
    version = "v1alpha1",
    kind = "IndexLifecyclePolicy",
    namespaced,
    status = "SyncStatus",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Message","type":"string","jsonPath":".status.message","priority":1}"#,
    printcolumn = r#"{"name":"Last Sync","type":"date","jsonPath":".status.lastSyncTime"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct IndexLifecyclePolicySpec {
    /// Target cluster
    pub resource_selector: ResourceSelector,

    /// Policy bodies keyed by policy name
    #[serde(default)]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub resources: BTreeMap<String, Value>,

    /// Resync interval, e.g. "30s" (default 10s)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_interval: Option<String>,
}

/// OpenSearch ISM policies, keyed by policy name
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "elastic-config-operator.freepik.com",
    version = "v1alpha1",
    kind = "IndexStateManagement",
    namespaced,
    status = "SyncStatus",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Message","type":"string","jsonPath":".status.message","priority":1}"#,
    printcolumn = r#"{"name":"Last Sync","type":"date","jsonPath":".status.lastSyncTime"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct IndexStateManagementSpec {
    /// Target cluster
    pub resource_selector: ResourceSelector,

    /// Policy bodies keyed by policy name (without the `policy` envelope)
    #[serde(default)]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub resources: BTreeMap<String, Value>,

    /// Resync interval, e.g. "30s" (default 10s)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_interval: Option<String>,
}

/// Snapshot repositories, keyed by repository name
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "elastic-config-operator.freepik.com",
    version = "v1alpha1",
    kind = "SnapshotRepository",
    namespaced,
    status = "SyncStatus",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Message","type":"string","jsonPath":".status.message","priority":1}"#,
    printcolumn = r#"{"name":"Last Sync","type":"date","jsonPath":".status.lastSyncTime"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRepositorySpec {
    /// Target cluster
    pub resource_selector: ResourceSelector,

    /// Repository definitions keyed by repository name
    #[serde(default)]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub resources: BTreeMap<String, Value>,

    /// Resync interval, e.g. "30s" (default 10s)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_interval: Option<String>,
}

/// Snapshot lifecycle policies, keyed by policy name
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "elastic-config-operator.freepik.com",
    version = "v1alpha1",
    kind = "SnapshotLifecyclePolicy",
    namespaced,
    status = "SyncStatus",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Message","type":"string","jsonPath":".status.message","priority":1}"#,
    printcolumn = r#"{"name":"Last Sync","type":"date","jsonPath":".status.lastSyncTime"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotLifecyclePolicySpec {
    /// Target cluster
    pub resource_selector: ResourceSelector,

    /// Policy bodies keyed by policy name
    #[serde(default)]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub resources: BTreeMap<String, Value>,

    /// Resync interval, e.g. "30s" (default 10s)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_interval: Option<String>,
}

/// Cluster settings, keyed by category (`persistent`, `transient`)
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "elastic-config-operator.freepik.com",
    version = "v1alpha1",
    kind = "ClusterSettings",
    plural = "clustersettings",
    namespaced,
    status = "SyncStatus",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Message","type":"string","jsonPath":".status.message","priority":1}"#,
    printcolumn = r#"{"name":"Last Sync","type":"date","jsonPath":".status.lastSyncTime"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSettingsSpec {
    /// Target cluster
    pub resource_selector: ResourceSelector,

    /// Setting objects keyed by category
    #[serde(default)]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub resources: BTreeMap<String, Value>,

    /// Resync interval, e.g. "30s" (default 10s)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_interval: Option<String>,
}
