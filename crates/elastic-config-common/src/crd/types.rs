//! Shared types used by every sync CRD

use chrono::{DateTime, Utc};
use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Dialect;

/// Reference to a key inside a Kubernetes Secret
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeySelector {
    /// Name of the secret
    pub name: String,

    /// Namespace of the secret (defaults to the target cluster namespace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Key in the secret to select
    pub key: String,
}

/// Identifies the search cluster a record is synchronized against.
///
/// Either names an auto-managed cluster resource (`name`, `namespace`) or
/// gives the connection details manually (`endpoint`, `username`,
/// `passwordSecretRef`, optional `caCertSecretRef`). When `endpoint` is set
/// the manual form wins.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSelector {
    /// Name of the auto-managed cluster resource
    #[serde(default)]
    pub name: String,

    /// Namespace of the cluster resource (defaults to the record's namespace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Cluster URL, e.g. `https://search.example.com:9200`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Username for basic authentication (manual mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Secret key holding the password (manual mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_secret_ref: Option<SecretKeySelector>,

    /// Secret key holding a PEM CA bundle (manual mode, optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert_secret_ref: Option<SecretKeySelector>,

    /// Skip dialect detection and treat the cluster as this type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_type: Option<Dialect>,
}

impl ResourceSelector {
    /// Namespace the cluster lives in, defaulting to the record's namespace
    pub fn target_namespace<'a>(&'a self, record_namespace: &'a str) -> &'a str {
        match self.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => ns,
            _ => record_namespace,
        }
    }

    /// Manually configured endpoint, if any
    pub fn manual_endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref().filter(|e| !e.is_empty())
    }

    /// `namespace/name` of the target cluster as reported in status
    pub fn target_cluster(&self, record_namespace: &str) -> String {
        format!("{}/{}", self.target_namespace(record_namespace), self.name)
    }
}

/// Lifecycle phase of a sync record
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum SyncPhase {
    /// No sync attempt has been made yet
    #[default]
    Pending,
    /// A sync attempt is in progress
    Syncing,
    /// Last attempt applied everything
    Ready,
    /// Last attempt failed
    Error,
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncPhase::Pending => write!(f, "Pending"),
            SyncPhase::Syncing => write!(f, "Syncing"),
            SyncPhase::Ready => write!(f, "Ready"),
            SyncPhase::Error => write!(f, "Error"),
        }
    }
}

/// Condition status values
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition holds
    True,
    /// Condition does not hold
    False,
    /// Unknown
    #[default]
    Unknown,
}

/// Kubernetes-style condition for status reporting
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Condition {
    /// Type of condition (e.g., ResourceSynced)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,

    /// Machine-readable reason for the condition
    pub reason: String,

    /// Human-readable message
    pub message: String,

    /// Last time the condition transitioned
    #[serde(rename = "lastTransitionTime")]
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Create a new condition with the current timestamp
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }
}

/// Condition type tracking the outcome of the last sync attempt
pub const CONDITION_RESOURCE_SYNCED: &str = "ResourceSynced";

/// Reason set on a successful sync
pub const REASON_TARGET_SYNCED: &str = "TargetSynced";

/// Observed state shared by every sync CRD
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// Current phase
    #[serde(default)]
    pub phase: SyncPhase,

    /// Human-readable message about the current phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// `namespace/name` of the target cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_cluster: Option<String>,

    /// Names (or `category.setting` paths) confirmed written to the cluster
    #[serde(default)]
    pub applied_resources: Vec<String>,

    /// Time of the last fully successful sync
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<DateTime<Utc>>,

    /// `metadata.generation` covered by the last completed attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Conditions
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl SyncStatus {
    /// Set the phase and return self for chaining
    pub fn phase(mut self, phase: SyncPhase) -> Self {
        self.phase = phase;
        self
    }

    /// Set the message and return self for chaining
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Add a condition and return self for chaining
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.retain(|c| c.type_ != condition.type_);
        self.conditions.push(condition);
        self
    }

    /// Look up a condition by type
    pub fn get_condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }
}

/// Schema for free-form JSON documents passed through to the cluster.
///
/// The API server prunes unknown fields unless told to keep them.
pub fn preserve_unknown_fields(_gen: &mut SchemaGenerator) -> Schema {
    let mut schema = SchemaObject {
        instance_type: Some(InstanceType::Object.into()),
        ..Default::default()
    };
    schema.extensions.insert(
        "x-kubernetes-preserve-unknown-fields".to_string(),
        serde_json::Value::Bool(true),
    );
    Schema::Object(schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_namespace_defaults_to_record() {
        let selector = ResourceSelector {
            name: "logs".to_string(),
            ..Default::default()
        };
        assert_eq!(selector.target_namespace("team-a"), "team-a");
        assert_eq!(selector.target_cluster("team-a"), "team-a/logs");

        let selector = ResourceSelector {
            name: "logs".to_string(),
            namespace: Some("search".to_string()),
            ..Default::default()
        };
        assert_eq!(selector.target_namespace("team-a"), "search");
    }

    #[test]
    fn empty_endpoint_is_not_manual() {
        let selector = ResourceSelector {
            endpoint: Some(String::new()),
            ..Default::default()
        };
        assert!(selector.manual_endpoint().is_none());
    }

    #[test]
    fn conditions_of_same_type_are_replaced() {
        let status = SyncStatus::default()
            .condition(Condition::new(
                CONDITION_RESOURCE_SYNCED,
                ConditionStatus::False,
                "SyncFailed",
                "boom",
            ))
            .condition(Condition::new(
                CONDITION_RESOURCE_SYNCED,
                ConditionStatus::True,
                REASON_TARGET_SYNCED,
                "ok",
            ));

        assert_eq!(status.conditions.len(), 1);
        assert_eq!(
            status.get_condition(CONDITION_RESOURCE_SYNCED).unwrap().status,
            ConditionStatus::True
        );
    }

    #[test]
    fn selector_parses_camel_case() {
        let yaml = r#"
name: logs
endpoint: https://search.example.com:9200
username: admin
passwordSecretRef:
  name: search-admin
  key: password
caCertSecretRef:
  name: search-ca
  namespace: certs
  key: ca.crt
clusterType: opensearch
"#;
        let selector: ResourceSelector = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(selector.manual_endpoint(), Some("https://search.example.com:9200"));
        assert_eq!(selector.cluster_type, Some(Dialect::Opensearch));
        assert_eq!(
            selector.ca_cert_secret_ref.unwrap().namespace.as_deref(),
            Some("certs")
        );
    }
}
