//! Custom Resource Definitions for the elastic-config operator

mod kinds;
mod types;

use std::collections::BTreeMap;
use std::fmt::Debug;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::NamespaceResourceScope;
use kube::{CustomResourceExt, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub use kinds::{
    ClusterSettings, ClusterSettingsSpec, IndexLifecyclePolicy, IndexLifecyclePolicySpec,
    IndexStateManagement, IndexStateManagementSpec, IndexTemplate, IndexTemplateSpec,
    SnapshotLifecyclePolicy, SnapshotLifecyclePolicySpec, SnapshotRepository,
    SnapshotRepositorySpec,
};
pub use types::{
    preserve_unknown_fields, Condition, ConditionStatus, ResourceSelector, SecretKeySelector,
    SyncPhase, SyncStatus, CONDITION_RESOURCE_SYNCED, REASON_TARGET_SYNCED,
};

/// The configuration kinds the operator knows how to synchronize
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConfigKind {
    /// Composable index templates
    IndexTemplate,
    /// Elasticsearch index lifecycle policies
    IndexLifecyclePolicy,
    /// OpenSearch index state management policies
    IndexStateManagement,
    /// Snapshot repositories
    SnapshotRepository,
    /// Snapshot lifecycle policies
    SnapshotLifecyclePolicy,
    /// Persistent and transient cluster settings
    ClusterSettings,
}

impl ConfigKind {
    /// Every kind, in the order controllers are started
    pub const ALL: [ConfigKind; 6] = [
        ConfigKind::IndexTemplate,
        ConfigKind::IndexLifecyclePolicy,
        ConfigKind::IndexStateManagement,
        ConfigKind::SnapshotRepository,
        ConfigKind::SnapshotLifecyclePolicy,
        ConfigKind::ClusterSettings,
    ];

    /// CRD kind name
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKind::IndexTemplate => "IndexTemplate",
            ConfigKind::IndexLifecyclePolicy => "IndexLifecyclePolicy",
            ConfigKind::IndexStateManagement => "IndexStateManagement",
            ConfigKind::SnapshotRepository => "SnapshotRepository",
            ConfigKind::SnapshotLifecyclePolicy => "SnapshotLifecyclePolicy",
            ConfigKind::ClusterSettings => "ClusterSettings",
        }
    }

    /// Plural noun used in status messages ("Successfully synced 3 index templates")
    pub fn noun(&self) -> &'static str {
        match self {
            ConfigKind::IndexTemplate => "index templates",
            ConfigKind::IndexLifecyclePolicy => "lifecycle policies",
            ConfigKind::IndexStateManagement => "ISM policies",
            ConfigKind::SnapshotRepository => "snapshot repositories",
            ConfigKind::SnapshotLifecyclePolicy => "snapshot lifecycle policies",
            ConfigKind::ClusterSettings => "cluster settings",
        }
    }
}

impl std::fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declarative record that is synchronized to a search cluster.
///
/// Implemented by all six CRD root types so controllers and the reconciler
/// can be written once.
pub trait SyncResource:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Which configuration kind this record carries
    const CONFIG_KIND: ConfigKind;

    /// Target cluster selector
    fn selector(&self) -> &ResourceSelector;

    /// Desired objects, name → body
    fn desired(&self) -> &BTreeMap<String, Value>;

    /// Raw `syncInterval` as written by the user
    fn sync_interval(&self) -> Option<&str>;

    /// Last observed status, if any has been written
    fn sync_status(&self) -> Option<&SyncStatus>;
}

macro_rules! impl_sync_resource {
    ($($ty:ident),+ $(,)?) => {
        $(
            impl SyncResource for $ty {
                const CONFIG_KIND: ConfigKind = ConfigKind::$ty;

                fn selector(&self) -> &ResourceSelector {
                    &self.spec.resource_selector
                }

                fn desired(&self) -> &BTreeMap<String, Value> {
                    &self.spec.resources
                }

                fn sync_interval(&self) -> Option<&str> {
                    self.spec.sync_interval.as_deref()
                }

                fn sync_status(&self) -> Option<&SyncStatus> {
                    self.status.as_ref()
                }
            }
        )+
    };
}

impl_sync_resource!(
    IndexTemplate,
    IndexLifecyclePolicy,
    IndexStateManagement,
    SnapshotRepository,
    SnapshotLifecyclePolicy,
    ClusterSettings,
);

/// CRD manifests for every kind, for printing and install
pub fn all_crds() -> Vec<CustomResourceDefinition> {
    vec![
        IndexTemplate::crd(),
        IndexLifecyclePolicy::crd(),
        IndexStateManagement::crd(),
        SnapshotRepository::crd(),
        SnapshotLifecyclePolicy::crd(),
        ClusterSettings::crd(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Dialect;

    #[test]
    fn index_template_parses_from_yaml() {
        let yaml = r#"
apiVersion: elastic-config-operator.freepik.com/v1alpha1
kind: IndexTemplate
metadata:
  name: logs
  namespace: team-a
spec:
  resourceSelector:
    name: logging
  syncInterval: 30s
  resources:
    logs-template:
      index_patterns: ["logs-*"]
      template:
        settings:
          number_of_shards: 1
"#;
        let record: IndexTemplate = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(record.selector().name, "logging");
        assert_eq!(record.sync_interval(), Some("30s"));
        assert_eq!(
            record.desired()["logs-template"]["template"]["settings"]["number_of_shards"],
            1
        );
        assert!(record.sync_status().is_none());
    }

    #[test]
    fn cluster_settings_parse_with_manual_selector() {
        let yaml = r#"
apiVersion: elastic-config-operator.freepik.com/v1alpha1
kind: ClusterSettings
metadata:
  name: tuning
  namespace: search
spec:
  resourceSelector:
    endpoint: https://os.example.com:9200
    username: admin
    passwordSecretRef:
      name: os-admin
      key: password
    clusterType: opensearch
  resources:
    persistent:
      cluster.routing.allocation.enable: all
status:
  phase: Ready
  appliedResources: ["persistent.cluster.routing.allocation.enable"]
"#;
        let record: ClusterSettings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(record.selector().cluster_type, Some(Dialect::Opensearch));
        let status = record.sync_status().unwrap();
        assert_eq!(status.phase, SyncPhase::Ready);
        assert_eq!(status.applied_resources.len(), 1);
    }

    #[test]
    fn crds_share_group_and_keep_unknown_fields() {
        let crds = all_crds();
        assert_eq!(crds.len(), ConfigKind::ALL.len());

        for crd in &crds {
            assert_eq!(crd.spec.group, crate::API_GROUP);
            assert_eq!(crd.spec.scope, "Namespaced");
            let yaml = serde_yaml::to_string(crd).unwrap();
            assert!(yaml.contains("x-kubernetes-preserve-unknown-fields: true"));
            assert!(yaml.contains("resourceSelector"));
        }

        let kinds: Vec<_> = crds.iter().map(|c| c.spec.names.kind.clone()).collect();
        for kind in ConfigKind::ALL {
            assert!(kinds.iter().any(|k| k == kind.as_str()));
        }
    }

    #[test]
    fn config_kind_matches_crd_kind() {
        assert_eq!(
            <IndexStateManagement as SyncResource>::CONFIG_KIND,
            ConfigKind::IndexStateManagement
        );
        assert_eq!(IndexStateManagement::kind(&()), "IndexStateManagement");
        assert_eq!(ClusterSettings::plural(&()), "clustersettings");
    }
}
