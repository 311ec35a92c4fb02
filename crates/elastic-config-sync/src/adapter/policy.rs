//! OpenSearch plugin policies (ISM, snapshot management)
//!
//! The plugin APIs refuse a plain write over an existing policy. Updates must
//! carry the document's current `_seq_no` and `_primary_term`, so apply reads
//! the policy first and picks create or update accordingly.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use elastic_config_common::crd::ConfigKind;
use elastic_config_common::{Dialect, Error};
use elastic_config_connection::{ClusterConnection, RemoteRequest};

use super::endpoint::EndpointAdapter;
use super::{delete_idempotent, path, send_checked, KindAdapter};

#[derive(Debug, Deserialize)]
struct PolicyVersion {
    #[serde(rename = "_seq_no")]
    seq_no: i64,
    #[serde(rename = "_primary_term")]
    primary_term: i64,
}

/// Policy stored by an OpenSearch plugin with optimistic concurrency control
#[derive(Clone, Debug)]
pub struct VersionedPolicyAdapter {
    kind: ConfigKind,
    segments: &'static [&'static str],
    envelope: Option<&'static str>,
    create_with_post: bool,
    hint: &'static str,
}

impl VersionedPolicyAdapter {
    /// `/_plugins/_ism/policies/{name}`, body wrapped as `{"policy": body}`
    pub fn ism() -> Self {
        Self {
            kind: ConfigKind::IndexStateManagement,
            segments: &["_plugins", "_ism", "policies"],
            envelope: Some("policy"),
            create_with_post: false,
            hint: "use IndexLifecyclePolicy for Elasticsearch clusters",
        }
    }

    /// `/_plugins/_sm/policies/{name}`, created with POST
    pub fn snapshot_management() -> Self {
        Self {
            kind: ConfigKind::SnapshotLifecyclePolicy,
            segments: &["_plugins", "_sm", "policies"],
            envelope: None,
            create_with_post: true,
            hint: "",
        }
    }

    fn check_dialect(&self, connection: &ClusterConnection) -> Result<(), Error> {
        match connection.dialect() {
            Dialect::Opensearch => Ok(()),
            dialect => Err(Error::dialect_mismatch(self.kind.as_str(), dialect, self.hint)),
        }
    }

    fn wrap(&self, body: &Value) -> Value {
        match self.envelope {
            Some(field) => json!({ field: body }),
            None => body.clone(),
        }
    }

    async fn current_version(
        &self,
        connection: &ClusterConnection,
        name: &str,
    ) -> Result<Option<PolicyVersion>, Error> {
        let request = RemoteRequest::get(&path(self.segments, name));
        let response = connection.transport().send(request.clone()).await?;
        if response.is_not_found() {
            return Ok(None);
        }
        let version = response.error_for(&request)?.json()?;
        Ok(Some(version))
    }
}

#[async_trait]
impl KindAdapter for VersionedPolicyAdapter {
    fn kind(&self) -> ConfigKind {
        self.kind
    }

    async fn apply(
        &self,
        connection: &ClusterConnection,
        name: &str,
        body: &Value,
    ) -> Result<(), Error> {
        self.check_dialect(connection)?;

        let segments = path(self.segments, name);
        let body = self.wrap(body);

        let request = match self.current_version(connection, name).await? {
            Some(version) => RemoteRequest::put(&segments, body)
                .query("if_seq_no", version.seq_no)
                .query("if_primary_term", version.primary_term),
            None if self.create_with_post => RemoteRequest::post(&segments, body),
            None => RemoteRequest::put(&segments, body),
        };

        send_checked(connection, request).await?;
        Ok(())
    }

    /// Succeeds without a request on a dialect without the plugin
    async fn delete(&self, connection: &ClusterConnection, name: &str) -> Result<(), Error> {
        if self.check_dialect(connection).is_err() {
            debug!(kind = %self.kind, name, "plugin not served, nothing to delete");
            return Ok(());
        }
        delete_idempotent(connection, RemoteRequest::delete(&path(self.segments, name))).await
    }
}

/// Snapshot lifecycle: SLM on Elasticsearch, snapshot management on OpenSearch
#[derive(Clone, Debug)]
pub struct SnapshotLifecycleAdapter {
    elasticsearch: EndpointAdapter,
    opensearch: VersionedPolicyAdapter,
}

impl SnapshotLifecycleAdapter {
    /// Create the adapter
    pub fn new() -> Self {
        Self {
            elasticsearch: EndpointAdapter::snapshot_lifecycle_policy(),
            opensearch: VersionedPolicyAdapter::snapshot_management(),
        }
    }

    fn for_dialect(&self, dialect: Dialect) -> &dyn KindAdapter {
        match dialect {
            Dialect::Elasticsearch => &self.elasticsearch,
            Dialect::Opensearch => &self.opensearch,
        }
    }
}

impl Default for SnapshotLifecycleAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KindAdapter for SnapshotLifecycleAdapter {
    fn kind(&self) -> ConfigKind {
        ConfigKind::SnapshotLifecyclePolicy
    }

    async fn apply(
        &self,
        connection: &ClusterConnection,
        name: &str,
        body: &Value,
    ) -> Result<(), Error> {
        self.for_dialect(connection.dialect())
            .apply(connection, name, body)
            .await
    }

    async fn delete(&self, connection: &ClusterConnection, name: &str) -> Result<(), Error> {
        self.for_dialect(connection.dialect())
            .delete(connection, name)
            .await
    }
}
