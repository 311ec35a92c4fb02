//! Kinds stored under a fixed `PUT/DELETE {base}/{name}` endpoint

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use elastic_config_common::crd::ConfigKind;
use elastic_config_common::{Dialect, Error};
use elastic_config_connection::{ClusterConnection, RemoteRequest};

use super::{delete_idempotent, path, send_checked, KindAdapter};

type Segments = &'static [&'static str];

/// Create-or-replace by name under a per-dialect base path.
///
/// A dialect without a base path does not support the kind. Applies are
/// rejected with [`Error::DialectMismatch`] before anything is sent; deletes
/// succeed without a request since nothing can exist there.
#[derive(Clone, Debug)]
pub struct EndpointAdapter {
    kind: ConfigKind,
    elasticsearch: Option<Segments>,
    opensearch: Option<Segments>,
    hint: &'static str,
}

impl EndpointAdapter {
    /// `/_index_template/{name}` on both dialects
    pub fn index_template() -> Self {
        Self {
            kind: ConfigKind::IndexTemplate,
            elasticsearch: Some(&["_index_template"]),
            opensearch: Some(&["_index_template"]),
            hint: "",
        }
    }

    /// `/_ilm/policy/{name}`, Elasticsearch only
    pub fn index_lifecycle_policy() -> Self {
        Self {
            kind: ConfigKind::IndexLifecyclePolicy,
            elasticsearch: Some(&["_ilm", "policy"]),
            opensearch: None,
            hint: "use IndexStateManagement for OpenSearch clusters",
        }
    }

    /// `/_snapshot/{name}` on both dialects
    pub fn snapshot_repository() -> Self {
        Self {
            kind: ConfigKind::SnapshotRepository,
            elasticsearch: Some(&["_snapshot"]),
            opensearch: Some(&["_snapshot"]),
            hint: "",
        }
    }

    /// `/_slm/policy/{name}`, the Elasticsearch side of snapshot lifecycle
    pub(crate) fn snapshot_lifecycle_policy() -> Self {
        Self {
            kind: ConfigKind::SnapshotLifecyclePolicy,
            elasticsearch: Some(&["_slm", "policy"]),
            opensearch: None,
            hint: "",
        }
    }

    fn base(&self, dialect: Dialect) -> Result<Segments, Error> {
        let base = match dialect {
            Dialect::Elasticsearch => self.elasticsearch,
            Dialect::Opensearch => self.opensearch,
        };
        base.ok_or_else(|| Error::dialect_mismatch(self.kind.as_str(), dialect, self.hint))
    }
}

#[async_trait]
impl KindAdapter for EndpointAdapter {
    fn kind(&self) -> ConfigKind {
        self.kind
    }

    async fn apply(
        &self,
        connection: &ClusterConnection,
        name: &str,
        body: &Value,
    ) -> Result<(), Error> {
        let base = self.base(connection.dialect())?;
        send_checked(connection, RemoteRequest::put(&path(base, name), body.clone())).await?;
        Ok(())
    }

    async fn delete(&self, connection: &ClusterConnection, name: &str) -> Result<(), Error> {
        let Ok(base) = self.base(connection.dialect()) else {
            debug!(
                kind = %self.kind,
                dialect = %connection.dialect(),
                name,
                "kind not served, nothing to delete"
            );
            return Ok(());
        };
        delete_idempotent(connection, RemoteRequest::delete(&path(base, name))).await
    }
}
