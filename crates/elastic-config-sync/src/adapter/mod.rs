//! Kind adapters
//!
//! Each configuration kind knows how to apply and delete one named object
//! against either dialect, and how its record's `resources` map onto the
//! identifiers tracked in `appliedResources`. The reconciler only ever talks
//! to [`KindAdapter`].

mod endpoint;
mod policy;
mod settings;

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde_json::Value;

use elastic_config_common::crd::ConfigKind;
use elastic_config_common::Error;
use elastic_config_connection::{ClusterConnection, RemoteRequest, RemoteResponse};

pub use endpoint::EndpointAdapter;
pub use policy::{SnapshotLifecycleAdapter, VersionedPolicyAdapter};
pub use settings::{flatten_settings, ClusterSettingsAdapter};

/// Apply/delete strategy for one configuration kind
#[async_trait]
pub trait KindAdapter: Send + Sync {
    /// Kind handled by this adapter
    fn kind(&self) -> ConfigKind;

    /// Create or replace `name` with `body`. Must be idempotent.
    async fn apply(&self, connection: &ClusterConnection, name: &str, body: &Value)
        -> Result<(), Error>;

    /// Remove `name`. Removing something that does not exist succeeds, as
    /// does removing under a dialect that does not serve the kind.
    async fn delete(&self, connection: &ClusterConnection, name: &str) -> Result<(), Error>;

    /// Remove every name in `names`, stopping at the first failure
    async fn delete_all(&self, connection: &ClusterConnection, names: &[String]) -> Result<(), Error> {
        for name in names {
            self.delete(connection, name).await?;
        }
        Ok(())
    }

    /// Identifiers recorded in `appliedResources` once `desired` is fully applied
    fn applied_names(&self, desired: &BTreeMap<String, Value>) -> Result<Vec<String>, Error> {
        Ok(desired.keys().cloned().collect())
    }

    /// Previously applied identifiers that are no longer desired
    fn removals(
        &self,
        desired: &BTreeMap<String, Value>,
        last_applied: &[String],
    ) -> Result<Vec<String>, Error> {
        let desired: BTreeSet<String> = self.applied_names(desired)?.into_iter().collect();
        let removals: BTreeSet<&String> = last_applied
            .iter()
            .filter(|name| !desired.contains(*name))
            .collect();
        Ok(removals.into_iter().cloned().collect())
    }

    /// Identifiers to delete when the record itself is deleted.
    ///
    /// Every desired name, plus anything still tracked from an earlier
    /// attempt whose removal did not complete.
    fn deletion_units(&self, desired: &BTreeMap<String, Value>, last_applied: &[String]) -> Vec<String> {
        let units: BTreeSet<&String> = desired.keys().chain(last_applied.iter()).collect();
        units.into_iter().cloned().collect()
    }
}

/// Adapter for a configuration kind
pub fn adapter_for(kind: ConfigKind) -> Box<dyn KindAdapter> {
    match kind {
        ConfigKind::IndexTemplate => Box::new(EndpointAdapter::index_template()),
        ConfigKind::IndexLifecyclePolicy => Box::new(EndpointAdapter::index_lifecycle_policy()),
        ConfigKind::IndexStateManagement => Box::new(VersionedPolicyAdapter::ism()),
        ConfigKind::SnapshotRepository => Box::new(EndpointAdapter::snapshot_repository()),
        ConfigKind::SnapshotLifecyclePolicy => Box::new(SnapshotLifecycleAdapter::new()),
        ConfigKind::ClusterSettings => Box::new(ClusterSettingsAdapter),
    }
}

/// Send a request and fail on any non-2xx response
pub(crate) async fn send_checked(
    connection: &ClusterConnection,
    request: RemoteRequest,
) -> Result<RemoteResponse, Error> {
    let response = connection.transport().send(request.clone()).await?;
    response.error_for(&request)
}

/// Send a DELETE, treating 404 as success
pub(crate) async fn delete_idempotent(
    connection: &ClusterConnection,
    request: RemoteRequest,
) -> Result<(), Error> {
    let response = connection.transport().send(request.clone()).await?;
    if response.is_not_found() {
        return Ok(());
    }
    response.error_for(&request).map(|_| ())
}

/// `base` path segments followed by `name`
pub(crate) fn path<'a>(base: &[&'a str], name: &'a str) -> Vec<&'a str> {
    let mut segments = base.to_vec();
    segments.push(name);
    segments
}
