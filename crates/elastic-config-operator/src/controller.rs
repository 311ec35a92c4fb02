//! Reconcile entry points shared by every config kind
//!
//! Maps kube-runtime notifications onto the generic [`Reconciler`]: adds the
//! cleanup finalizer before the first remote write, classifies the event, and
//! removes the finalizer once remote cleanup has succeeded.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Client, Resource, ResourceExt};
use tracing::{error, info, instrument};

#[cfg(test)]
use mockall::automock;

use elastic_config_common::crd::{SyncResource, SyncStatus};
use elastic_config_common::{Error, FIELD_MANAGER, RESOURCE_FINALIZER};
use elastic_config_sync::{EventKind, Outcome, Reconciler, StatusStore, SyncRecord};

/// Requeue delay after a Kubernetes API failure
pub const ERROR_REQUEUE: Duration = Duration::from_secs(10);

/// Metadata writes on config records
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RecordClient: Send + Sync {
    /// Add the cleanup finalizer to `namespace/name`
    async fn add_finalizer(&self, namespace: &str, name: &str) -> Result<(), Error>;

    /// Remove the cleanup finalizer from `namespace/name`
    async fn remove_finalizer(&self, namespace: &str, name: &str) -> Result<(), Error>;
}

/// Kubernetes-backed record and status writes for kind `K`
pub struct KubeRecordClient<K> {
    client: Client,
    kind: PhantomData<fn() -> K>,
}

impl<K: SyncResource> KubeRecordClient<K> {
    /// Create a client for records of kind `K`
    pub fn new(client: Client) -> Self {
        Self {
            client,
            kind: PhantomData,
        }
    }

    fn api(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn patch_finalizers(
        &self,
        namespace: &str,
        name: &str,
        finalizers: Vec<String>,
    ) -> Result<(), Error> {
        let patch = serde_json::json!({
            "metadata": {
                "finalizers": finalizers
            }
        });

        self.api(namespace)
            .patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<K: SyncResource> RecordClient for KubeRecordClient<K> {
    async fn add_finalizer(&self, namespace: &str, name: &str) -> Result<(), Error> {
        let record = self.api(namespace).get(name).await?;
        let mut finalizers = record.meta().finalizers.clone().unwrap_or_default();

        if finalizers.iter().any(|f| f == RESOURCE_FINALIZER) {
            return Ok(());
        }

        finalizers.push(RESOURCE_FINALIZER.to_string());
        self.patch_finalizers(namespace, name, finalizers).await
    }

    async fn remove_finalizer(&self, namespace: &str, name: &str) -> Result<(), Error> {
        let record = self.api(namespace).get(name).await?;
        let finalizers: Vec<String> = record
            .meta()
            .finalizers
            .as_ref()
            .map(|f| f.iter().filter(|s| *s != RESOURCE_FINALIZER).cloned().collect())
            .unwrap_or_default();

        self.patch_finalizers(namespace, name, finalizers).await
    }
}

#[async_trait]
impl<K: SyncResource> StatusStore for KubeRecordClient<K> {
    async fn update(&self, namespace: &str, name: &str, status: &SyncStatus) -> Result<(), Error> {
        let status_patch = serde_json::json!({
            "status": status
        });

        self.api(namespace)
            .patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&status_patch))
            .await?;
        Ok(())
    }
}

/// Shared state for one kind's controller
pub struct Context {
    /// Finalizer writes
    pub records: Arc<dyn RecordClient>,
    /// Status writes
    pub status: Arc<dyn StatusStore>,
    /// Sync algorithm, shared across kinds
    pub reconciler: Arc<Reconciler>,
}

impl Context {
    /// Context for kind `K` backed by the Kubernetes API
    pub fn new<K: SyncResource>(client: Client, reconciler: Arc<Reconciler>) -> Self {
        let kube = Arc::new(KubeRecordClient::<K>::new(client));
        Self {
            records: kube.clone(),
            status: kube,
            reconciler,
        }
    }

    /// Create a context with custom collaborators
    ///
    /// Used by unit tests where no API server is available.
    #[cfg(test)]
    pub fn for_testing(
        records: Arc<dyn RecordClient>,
        status: Arc<dyn StatusStore>,
        reconciler: Arc<Reconciler>,
    ) -> Self {
        Self {
            records,
            status,
            reconciler,
        }
    }
}

/// Reconcile one config record of any kind
#[instrument(skip(resource, ctx), fields(kind = %K::CONFIG_KIND, record = %resource.name_any()))]
pub async fn reconcile<K: SyncResource>(
    resource: Arc<K>,
    ctx: Arc<Context>,
) -> Result<Action, Error> {
    let namespace = resource.namespace().unwrap_or_default();
    let name = resource.name_any();
    let event = EventKind::of(resource.as_ref());

    if event == EventKind::Deleted {
        if !has_finalizer(resource.as_ref()) {
            return Ok(Action::await_change());
        }

        let record = SyncRecord::from_resource(resource.as_ref());
        return match ctx.reconciler.handle(&record, event, ctx.status.as_ref()).await? {
            Outcome::Finalize => {
                ctx.records.remove_finalizer(&namespace, &name).await?;
                info!("remote cleanup done, finalizer removed");
                Ok(Action::await_change())
            }
            Outcome::Requeue(after) => Ok(Action::requeue(after)),
        };
    }

    if !has_finalizer(resource.as_ref()) {
        info!("Adding finalizer");
        ctx.records.add_finalizer(&namespace, &name).await?;
        return Ok(Action::requeue(Duration::from_secs(1)));
    }

    let record = SyncRecord::from_resource(resource.as_ref());
    match ctx.reconciler.handle(&record, event, ctx.status.as_ref()).await? {
        Outcome::Requeue(after) => Ok(Action::requeue(after)),
        Outcome::Finalize => Ok(Action::await_change()),
    }
}

/// Log a failed reconcile and retry later
pub fn error_policy<K: SyncResource>(
    resource: Arc<K>,
    error: &Error,
    _ctx: Arc<Context>,
) -> Action {
    error!(
        ?error,
        kind = %K::CONFIG_KIND,
        record = %resource.name_any(),
        "reconciliation failed"
    );
    Action::requeue(ERROR_REQUEUE)
}

/// Check if a record carries the cleanup finalizer
pub fn has_finalizer<K: SyncResource>(resource: &K) -> bool {
    resource
        .meta()
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|s| s == RESOURCE_FINALIZER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use elastic_config_common::crd::{
        IndexTemplate, IndexTemplateSpec, ResourceSelector, SyncPhase,
    };
    use elastic_config_common::Dialect;
    use elastic_config_connection::{
        ClusterConnection, ClusterKey, ClusterTransport, ConnectionRegistry, Connector,
        RemoteRequest, RemoteResponse,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use mockall::predicate::eq;
    use serde_json::json;

    /// Answers every request with the same status
    struct FixedStatus(u16);

    #[async_trait]
    impl ClusterTransport for FixedStatus {
        async fn send(&self, _request: RemoteRequest) -> Result<RemoteResponse, Error> {
            Ok(RemoteResponse::new(self.0, "{}"))
        }
    }

    struct FixedConnector(u16);

    #[async_trait]
    impl Connector for FixedConnector {
        async fn connect(
            &self,
            key: ClusterKey,
            _selector: &ResourceSelector,
            _record_namespace: &str,
        ) -> Result<ClusterConnection, Error> {
            Ok(ClusterConnection::new(
                key,
                "https://logging-es-http.team-a.svc:9200",
                Dialect::Elasticsearch,
                "8.13.4",
                Arc::new(FixedStatus(self.0)),
            ))
        }
    }

    /// Keeps every status written
    #[derive(Default)]
    struct CapturedStatus(Mutex<Vec<SyncStatus>>);

    impl CapturedStatus {
        fn phases(&self) -> Vec<SyncPhase> {
            self.0.lock().unwrap().iter().map(|s| s.phase).collect()
        }
    }

    #[async_trait]
    impl StatusStore for CapturedStatus {
        async fn update(&self, _namespace: &str, _name: &str, status: &SyncStatus) -> Result<(), Error> {
            self.0.lock().unwrap().push(status.clone());
            Ok(())
        }
    }

    fn template(finalized: bool) -> IndexTemplate {
        let mut record = IndexTemplate::new(
            "logs",
            IndexTemplateSpec {
                resource_selector: ResourceSelector {
                    name: "logging".to_string(),
                    ..Default::default()
                },
                resources: BTreeMap::from([(
                    "logs".to_string(),
                    json!({"index_patterns": ["logs-*"]}),
                )]),
                sync_interval: Some("2m".to_string()),
            },
        );
        record.metadata.namespace = Some("team-a".to_string());
        record.metadata.generation = Some(1);
        if finalized {
            record.metadata.finalizers = Some(vec![RESOURCE_FINALIZER.to_string()]);
        }
        record
    }

    fn deleting(mut record: IndexTemplate) -> IndexTemplate {
        record.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
        record
    }

    fn context(
        records: MockRecordClient,
        status: Arc<CapturedStatus>,
        cluster_status: u16,
    ) -> Arc<Context> {
        let registry = Arc::new(ConnectionRegistry::new(Arc::new(FixedConnector(cluster_status))));
        Arc::new(Context::for_testing(
            Arc::new(records),
            status,
            Arc::new(Reconciler::new(registry)),
        ))
    }

    #[tokio::test]
    async fn first_reconcile_adds_finalizer_before_syncing() {
        let mut records = MockRecordClient::new();
        records
            .expect_add_finalizer()
            .with(eq("team-a"), eq("logs"))
            .times(1)
            .returning(|_, _| Ok(()));
        let status = Arc::new(CapturedStatus::default());

        let action = reconcile(Arc::new(template(false)), context(records, status.clone(), 200))
            .await
            .unwrap();

        assert_eq!(action, Action::requeue(Duration::from_secs(1)));
        assert!(status.phases().is_empty());
    }

    #[tokio::test]
    async fn finalized_record_is_synced_and_requeued_after_interval() {
        let status = Arc::new(CapturedStatus::default());

        let action = reconcile(
            Arc::new(template(true)),
            context(MockRecordClient::new(), status.clone(), 200),
        )
        .await
        .unwrap();

        assert_eq!(action, Action::requeue(Duration::from_secs(120)));
        assert_eq!(status.phases(), vec![SyncPhase::Syncing, SyncPhase::Ready]);
    }

    #[tokio::test]
    async fn failed_sync_is_reported_in_status_not_returned() {
        let status = Arc::new(CapturedStatus::default());

        let action = reconcile(
            Arc::new(template(true)),
            context(MockRecordClient::new(), status.clone(), 500),
        )
        .await
        .unwrap();

        assert_eq!(action, Action::requeue(Duration::from_secs(120)));
        assert_eq!(status.phases(), vec![SyncPhase::Syncing, SyncPhase::Error]);
    }

    #[tokio::test]
    async fn deleted_record_without_finalizer_is_left_alone() {
        let status = Arc::new(CapturedStatus::default());

        let action = reconcile(
            Arc::new(deleting(template(false))),
            context(MockRecordClient::new(), status.clone(), 500),
        )
        .await
        .unwrap();

        assert_eq!(action, Action::await_change());
        assert!(status.phases().is_empty());
    }

    #[tokio::test]
    async fn successful_cleanup_removes_finalizer() {
        let mut records = MockRecordClient::new();
        records
            .expect_remove_finalizer()
            .with(eq("team-a"), eq("logs"))
            .times(1)
            .returning(|_, _| Ok(()));

        // already gone on the cluster
        let action = reconcile(
            Arc::new(deleting(template(true))),
            context(records, Arc::new(CapturedStatus::default()), 404),
        )
        .await
        .unwrap();

        assert_eq!(action, Action::await_change());
    }

    #[tokio::test]
    async fn failed_cleanup_keeps_finalizer() {
        let mut records = MockRecordClient::new();
        records.expect_remove_finalizer().times(0);
        let status = Arc::new(CapturedStatus::default());

        let action = reconcile(
            Arc::new(deleting(template(true))),
            context(records, status.clone(), 503),
        )
        .await
        .unwrap();

        assert_eq!(action, Action::requeue(Duration::from_secs(120)));
        assert_eq!(status.phases(), vec![SyncPhase::Error]);
    }

    #[tokio::test]
    async fn finalizer_patch_failure_is_returned() {
        let mut records = MockRecordClient::new();
        records
            .expect_add_finalizer()
            .returning(|_, _| Err(Error::configuration("patch rejected")));

        let result = reconcile(
            Arc::new(template(false)),
            context(records, Arc::new(CapturedStatus::default()), 200),
        )
        .await;

        assert!(result.is_err());
    }

    #[test]
    fn error_policy_requeues() {
        let ctx = context(MockRecordClient::new(), Arc::new(CapturedStatus::default()), 200);
        let action = error_policy(
            Arc::new(template(true)),
            &Error::configuration("boom"),
            ctx,
        );
        assert_eq!(action, Action::requeue(ERROR_REQUEUE));
    }

    #[test]
    fn finalizer_detection() {
        assert!(has_finalizer(&template(true)));
        assert!(!has_finalizer(&template(false)));
    }
}
