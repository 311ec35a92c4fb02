//! Controller construction
//!
//! One kube-runtime controller per config kind. All of them share a single
//! [`Reconciler`], and with it a single connection cache.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use kube::runtime::controller::Config as ControllerConfig;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client};

use elastic_config_common::crd::{
    ClusterSettings, IndexLifecyclePolicy, IndexStateManagement, IndexTemplate,
    SnapshotLifecyclePolicy, SnapshotRepository, SyncResource,
};
use elastic_config_sync::Reconciler;

use crate::config::RunArgs;
use crate::controller::{error_policy, reconcile, Context};

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
const WATCH_TIMEOUT_SECS: u32 = 25;

/// Boxed controller future
pub type ControllerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Build one controller future per config kind
pub fn build_controllers(
    client: Client,
    reconciler: Arc<Reconciler>,
    args: &RunArgs,
) -> Vec<ControllerFuture> {
    vec![
        build_controller::<IndexTemplate>(client.clone(), reconciler.clone(), args),
        build_controller::<IndexLifecyclePolicy>(client.clone(), reconciler.clone(), args),
        build_controller::<IndexStateManagement>(client.clone(), reconciler.clone(), args),
        build_controller::<SnapshotRepository>(client.clone(), reconciler.clone(), args),
        build_controller::<SnapshotLifecyclePolicy>(client.clone(), reconciler.clone(), args),
        build_controller::<ClusterSettings>(client, reconciler, args),
    ]
}

fn build_controller<K: SyncResource>(
    client: Client,
    reconciler: Arc<Reconciler>,
    args: &RunArgs,
) -> ControllerFuture {
    let api: Api<K> = match args.watch_namespace.as_deref() {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    };
    let ctx = Arc::new(Context::new::<K>(client, reconciler));

    tracing::info!("- {} controller", K::CONFIG_KIND);

    Box::pin(
        Controller::new(api, WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS))
            .with_config(ControllerConfig::default().concurrency(args.concurrency))
            .shutdown_on_signal()
            .run(reconcile::<K>, error_policy::<K>, ctx)
            .for_each(log_reconcile_result(K::CONFIG_KIND.as_str())),
    )
}

/// Creates a closure for logging reconciliation results.
fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}
