//! Elastic config operator - sync declarative search-cluster configuration

use std::sync::Arc;

use clap::Parser;
use kube::Client;

use elastic_config_connection::{
    ConnectionRegistry, HttpConnector, KubeClusterLookup, KubeSecretStore, Resolver,
};
use elastic_config_operator::config::{Cli, Commands, RunArgs};
use elastic_config_operator::crds::{crd_manifests, ensure_crds_installed};
use elastic_config_operator::runner::build_controllers;
use elastic_config_operator::telemetry::init_telemetry;
use elastic_config_sync::Reconciler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        let manifests = crd_manifests()
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRDs: {}", e))?;
        println!("{manifests}");
        return Ok(());
    }

    let args = match cli.command {
        Some(Commands::Run(args)) => args,
        None => RunArgs::from_env(),
    };
    run_controllers(args).await
}

/// Run every config controller until a shutdown signal arrives
async fn run_controllers(args: RunArgs) -> anyhow::Result<()> {
    init_telemetry(args.log_format)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting elastic-config operator");

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    if args.install_crds {
        ensure_crds_installed(&client).await?;
    }

    let options = args.transport_options();
    if options.allow_insecure_tls {
        tracing::warn!("clusters without a CA bundle will be contacted without certificate verification");
    }

    let resolver = Resolver::new(
        Arc::new(KubeSecretStore::new(client.clone())),
        Arc::new(KubeClusterLookup::new(client.clone())),
    );
    let registry = Arc::new(ConnectionRegistry::new(Arc::new(HttpConnector::new(
        resolver, options,
    ))));
    let reconciler = Arc::new(Reconciler::new(registry));

    tracing::info!(
        concurrency = args.concurrency,
        namespace = args.watch_namespace.as_deref().unwrap_or("<all>"),
        "Starting controllers:"
    );
    let controllers = build_controllers(client, reconciler, &args);
    futures::future::join_all(controllers).await;

    tracing::info!("Controllers stopped");
    Ok(())
}
