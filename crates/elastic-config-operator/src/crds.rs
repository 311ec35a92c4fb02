//! CRD manifests and installation
//!
//! The operator installs its own CRDs on start-up using server-side apply so
//! the schemas always match the running version.

use anyhow::Context as _;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;

use elastic_config_common::crd::all_crds;
use elastic_config_common::FIELD_MANAGER;

/// All CRDs as a multi-document YAML stream
pub fn crd_manifests() -> Result<String, serde_yaml::Error> {
    let documents = all_crds()
        .iter()
        .map(serde_yaml::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(documents.join("---\n"))
}

/// Install or update every CRD
pub async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();

    for crd in all_crds() {
        let name = crd
            .metadata
            .name
            .clone()
            .context("generated CRD has no name")?;
        tracing::info!("Installing {} CRD...", name);
        crds.patch(&name, &params, &Patch::Apply(&crd))
            .await
            .with_context(|| format!("failed to install {name} CRD"))?;
    }

    tracing::info!("All CRDs installed/updated");
    Ok(())
}
