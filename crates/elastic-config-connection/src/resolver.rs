//! Credential and TLS material resolution
//!
//! A selector either gives connection details manually (endpoint, username,
//! password secret, optional CA secret) or names an auto-managed cluster
//! resource whose service endpoint and secrets follow fixed naming
//! conventions.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, DynamicObject, GroupVersionKind};
use kube::discovery::ApiResource;
use kube::Client;
#[cfg(test)]
use mockall::automock;
use tracing::debug;

use elastic_config_common::crd::{ResourceSelector, SecretKeySelector};
use elastic_config_common::{Error, AUTO_MANAGED_USERNAME};

/// API group of the auto-managed cluster resource
const MANAGED_CLUSTER_GROUP: &str = "elasticsearch.k8s.elastic.co";
/// API version of the auto-managed cluster resource
const MANAGED_CLUSTER_VERSION: &str = "v1";
/// Kind of the auto-managed cluster resource
const MANAGED_CLUSTER_KIND: &str = "Elasticsearch";
/// Plural of the auto-managed cluster resource
const MANAGED_CLUSTER_PLURAL: &str = "elasticsearches";

/// Key holding the superuser password in the managed credentials secret
const MANAGED_PASSWORD_KEY: &str = "elastic";
/// Key holding the CA bundle in the managed public certs secret
const MANAGED_CA_KEY: &str = "tls.crt";
/// Port of the managed HTTP service
const MANAGED_HTTP_PORT: u16 = 9200;

/// Read access to Kubernetes secrets
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Value of `key` in secret `namespace/name`.
    ///
    /// Returns `Ok(None)` if the secret or the key does not exist.
    async fn get(&self, namespace: &str, name: &str, key: &str) -> Result<Option<Vec<u8>>, Error>;
}

/// Existence checks for auto-managed cluster resources
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterLookup: Send + Sync {
    /// Whether the cluster resource `namespace/name` exists
    async fn exists(&self, namespace: &str, name: &str) -> Result<bool, Error>;
}

/// [`SecretStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl KubeSecretStore {
    /// Create a store using the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn get(&self, namespace: &str, name: &str, key: &str) -> Result<Option<Vec<u8>>, Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api.get_opt(name).await?;
        Ok(secret
            .and_then(|s| s.data)
            .and_then(|mut data| data.remove(key))
            .map(|value| value.0))
    }
}

/// [`ClusterLookup`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeClusterLookup {
    client: Client,
    resource: ApiResource,
}

impl KubeClusterLookup {
    /// Create a lookup using the given client
    pub fn new(client: Client) -> Self {
        let gvk = GroupVersionKind::gvk(
            MANAGED_CLUSTER_GROUP,
            MANAGED_CLUSTER_VERSION,
            MANAGED_CLUSTER_KIND,
        );
        Self {
            client,
            resource: ApiResource::from_gvk_with_plural(&gvk, MANAGED_CLUSTER_PLURAL),
        }
    }
}

#[async_trait]
impl ClusterLookup for KubeClusterLookup {
    async fn exists(&self, namespace: &str, name: &str) -> Result<bool, Error> {
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &self.resource);
        Ok(api.get_opt(name).await?.is_some())
    }
}

/// Everything needed to open a client to one cluster
#[derive(Clone, PartialEq, Eq)]
pub struct ClusterCredentials {
    /// Base URL of the cluster
    pub endpoint: String,
    /// Basic auth username
    pub username: String,
    /// Basic auth password
    pub password: String,
    /// PEM CA bundle used to verify the server certificate
    pub ca_pem: Option<Vec<u8>>,
}

impl fmt::Debug for ClusterCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Don't expose the password in debug output
        f.debug_struct("ClusterCredentials")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("ca_pem", &self.ca_pem.as_ref().map(|pem| pem.len()))
            .finish()
    }
}

/// Turns a selector into [`ClusterCredentials`]
#[derive(Clone)]
pub struct Resolver {
    secrets: Arc<dyn SecretStore>,
    clusters: Arc<dyn ClusterLookup>,
}

impl Resolver {
    /// Create a resolver over the given stores
    pub fn new(secrets: Arc<dyn SecretStore>, clusters: Arc<dyn ClusterLookup>) -> Self {
        Self { secrets, clusters }
    }

    /// Resolve a selector declared on a record in `record_namespace`
    pub async fn resolve(
        &self,
        selector: &ResourceSelector,
        record_namespace: &str,
    ) -> Result<ClusterCredentials, Error> {
        let namespace = selector.target_namespace(record_namespace);
        match selector.manual_endpoint() {
            Some(endpoint) => self.resolve_manual(selector, endpoint, namespace).await,
            None => self.resolve_managed(&selector.name, namespace).await,
        }
    }

    async fn resolve_manual(
        &self,
        selector: &ResourceSelector,
        endpoint: &str,
        namespace: &str,
    ) -> Result<ClusterCredentials, Error> {
        let username = selector
            .username
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::configuration("username is required when endpoint is set"))?;

        let password_ref = selector.password_secret_ref.as_ref().ok_or_else(|| {
            Error::configuration("passwordSecretRef is required when endpoint is set")
        })?;
        let password = self.read_ref(password_ref, namespace).await?;
        let password = String::from_utf8(password).map_err(|_| {
            Error::configuration(format!(
                "key {} in secret {} is not valid UTF-8",
                password_ref.key, password_ref.name
            ))
        })?;

        let ca_pem = match &selector.ca_cert_secret_ref {
            Some(ca_ref) => Some(self.read_ref(ca_ref, namespace).await?),
            None => None,
        };

        debug!(endpoint = %endpoint, username = %username, "resolved manual cluster credentials");
        Ok(ClusterCredentials {
            endpoint: endpoint.to_string(),
            username: username.to_string(),
            password,
            ca_pem,
        })
    }

    async fn read_ref(&self, reference: &SecretKeySelector, namespace: &str) -> Result<Vec<u8>, Error> {
        let namespace = reference
            .namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .unwrap_or(namespace);

        match self
            .secrets
            .get(namespace, &reference.name, &reference.key)
            .await?
        {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(Error::configuration(format!(
                "key {} not found or empty in secret {}/{}",
                reference.key, namespace, reference.name
            ))),
        }
    }

    async fn resolve_managed(&self, name: &str, namespace: &str) -> Result<ClusterCredentials, Error> {
        if name.is_empty() {
            return Err(Error::configuration(
                "resourceSelector must set either endpoint or name",
            ));
        }

        if !self.clusters.exists(namespace, name).await? {
            return Err(Error::not_found(format!(
                "{MANAGED_CLUSTER_KIND} {namespace}/{name}"
            )));
        }

        let credentials_secret = format!("{name}-es-elastic-user");
        let password = self
            .read_dependency(namespace, &credentials_secret, MANAGED_PASSWORD_KEY)
            .await?;
        let password = String::from_utf8(password).map_err(|_| {
            Error::dependency(format!(
                "password in secret {namespace}/{credentials_secret} is not valid UTF-8"
            ))
        })?;

        let certs_secret = format!("{name}-es-http-certs-public");
        let ca_pem = self
            .read_dependency(namespace, &certs_secret, MANAGED_CA_KEY)
            .await?;

        let endpoint = format!("https://{name}-es-http.{namespace}.svc:{MANAGED_HTTP_PORT}");
        debug!(endpoint = %endpoint, "resolved auto-managed cluster credentials");

        Ok(ClusterCredentials {
            endpoint,
            username: AUTO_MANAGED_USERNAME.to_string(),
            password,
            ca_pem: Some(ca_pem),
        })
    }

    async fn read_dependency(&self, namespace: &str, name: &str, key: &str) -> Result<Vec<u8>, Error> {
        match self.secrets.get(namespace, name, key).await? {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(Error::dependency(format!(
                "secret {namespace}/{name} is missing key {key}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    fn resolver(secrets: MockSecretStore, clusters: MockClusterLookup) -> Resolver {
        Resolver::new(Arc::new(secrets), Arc::new(clusters))
    }

    fn manual_selector() -> ResourceSelector {
        ResourceSelector {
            endpoint: Some("https://search.example.com:9200".to_string()),
            username: Some("admin".to_string()),
            password_secret_ref: Some(SecretKeySelector {
                name: "search-admin".to_string(),
                namespace: None,
                key: "password".to_string(),
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn manual_mode_reads_password_from_target_namespace() {
        let mut secrets = MockSecretStore::new();
        secrets
            .expect_get()
            .with(eq("team-a"), eq("search-admin"), eq("password"))
            .times(1)
            .returning(|_, _, _| Ok(Some(b"hunter2".to_vec())));

        let creds = resolver(secrets, MockClusterLookup::new())
            .resolve(&manual_selector(), "team-a")
            .await
            .unwrap();

        assert_eq!(creds.endpoint, "https://search.example.com:9200");
        assert_eq!(creds.username, "admin");
        assert_eq!(creds.password, "hunter2");
        assert!(creds.ca_pem.is_none());
    }

    #[tokio::test]
    async fn manual_mode_ca_ref_uses_its_own_namespace() {
        let mut selector = manual_selector();
        selector.ca_cert_secret_ref = Some(SecretKeySelector {
            name: "search-ca".to_string(),
            namespace: Some("certs".to_string()),
            key: "ca.crt".to_string(),
        });

        let mut secrets = MockSecretStore::new();
        secrets
            .expect_get()
            .with(eq("team-a"), eq("search-admin"), eq("password"))
            .returning(|_, _, _| Ok(Some(b"pw".to_vec())));
        secrets
            .expect_get()
            .with(eq("certs"), eq("search-ca"), eq("ca.crt"))
            .returning(|_, _, _| Ok(Some(b"-----BEGIN CERTIFICATE-----".to_vec())));

        let creds = resolver(secrets, MockClusterLookup::new())
            .resolve(&selector, "team-a")
            .await
            .unwrap();
        assert!(creds.ca_pem.is_some());
    }

    #[tokio::test]
    async fn manual_mode_requires_username() {
        let mut selector = manual_selector();
        selector.username = Some(String::new());

        let err = resolver(MockSecretStore::new(), MockClusterLookup::new())
            .resolve(&selector, "team-a")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(ref m) if m.contains("username")));
    }

    #[tokio::test]
    async fn manual_mode_requires_password_ref() {
        let mut selector = manual_selector();
        selector.password_secret_ref = None;

        let err = resolver(MockSecretStore::new(), MockClusterLookup::new())
            .resolve(&selector, "team-a")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(ref m) if m.contains("passwordSecretRef")));
    }

    #[tokio::test]
    async fn manual_mode_empty_key_is_configuration_error() {
        let mut secrets = MockSecretStore::new();
        secrets
            .expect_get()
            .returning(|_, _, _| Ok(Some(Vec::new())));

        let err = resolver(secrets, MockClusterLookup::new())
            .resolve(&manual_selector(), "team-a")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[tokio::test]
    async fn managed_mode_uses_conventional_names() {
        let mut clusters = MockClusterLookup::new();
        clusters
            .expect_exists()
            .with(eq("search"), eq("logging"))
            .returning(|_, _| Ok(true));

        let mut secrets = MockSecretStore::new();
        secrets
            .expect_get()
            .with(eq("search"), eq("logging-es-elastic-user"), eq("elastic"))
            .returning(|_, _, _| Ok(Some(b"pw".to_vec())));
        secrets
            .expect_get()
            .with(eq("search"), eq("logging-es-http-certs-public"), eq("tls.crt"))
            .returning(|_, _, _| Ok(Some(b"pem".to_vec())));

        let selector = ResourceSelector {
            name: "logging".to_string(),
            namespace: Some("search".to_string()),
            ..Default::default()
        };
        let creds = resolver(secrets, clusters)
            .resolve(&selector, "team-a")
            .await
            .unwrap();

        assert_eq!(creds.endpoint, "https://logging-es-http.search.svc:9200");
        assert_eq!(creds.username, "elastic");
        assert_eq!(creds.ca_pem.as_deref(), Some(b"pem".as_slice()));
    }

    #[tokio::test]
    async fn managed_mode_missing_cluster_is_not_found() {
        let mut clusters = MockClusterLookup::new();
        clusters.expect_exists().returning(|_, _| Ok(false));

        let selector = ResourceSelector {
            name: "logging".to_string(),
            ..Default::default()
        };
        let err = resolver(MockSecretStore::new(), clusters)
            .resolve(&selector, "team-a")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(ref m) if m.contains("team-a/logging")));
    }

    #[tokio::test]
    async fn managed_mode_missing_secret_is_dependency_error() {
        let mut clusters = MockClusterLookup::new();
        clusters.expect_exists().returning(|_, _| Ok(true));
        let mut secrets = MockSecretStore::new();
        secrets.expect_get().returning(|_, _, _| Ok(None));

        let selector = ResourceSelector {
            name: "logging".to_string(),
            ..Default::default()
        };
        let err = resolver(secrets, clusters)
            .resolve(&selector, "team-a")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Dependency(ref m) if m.contains("logging-es-elastic-user")));
    }

    #[tokio::test]
    async fn selector_without_name_or_endpoint_is_rejected() {
        let err = resolver(MockSecretStore::new(), MockClusterLookup::new())
            .resolve(&ResourceSelector::default(), "team-a")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn debug_hides_password() {
        let creds = ClusterCredentials {
            endpoint: "https://x:9200".to_string(),
            username: "elastic".to_string(),
            password: "hunter2".to_string(),
            ca_pem: None,
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
