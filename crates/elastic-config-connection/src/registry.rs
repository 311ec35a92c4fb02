//! Connection registry
//!
//! Caches one [`ClusterConnection`] per [`ClusterKey`]. Each key owns a
//! `tokio::sync::OnceCell`; the map lock is only held to find or insert that
//! cell, never across the connect. Workers that miss on the same key wait on
//! the one probe in flight instead of starting their own. A failed connect
//! leaves the cell empty so the next caller retries.

use std::collections::HashMap;
use std::fmt;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use parking_lot::RwLock;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use elastic_config_common::crd::ResourceSelector;
use elastic_config_common::{Dialect, Error};

use crate::detect::detect;
use crate::resolver::Resolver;
use crate::transport::{ClusterTransport, HttpTransport, TransportOptions};

/// Identity of a target cluster, as seen from a record.
///
/// `namespace_name#fingerprint`, where the fingerprint covers every selector
/// field. Editing the endpoint, credentials, CA bundle or cluster type yields
/// a new key and therefore a freshly probed connection, and two records that
/// reach one endpoint with different credentials never share a client.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterKey(String);

impl ClusterKey {
    /// Key for a selector declared on a record in `record_namespace`
    pub fn for_selector(selector: &ResourceSelector, record_namespace: &str) -> Self {
        let namespace = selector.target_namespace(record_namespace);
        Self(format!(
            "{}_{}#{:016x}",
            namespace,
            selector.name,
            selector_fingerprint(selector, namespace)
        ))
    }

    /// Key as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Hash of the selector with its namespace resolved. In-process only.
fn selector_fingerprint(selector: &ResourceSelector, namespace: &str) -> u64 {
    let resolved = ResourceSelector {
        namespace: Some(namespace.to_string()),
        ..selector.clone()
    };
    let mut hasher = DefaultHasher::new();
    serde_json::to_string(&resolved)
        .unwrap_or_default()
        .hash(&mut hasher);
    hasher.finish()
}

impl fmt::Display for ClusterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An open, probed client for one cluster. Immutable once created.
pub struct ClusterConnection {
    key: ClusterKey,
    endpoint: String,
    dialect: Dialect,
    version: String,
    transport: Arc<dyn ClusterTransport>,
}

impl ClusterConnection {
    /// Assemble a connection from its parts
    pub fn new(
        key: ClusterKey,
        endpoint: impl Into<String>,
        dialect: Dialect,
        version: impl Into<String>,
        transport: Arc<dyn ClusterTransport>,
    ) -> Self {
        Self {
            key,
            endpoint: endpoint.into(),
            dialect,
            version: version.into(),
            transport,
        }
    }

    /// Registry key this connection is cached under
    pub fn key(&self) -> &ClusterKey {
        &self.key
    }

    /// Base URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Detected (or overridden) dialect
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Version reported by the cluster
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Transport for sending requests
    pub fn transport(&self) -> &dyn ClusterTransport {
        self.transport.as_ref()
    }
}

impl fmt::Debug for ClusterConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterConnection")
            .field("key", &self.key)
            .field("endpoint", &self.endpoint)
            .field("dialect", &self.dialect)
            .field("version", &self.version)
            .finish()
    }
}

/// Builds a new connection for a selector
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    /// Resolve credentials, open a client and probe the cluster
    async fn connect(
        &self,
        key: ClusterKey,
        selector: &ResourceSelector,
        record_namespace: &str,
    ) -> Result<ClusterConnection, Error>;
}

/// [`Connector`] that resolves credentials from Kubernetes and talks HTTPS
pub struct HttpConnector {
    resolver: Resolver,
    options: TransportOptions,
}

impl HttpConnector {
    /// Create a connector
    pub fn new(resolver: Resolver, options: TransportOptions) -> Self {
        Self { resolver, options }
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(
        &self,
        key: ClusterKey,
        selector: &ResourceSelector,
        record_namespace: &str,
    ) -> Result<ClusterConnection, Error> {
        let creds = self.resolver.resolve(selector, record_namespace).await?;

        let transport = HttpTransport::new(
            &creds.endpoint,
            creds.username.as_str(),
            creds.password.as_str(),
            creds.ca_pem.as_deref(),
            &self.options,
        )?;

        let info = detect(&transport, selector.cluster_type).await?;

        info!(
            cluster = %key,
            endpoint = %creds.endpoint,
            dialect = %info.dialect,
            version = %info.version,
            "connected to cluster"
        );

        Ok(ClusterConnection::new(
            key,
            creds.endpoint,
            info.dialect,
            info.version,
            Arc::new(transport),
        ))
    }
}

type Slot = Arc<OnceCell<Arc<ClusterConnection>>>;

/// Thread-safe cache of cluster connections
pub struct ConnectionRegistry {
    connector: Arc<dyn Connector>,
    connections: RwLock<HashMap<ClusterKey, Slot>>,
}

impl ConnectionRegistry {
    /// Create an empty registry that builds connections with `connector`
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Cached connection for the selector, creating it on first use.
    ///
    /// Concurrent callers for one key share a single connect. Nothing is
    /// cached when creation fails; the next call starts over.
    pub async fn get_or_create(
        &self,
        selector: &ResourceSelector,
        record_namespace: &str,
    ) -> Result<Arc<ClusterConnection>, Error> {
        let key = ClusterKey::for_selector(selector, record_namespace);
        let slot = self.slot(&key);

        let connection = slot
            .get_or_try_init(|| async {
                debug!(cluster = %key, "no cached connection, connecting");
                self.connector
                    .connect(key.clone(), selector, record_namespace)
                    .await
                    .map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(connection))
    }

    /// Slot for a key, inserting an empty one on first sight
    fn slot(&self, key: &ClusterKey) -> Slot {
        if let Some(slot) = self.connections.read().get(key) {
            return Arc::clone(slot);
        }
        let mut connections = self.connections.write();
        Arc::clone(connections.entry(key.clone()).or_default())
    }

    /// Cached connection for a key, without creating one
    pub fn get(&self, key: &ClusterKey) -> Option<Arc<ClusterConnection>> {
        self.connections
            .read()
            .get(key)
            .and_then(|slot| slot.get().cloned())
    }

    /// Drop the cached connection for a key. Returns whether one was cached.
    pub fn delete(&self, key: &ClusterKey) -> bool {
        let removed = self
            .connections
            .write()
            .remove(key)
            .is_some_and(|slot| slot.initialized());
        if removed {
            info!(cluster = %key, "evicted cached cluster connection");
        }
        removed
    }

    /// Number of cached connections
    pub fn len(&self) -> usize {
        self.connections
            .read()
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    /// Whether no connections are cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
