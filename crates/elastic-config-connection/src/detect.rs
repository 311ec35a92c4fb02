//! Dialect and version detection from the cluster-info document

use serde::Deserialize;
use tracing::debug;

use elastic_config_common::{Dialect, Error};

use crate::transport::{ClusterTransport, RemoteRequest};

/// What the cluster-info probe learned about a cluster
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterInfo {
    /// API flavor
    pub dialect: Dialect,
    /// Version string as reported by the cluster (e.g. "8.13.4", "2.11.0")
    pub version: String,
}

#[derive(Deserialize)]
struct InfoDocument {
    version: VersionDocument,
}

#[derive(Deserialize)]
struct VersionDocument {
    #[serde(default)]
    number: String,
    #[serde(default)]
    distribution: Option<String>,
}

/// Probe `GET /` and classify the cluster.
///
/// An explicit `dialect_override` is trusted as-is; the probe is still made to
/// learn the version.
pub async fn detect(
    transport: &dyn ClusterTransport,
    dialect_override: Option<Dialect>,
) -> Result<ClusterInfo, Error> {
    let request = RemoteRequest::get(&[]);
    let response = transport.send(request.clone()).await?;

    if !response.is_success() {
        return Err(Error::detection(format!(
            "{} returned {} - {}",
            request.describe(),
            response.status,
            response.body
        )));
    }

    let info: InfoDocument = serde_json::from_str(&response.body)
        .map_err(|e| Error::detection(format!("unparseable cluster info: {e}")))?;

    let dialect = dialect_override
        .unwrap_or_else(|| Dialect::from_distribution(info.version.distribution.as_deref()));

    debug!(
        dialect = %dialect,
        version = %info.version.number,
        overridden = dialect_override.is_some(),
        "detected cluster dialect"
    );

    Ok(ClusterInfo {
        dialect,
        version: info.version.number,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockClusterTransport, RemoteResponse};

    fn transport_returning(status: u16, body: &'static str) -> MockClusterTransport {
        let mut transport = MockClusterTransport::new();
        transport
            .expect_send()
            .withf(|req| req.segments.is_empty())
            .times(1)
            .returning(move |_| Ok(RemoteResponse::new(status, body)));
        transport
    }

    #[tokio::test]
    async fn opensearch_distribution_is_detected() {
        let transport = transport_returning(
            200,
            r#"{"version":{"distribution":"opensearch","number":"2.11.0"}}"#,
        );
        let info = detect(&transport, None).await.unwrap();
        assert_eq!(info.dialect, Dialect::Opensearch);
        assert_eq!(info.version, "2.11.0");
    }

    #[tokio::test]
    async fn missing_distribution_is_elasticsearch() {
        let transport = transport_returning(200, r#"{"version":{"number":"8.13.4"}}"#);
        let info = detect(&transport, None).await.unwrap();
        assert_eq!(info.dialect, Dialect::Elasticsearch);
        assert_eq!(info.version, "8.13.4");
    }

    #[tokio::test]
    async fn override_is_trusted_but_version_still_probed() {
        let transport = transport_returning(200, r#"{"version":{"number":"7.10.2"}}"#);
        let info = detect(&transport, Some(Dialect::Opensearch)).await.unwrap();
        assert_eq!(info.dialect, Dialect::Opensearch);
        assert_eq!(info.version, "7.10.2");
    }

    #[tokio::test]
    async fn error_status_is_detection_error() {
        let transport = transport_returning(401, "unauthorized");
        let err = detect(&transport, None).await.unwrap_err();
        assert!(matches!(err, Error::Detection(ref m) if m.contains("401")));
    }

    #[tokio::test]
    async fn garbage_body_is_detection_error() {
        let transport = transport_returning(200, "<html>");
        let err = detect(&transport, None).await.unwrap_err();
        assert!(matches!(err, Error::Detection(_)));
    }

    #[tokio::test]
    async fn transport_failure_is_passed_through() {
        let mut transport = MockClusterTransport::new();
        transport
            .expect_send()
            .returning(|_| Err(Error::connection("connection refused")));
        let err = detect(&transport, None).await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }
}
