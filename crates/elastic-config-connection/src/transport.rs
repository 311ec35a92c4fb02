//! HTTP transport to a search cluster
//!
//! [`ClusterTransport`] is the seam between request building (dialect
//! detection, kind adapters) and the wire. Non-2xx responses are returned as
//! data; only failures to get a response at all are errors.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use elastic_config_common::Error;

/// Default per-request timeout, also used as the idle connection timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP methods used against the management APIs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// PUT
    Put,
    /// POST
    Post,
    /// DELETE
    Delete,
}

impl Method {
    fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A request against the cluster, with the path kept as raw segments.
///
/// Segments are percent-encoded by the transport, so configuration object
/// names can be passed through as written in the record.
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteRequest {
    /// HTTP method
    pub method: Method,
    /// Path segments, unencoded (e.g. `["_ilm", "policy", "hot-warm"]`)
    pub segments: Vec<String>,
    /// Query parameters
    pub query: Vec<(String, String)>,
    /// JSON body, if any
    pub body: Option<Value>,
}

impl RemoteRequest {
    fn new(method: Method, segments: &[&str]) -> Self {
        Self {
            method,
            segments: segments.iter().map(|s| s.to_string()).collect(),
            query: Vec::new(),
            body: None,
        }
    }

    /// GET request
    pub fn get(segments: &[&str]) -> Self {
        Self::new(Method::Get, segments)
    }

    /// PUT request with a JSON body
    pub fn put(segments: &[&str], body: Value) -> Self {
        Self::new(Method::Put, segments).body(body)
    }

    /// POST request with a JSON body
    pub fn post(segments: &[&str], body: Value) -> Self {
        Self::new(Method::Post, segments).body(body)
    }

    /// DELETE request
    pub fn delete(segments: &[&str]) -> Self {
        Self::new(Method::Delete, segments)
    }

    /// Set the body
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Append a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Unencoded path, for logs and error messages
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    /// `METHOD /path`, as used in error messages
    pub fn describe(&self) -> String {
        format!("{} {}", self.method, self.path())
    }
}

/// Status and body of a cluster response
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw body
    pub body: String,
}

impl RemoteResponse {
    /// Build a response
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 404
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_str(&self.body).map_err(Error::from)
    }

    /// Turn a non-2xx response into a [`Error::RemoteApi`]
    pub fn error_for(self, request: &RemoteRequest) -> Result<Self, Error> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::remote_api(request.describe(), self.status, self.body))
        }
    }
}

/// Sends requests to one cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterTransport: Send + Sync {
    /// Send a request and return the response, whatever its status.
    ///
    /// Errors only when no response could be obtained (DNS, TLS, timeout).
    async fn send(&self, request: RemoteRequest) -> Result<RemoteResponse, Error>;
}

/// TLS and timeout settings applied to every cluster client
#[derive(Clone, Debug)]
pub struct TransportOptions {
    /// Skip certificate verification when the cluster supplies no CA bundle
    pub allow_insecure_tls: bool,
    /// Whole-request timeout and idle connection timeout
    pub request_timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            allow_insecure_tls: true,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// reqwest-backed transport with basic authentication
pub struct HttpTransport {
    client: reqwest::Client,
    base: Url,
    username: String,
    password: String,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Don't expose the password in debug output
        f.debug_struct("HttpTransport")
            .field("base", &self.base.as_str())
            .field("username", &self.username)
            .finish()
    }
}

impl HttpTransport {
    /// Build a transport for `endpoint`.
    ///
    /// With a CA bundle the server certificate is verified against it. Without
    /// one, verification is skipped if `options.allow_insecure_tls` is set and
    /// the system roots are used otherwise.
    pub fn new(
        endpoint: &str,
        username: impl Into<String>,
        password: impl Into<String>,
        ca_pem: Option<&[u8]>,
        options: &TransportOptions,
    ) -> Result<Self, Error> {
        let base = Url::parse(endpoint)
            .map_err(|e| Error::configuration(format!("invalid endpoint {endpoint}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(Error::configuration(format!(
                "invalid endpoint {endpoint}: not a base URL"
            )));
        }

        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(options.request_timeout)
            .pool_idle_timeout(options.request_timeout);

        match ca_pem {
            Some(pem) if !pem.is_empty() => {
                let cert = reqwest::Certificate::from_pem(pem)
                    .map_err(|e| Error::connection(format!("invalid CA certificate: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            _ if options.allow_insecure_tls => {
                warn!(
                    endpoint = %endpoint,
                    "No CA certificate supplied, skipping TLS certificate verification"
                );
                builder = builder.danger_accept_invalid_certs(true);
            }
            _ => {
                debug!(endpoint = %endpoint, "No CA certificate supplied, using system roots");
            }
        }

        let client = builder
            .build()
            .map_err(|e| Error::connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base,
            username: username.into(),
            password: password.into(),
        })
    }

    /// Full URL for a request, with segments percent-encoded
    fn url_for(&self, request: &RemoteRequest) -> Result<Url, Error> {
        let mut url = self.base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                Error::configuration(format!("invalid endpoint {}: not a base URL", self.base))
            })?;
            segments.pop_if_empty().extend(request.segments.iter());
        }
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url)
    }
}

#[async_trait]
impl ClusterTransport for HttpTransport {
    async fn send(&self, request: RemoteRequest) -> Result<RemoteResponse, Error> {
        let url = self.url_for(&request)?;

        let mut builder = self
            .client
            .request(request.method.into(), url)
            .basic_auth(&self.username, Some(&self.password));
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::connection(format!("{} failed: {e}", request.describe())))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            Error::connection(format!("{} failed reading body: {e}", request.describe()))
        })?;

        debug!(request = %request.describe(), status, "cluster responded");
        Ok(RemoteResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transport(endpoint: &str) -> HttpTransport {
        HttpTransport::new(endpoint, "elastic", "s3cret", None, &TransportOptions::default())
            .unwrap()
    }

    #[test]
    fn describe_uses_raw_segments() {
        let req = RemoteRequest::put(&["_ilm", "policy", "hot-warm"], json!({}));
        assert_eq!(req.describe(), "PUT /_ilm/policy/hot-warm");
        assert_eq!(RemoteRequest::get(&[]).path(), "/");
    }

    #[test]
    fn names_are_percent_encoded() {
        let t = transport("https://search.example.com:9200");
        let req = RemoteRequest::delete(&["_snapshot", "nightly backups/v1"]);
        let url = t.url_for(&req).unwrap();
        assert_eq!(url.path(), "/_snapshot/nightly%20backups%2Fv1");
    }

    #[test]
    fn endpoint_path_prefix_and_query_are_kept() {
        let t = transport("https://proxy.example.com/search/");
        let req = RemoteRequest::put(&["_plugins", "_ism", "policies", "p"], json!({}))
            .query("if_seq_no", 7)
            .query("if_primary_term", 1);
        let url = t.url_for(&req).unwrap();
        assert_eq!(url.path(), "/search/_plugins/_ism/policies/p");
        assert_eq!(url.query(), Some("if_seq_no=7&if_primary_term=1"));
    }

    #[test]
    fn invalid_endpoint_is_configuration_error() {
        let err = HttpTransport::new(
            "not a url",
            "elastic",
            "pw",
            None,
            &TransportOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn strict_tls_without_ca_still_builds() {
        let options = TransportOptions {
            allow_insecure_tls: false,
            ..Default::default()
        };
        assert!(HttpTransport::new("https://localhost:9200", "u", "p", None, &options).is_ok());
    }

    #[test]
    fn debug_hides_password() {
        let t = transport("https://localhost:9200");
        let out = format!("{t:?}");
        assert!(!out.contains("s3cret"));
        assert!(out.contains("elastic"));
    }

    #[test]
    fn error_for_keeps_status_and_body() {
        let req = RemoteRequest::put(&["_index_template", "logs"], json!({}));
        let err = RemoteResponse::new(500, "boom").error_for(&req).unwrap_err();
        assert!(matches!(err, Error::RemoteApi { status: 500, ref body, .. } if body == "boom"));
        assert!(RemoteResponse::new(201, "{}").error_for(&req).is_ok());
    }
}
