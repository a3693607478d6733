use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::api::{paths, CreateSandboxResponse};
use crate::config::{ClientConfig, Readiness};
use crate::error::{SandboxError, SandboxResult};
use crate::sandbox::Sandbox;

fn api_key_header() -> HeaderName {
    HeaderName::from_static("x-thiri-key")
}

/// Options for [`SandboxClient::make_request`]
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<Value>,
    /// May override `Content-Type`. An API-key header set here is replaced.
    pub headers: HeaderMap,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            body: None,
            headers: HeaderMap::new(),
        }
    }

    /// Set a JSON body
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Add a header, replacing any previous value
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::new(Method::GET)
    }
}

struct ClientInner {
    http_client: Client,
    config: ClientConfig,
    api_key: HeaderValue,
}

/// Entry point to the sandbox service.
///
/// Cloning is cheap and every clone refers to the same client; sandboxes and
/// executions keep such a clone as their back-reference.
#[derive(Clone)]
pub struct SandboxClient {
    inner: Arc<ClientInner>,
}

impl SandboxClient {
    /// Create a new client
    pub fn new(config: ClientConfig) -> SandboxResult<Self> {
        config.validate()?;

        let mut api_key = HeaderValue::from_str(&config.api_key)
            .map_err(|_| SandboxError::config("API key contains invalid header characters"))?;
        api_key.set_sensitive(true);

        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let http_client = builder.build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                config,
                api_key,
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Whether both handles refer to the same client
    pub fn ptr_eq(&self, other: &SandboxClient) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Full URL for an endpoint path. Plain concatenation, no normalisation.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.inner.config.base_url, path)
    }

    /// Request builder carrying the JSON content type and the API key
    pub(crate) fn authorized(&self, method: Method, url: &str) -> RequestBuilder {
        self.inner
            .http_client
            .request(method, url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(api_key_header(), self.inner.api_key.clone())
    }

    /// Send an authorized request and parse a JSON success body
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> SandboxResult<T> {
        let mut request = self.authorized(method, url);
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            debug!("Request to {} failed with {}", url, status);
            return Err(SandboxError::request_failed(status));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| SandboxError::invalid_response(e.to_string()))
    }

    /// Issue an arbitrary authorized request against the service.
    ///
    /// Returns the parsed JSON body, or `Value::Null` when the body is empty.
    pub async fn make_request(&self, path: &str, options: RequestOptions) -> SandboxResult<Value> {
        let url = self.url_for(path);
        debug!("Making {} request to {}", options.method, url);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.extend(options.headers);
        headers.insert(api_key_header(), self.inner.api_key.clone());

        let mut request = self
            .inner
            .http_client
            .request(options.method, &url)
            .headers(headers);
        if let Some(body) = &options.body {
            request = request.body(serde_json::to_vec(body)?);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            debug!("Request to {} failed with {}", url, status);
            return Err(SandboxError::request_failed(status));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| SandboxError::invalid_response(e.to_string()))
    }

    /// Create a new sandbox VM.
    ///
    /// After the server accepts the request the configured [`Readiness`]
    /// strategy runs before the sandbox is returned.
    pub async fn create_sandbox(&self) -> SandboxResult<Sandbox> {
        info!("Creating sandbox");
        let url = self.url_for(paths::SANDBOXES);

        let created: CreateSandboxResponse = self.send_json(Method::POST, &url, None).await?;
        if created.id.is_empty() {
            return Err(SandboxError::invalid_response("Sandbox id is empty"));
        }
        info!("Sandbox created with ID: {}", created.id);

        if let Readiness::FixedDelay(delay) = self.inner.config.readiness {
            debug!("Waiting {:?} for sandbox {} to settle", delay, created.id);
            tokio::time::sleep(delay).await;
        }

        Ok(Sandbox::new(created.id, self.clone()))
    }

    /// Handle for a sandbox that already exists, without contacting the server
    pub fn sandbox(&self, id: impl Into<String>) -> SandboxResult<Sandbox> {
        let id = id.into();
        if id.is_empty() {
            return Err(SandboxError::config("Sandbox id must not be empty"));
        }
        Ok(Sandbox::new(id, self.clone()))
    }
}

impl std::fmt::Debug for SandboxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxClient")
            .field("config", &self.inner.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(base_url: &str) -> SandboxClient {
        SandboxClient::new(ClientConfig::builder("key").base_url(base_url).build().unwrap()).unwrap()
    }

    #[test]
    fn test_url_for_is_plain_concatenation() {
        let client = test_client("https://example.test/api");
        assert_eq!(client.url_for("/vms"), "https://example.test/api/vms");
        assert_eq!(client.url_for("vms"), "https://example.test/apivms");

        let trailing = test_client("https://example.test/api/");
        assert_eq!(trailing.url_for("/vms"), "https://example.test/api//vms");
    }

    #[test]
    fn test_rejects_unusable_api_key() {
        assert!(SandboxClient::new(ClientConfig::new("")).is_err());

        let err = SandboxClient::new(ClientConfig::new("bad\nkey")).unwrap_err();
        assert!(matches!(err, SandboxError::Configuration(_)));
    }

    #[test]
    fn test_clones_share_identity() {
        let a = test_client("http://localhost");
        let b = a.clone();
        let c = test_client("http://localhost");
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
    }

    #[test]
    fn test_sandbox_handle_requires_id() {
        let client = test_client("http://localhost");
        assert!(client.sandbox("").is_err());

        let sandbox = client.sandbox("vm-1").unwrap();
        assert_eq!(sandbox.id(), "vm-1");
        assert!(sandbox.client().ptr_eq(&client));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let client = SandboxClient::new(ClientConfig::new("super-secret")).unwrap();
        assert!(!format!("{:?}", client).contains("super-secret"));
    }
}
