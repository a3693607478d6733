//! Client configuration
//!
//! `ClientConfig` is an explicit value handed to [`SandboxClient::new`](crate::SandboxClient::new).
//! Nothing in this crate reads the process environment; entry points that want
//! `THIRI_API_KEY` / `THIRI_API_BASE` go through the `thiri-config` package.

use std::fmt;
use std::time::Duration;

use crate::error::{SandboxError, SandboxResult};

/// Base URL used when none is configured
pub const DEFAULT_BASE_URL: &str = "https://admin.thiri.dev/api";

/// Header carrying the API key on every request
pub const API_KEY_HEADER: &str = "X-THIRI-KEY";

/// Wait applied after a sandbox is created and before it is handed back
pub const DEFAULT_READINESS_DELAY: Duration = Duration::from_secs(1);

/// What `create_sandbox` does between the server accepting the VM and returning it.
///
/// The server exposes no readiness endpoint, so the default is a blunt fixed
/// delay. It gives the VM time to settle; it does not prove the VM is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Sleep for the given duration
    FixedDelay(Duration),
    /// Return immediately
    None,
}

impl Default for Readiness {
    fn default() -> Self {
        Readiness::FixedDelay(DEFAULT_READINESS_DELAY)
    }
}

/// Connection settings for a [`SandboxClient`](crate::SandboxClient)
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Opaque API credential
    pub api_key: String,

    /// Prefix for every endpoint URL, used verbatim
    pub base_url: String,

    /// Post-creation wait strategy
    pub readiness: Readiness,

    /// Whole-request timeout. `None` leaves the transport default (no timeout).
    pub request_timeout: Option<Duration>,

    /// Connect timeout. `None` leaves the transport default.
    pub connect_timeout: Option<Duration>,
}

impl ClientConfig {
    /// Configuration for the default service endpoint
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            readiness: Readiness::default(),
            request_timeout: None,
            connect_timeout: None,
        }
    }

    /// Start building a configuration
    pub fn builder(api_key: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::new(api_key),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> SandboxResult<()> {
        if self.api_key.is_empty() {
            return Err(SandboxError::config("API key is required"));
        }
        if self.base_url.is_empty() {
            return Err(SandboxError::config("Base URL is required"));
        }
        Ok(())
    }
}

// Keep the credential out of logs and panic messages
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("readiness", &self.readiness)
            .field("request_timeout", &self.request_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Builder for [`ClientConfig`]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Set the post-creation wait strategy
    pub fn readiness(mut self, readiness: Readiness) -> Self {
        self.config.readiness = readiness;
        self
    }

    /// Set a whole-request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    /// Set a connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> SandboxResult<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
