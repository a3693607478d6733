//! Sandbox client error types
use reqwest::StatusCode;
use thiserror::Error;

/// Result type for sandbox client operations
pub type SandboxResult<T> = Result<T, SandboxError>;

/// Errors surfaced by the sandbox client
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The server answered with a non-success status. The body is not inspected.
    ///
    /// `status_text` is the registered reason for the code (`429` is always
    /// `Too Many Requests`). A custom phrase on the status line is not kept.
    #[error("Request failed: {status} {status_text}")]
    RequestFailed { status: u16, status_text: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Subscription error: {0}")]
    Subscription(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] base64::DecodeError),
}

impl SandboxError {
    /// Build a `RequestFailed` error from a response status
    pub fn request_failed(status: StatusCode) -> Self {
        Self::RequestFailed {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
        }
    }

    /// Create an invalid response error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Create a subscription error
    pub fn subscription(msg: impl Into<String>) -> Self {
        Self::Subscription(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// HTTP status carried by a `RequestFailed` error
    pub fn status(&self) -> Option<u16> {
        match self {
            SandboxError::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if the server rejected the request
    pub fn is_request_failed(&self) -> bool {
        matches!(self, SandboxError::RequestFailed { .. })
    }

    /// Check if this is a network-level failure
    pub fn is_transport_error(&self) -> bool {
        matches!(self, SandboxError::Transport(_))
    }
}
