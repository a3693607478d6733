//! Thiri Sandbox SDK
//!
//! Client for the Thiri remote code-execution service: create a sandbox VM,
//! run code in it, follow its stdout/stderr live, and download files it wrote.
//!
//! ```no_run
//! use thiri_sdk::{decode_content, ClientConfig, SandboxClient};
//!
//! # async fn run() -> thiri_sdk::SandboxResult<()> {
//! let client = SandboxClient::new(ClientConfig::new("my-api-key"))?;
//! let sandbox = client.create_sandbox().await?;
//!
//! let outcome = sandbox.run_code("print('hello')").await?;
//! if let Ok(mut logs) = outcome.subscription {
//!     while let Some(event) = logs.recv().await {
//!         println!("[{}] {}", event.stream, event.data);
//!     }
//! }
//!
//! let png = decode_content(&outcome.execution.download_file("out.png").await?)?;
//! # let _ = png;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod encoding;
pub mod error;
pub mod events;
pub mod execution;
pub mod sandbox;

// Re-export commonly used types
pub use client::{RequestOptions, SandboxClient};
pub use config::{ClientConfig, ClientConfigBuilder, Readiness, API_KEY_HEADER, DEFAULT_BASE_URL};
pub use encoding::{decode_content, encode_bytes, encode_code};
pub use error::{SandboxError, SandboxResult};
pub use events::{LogEvent, LogStream, LogSubscription, SseDecoder, SseEvent};
pub use execution::{Execution, ExecutionLogs};
pub use sandbox::{RunOutcome, Sandbox};

// Re-exported so callers can build `RequestOptions` without a direct reqwest dependency
pub use reqwest::header;
pub use reqwest::Method;
