//! A single code run inside a sandbox

use std::sync::Arc;

use reqwest::Method;
use tokio::sync::RwLock;
use tracing::debug;

use crate::api::{paths, DownloadResponse};
use crate::client::SandboxClient;
use crate::error::SandboxResult;
use crate::events::{LogEvent, LogStream, LogSubscription};

pub(crate) type SharedLogs = Arc<RwLock<ExecutionLogs>>;

/// Output collected from an execution's event stream, in arrival order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionLogs {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl ExecutionLogs {
    pub(crate) fn push(&mut self, event: &LogEvent) {
        match event.stream {
            LogStream::Stdout => self.stdout.push(event.data.clone()),
            LogStream::Stderr => self.stderr.push(event.data.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty()
    }
}

/// Handle to one execution.
///
/// Clones share the same log buffer. The buffer only grows while a
/// [`LogSubscription`] for this execution is running, and the server gives no
/// completion signal: logs read before the stream ends may be incomplete.
#[derive(Debug, Clone)]
pub struct Execution {
    id: String,
    sandbox_id: String,
    client: SandboxClient,
    logs: SharedLogs,
}

impl Execution {
    pub(crate) fn new(id: String, sandbox_id: String, client: SandboxClient) -> Self {
        Self {
            id,
            sandbox_id,
            client,
            logs: Arc::new(RwLock::new(ExecutionLogs::default())),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Id of the sandbox this execution runs in
    pub fn sandbox_id(&self) -> &str {
        &self.sandbox_id
    }

    /// Snapshot of the output received so far
    pub async fn logs(&self) -> ExecutionLogs {
        self.logs.read().await.clone()
    }

    /// Open a new event stream for this execution.
    ///
    /// Events delivered on it are appended to this execution's logs, after
    /// whatever earlier subscriptions already collected.
    pub async fn subscribe_logs(&self) -> SandboxResult<LogSubscription> {
        LogSubscription::open(&self.client, &self.sandbox_id, &self.id, self.logs.clone()).await
    }

    /// Download a file written by the execution.
    ///
    /// Returns the server's base64 `content` unchanged; use
    /// [`decode_content`](crate::decode_content) for the raw bytes. `path` is
    /// appended to the URL as given, without escaping.
    pub async fn download_file(&self, path: &str) -> SandboxResult<String> {
        let url = self
            .client
            .url_for(&paths::download(&self.sandbox_id, &self.id, path));
        debug!("Downloading {} from execution {}", path, self.id);

        let response: DownloadResponse = self.client.send_json(Method::GET, &url, None).await?;
        Ok(response.content)
    }
}
