//! Remote sandbox VMs and code submission

use std::sync::Arc;

use reqwest::Method;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::api::{paths, ExecuteRequest, ExecuteResponse};
use crate::client::SandboxClient;
use crate::encoding::encode_code;
use crate::error::{SandboxError, SandboxResult};
use crate::events::LogSubscription;
use crate::execution::Execution;

/// Result of [`Sandbox::run_code`]
#[derive(Debug)]
pub struct RunOutcome {
    pub execution: Execution,
    /// Live log stream, or why it could not be opened. A failure here does not
    /// affect the execution itself, which still runs on the server.
    pub subscription: SandboxResult<LogSubscription>,
}

impl RunOutcome {
    pub fn has_live_logs(&self) -> bool {
        self.subscription.is_ok()
    }
}

/// One remote VM.
///
/// Clones refer to the same sandbox and share its current-execution slot.
#[derive(Debug, Clone)]
pub struct Sandbox {
    id: String,
    client: SandboxClient,
    current_execution: Arc<RwLock<Option<Execution>>>,
}

impl Sandbox {
    pub(crate) fn new(id: String, client: SandboxClient) -> Self {
        Self {
            id,
            client,
            current_execution: Arc::new(RwLock::new(None)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The client this sandbox was created through
    pub fn client(&self) -> &SandboxClient {
        &self.client
    }

    /// The most recently started execution.
    ///
    /// Only one is tracked; each `run_code` call overwrites it, and concurrent
    /// calls race with the last writer winning.
    pub async fn current_execution(&self) -> Option<Execution> {
        self.current_execution.read().await.clone()
    }

    /// Handle for an execution started earlier, e.g. to download its files.
    ///
    /// The handle has no subscription and starts with empty logs.
    pub fn execution(&self, execution_id: impl Into<String>) -> Execution {
        Execution::new(execution_id.into(), self.id.clone(), self.client.clone())
    }

    /// Submit source code for execution.
    ///
    /// Returns once the server has accepted the code and the log stream was
    /// opened or failed to open. It does not wait for the code to finish.
    pub async fn run_code(&self, code: &str) -> SandboxResult<RunOutcome> {
        let url = self.client.url_for(&paths::execute(&self.id));
        info!("Running code in sandbox {}", self.id);

        let body = serde_json::to_vec(&ExecuteRequest {
            code: encode_code(code),
        })?;
        let response: ExecuteResponse = self
            .client
            .send_json(Method::POST, &url, Some(body))
            .await?;
        if response.execution_id.is_empty() {
            return Err(SandboxError::invalid_response("Execution id is empty"));
        }
        debug!(
            "Sandbox {} accepted execution {}",
            self.id, response.execution_id
        );

        let execution = Execution::new(response.execution_id, self.id.clone(), self.client.clone());
        *self.current_execution.write().await = Some(execution.clone());

        let subscription = execution.subscribe_logs().await;
        if let Err(e) = &subscription {
            warn!(
                "Live logs unavailable for execution {}: {}",
                execution.id(),
                e
            );
        }

        Ok(RunOutcome {
            execution,
            subscription,
        })
    }
}
