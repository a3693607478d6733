//! Request and response bodies exchanged with the sandbox gateway

use serde::{Deserialize, Serialize};

/// Sandbox creation response
#[derive(Debug, Deserialize)]
pub struct CreateSandboxResponse {
    pub id: String,
}

/// Code execution request
#[derive(Debug, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub code: String, // Base64 encoded source text
}

/// Code execution response
#[derive(Debug, Deserialize)]
pub struct ExecuteResponse {
    pub execution_id: String,
}

/// File download response
#[derive(Debug, Deserialize)]
pub struct DownloadResponse {
    pub content: String, // Base64 encoded file bytes
}

/// Endpoint paths, relative to the configured base URL
pub mod paths {
    /// `POST` creates a sandbox
    pub const SANDBOXES: &str = "/vms";

    pub fn execute(sandbox_id: &str) -> String {
        format!("/vms/{}/gateway/execute", sandbox_id)
    }

    pub fn events(sandbox_id: &str, execution_id: &str) -> String {
        format!(
            "/vms/{}/gateway/executions/{}/events",
            sandbox_id, execution_id
        )
    }

    /// `file_path` is appended verbatim
    pub fn download(sandbox_id: &str, execution_id: &str, file_path: &str) -> String {
        format!(
            "/vms/{}/gateway/executions/{}/download/{}",
            sandbox_id, execution_id, file_path
        )
    }
}
