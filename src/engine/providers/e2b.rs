// Scout Engine — E2B code-interpreter sandbox client.
// Grounded on `chat/tools/execute_python.py`, which drives the sandbox
// through the `e2b_code_interpreter` SDK. This client talks to E2B's
// REST surface directly: creating a sandbox, running one code cell
// against its code-interpreter endpoint, and tearing it down.

use crate::atoms::error::{EngineError, EngineResult};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const API_BASE: &str = "https://api.e2b.dev";
pub const EXECUTION_TIMEOUT_SECS: u64 = 600;

pub struct E2bSandbox {
    client: reqwest::Client,
    api_key: String,
    sandbox_id: String,
}

/// One result cell from a `run_code` call — mirrors the original's
/// `execution.results[i]` rich-output shape.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CellResult {
    #[serde(default)]
    pub png: Option<String>,
    #[serde(default)]
    pub jpeg: Option<String>,
    #[serde(default)]
    pub svg: Option<String>,
    #[serde(default)]
    pub pdf: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub markdown: Option<String>,
    #[serde(default)]
    pub json: Option<serde_json::Value>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Execution {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub results: Vec<CellResult>,
    #[serde(default)]
    pub error: Option<String>,
}

impl E2bSandbox {
    /// Create a fresh sandbox. Callers reuse the returned handle for every
    /// `execute_python` call within one React Loop (spec §4.4.2), creating
    /// it lazily on first use.
    pub async fn create(api_key: &str) -> EngineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client");

        let response = client
            .post(format!("{API_BASE}/sandboxes"))
            .header("X-API-Key", api_key)
            .json(&json!({ "templateID": "code-interpreter-v1", "timeout": EXECUTION_TIMEOUT_SECS }))
            .send()
            .await
            .map_err(|e| EngineError::provider("e2b", format!("failed to create sandbox: {e}")))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::provider("e2b", format!("sandbox creation failed: {body}")));
        }

        #[derive(Deserialize)]
        struct CreateResponse {
            #[serde(rename = "sandboxID")]
            sandbox_id: String,
        }
        let created: CreateResponse = response.json().await?;

        Ok(E2bSandbox { client, api_key: api_key.to_string(), sandbox_id: created.sandbox_id })
    }

    /// Run one code cell. The execution timeout is 10 minutes (spec §4.4.2).
    pub async fn run_code(&self, code: &str) -> EngineResult<Execution> {
        let response = self
            .client
            .post(format!("{API_BASE}/sandboxes/{}/code/execute", self.sandbox_id))
            .header("X-API-Key", &self.api_key)
            .timeout(Duration::from_secs(EXECUTION_TIMEOUT_SECS))
            .json(&json!({ "code": code }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EngineError::provider("e2b", "execution timed out after 600 seconds")
                } else {
                    EngineError::provider("e2b", format!("network error: {e}"))
                }
            })?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::provider("e2b", format!("execution failed: {body}")));
        }

        Ok(response.json().await?)
    }

    pub async fn kill(self) -> EngineResult<()> {
        let response = self
            .client
            .delete(format!("{API_BASE}/sandboxes/{}", self.sandbox_id))
            .header("X-API-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| EngineError::provider("e2b", format!("failed to kill sandbox: {e}")))?;
        if !response.status().is_success() {
            log::warn!("e2b sandbox teardown returned {}", response.status());
        }
        Ok(())
    }
}
