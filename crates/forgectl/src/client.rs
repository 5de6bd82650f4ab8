//! HTTP client for forged.
//!
//! Communicates with forged via its local HTTP API: a `reqwest`-backed
//! client with a readiness probe that backs off exponentially while the
//! daemon is still starting up, and an error taxonomy describing each
//! failure mode a caller can act on (connection refused, auth, not found).

use forge_core::ResumableWorkflow;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("daemon not running at {addr}\n  → start with: forged\n  → or set FORGED_ADDR if using a different address")]
    ConnectionFailed { addr: String },

    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("unauthorized: check FORGED_TOKEN env var or --token flag")]
    Unauthorized,

    #[error(
        "daemon not ready after {timeout_ms}ms at {addr}\n  → ensure forged is running\n  → check FORGED_TOKEN if auth is enabled"
    )]
    DaemonNotReady { addr: String, timeout_ms: u64 },
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            let addr = e.url().map(|u| u.to_string()).unwrap_or_else(|| "unknown".to_string());
            ClientError::ConnectionFailed { addr }
        } else {
            ClientError::HttpError {
                status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                message: e.to_string(),
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct StartWorkflowRequest<'a> {
    request: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct StartWorkflowResponse {
    pub ok: bool,
    pub message: String,
    pub workflow_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RunResponse {
    pub ok: bool,
    pub message: String,
    pub workflow_id: String,
    pub failed_agent: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListWorkflowsResponse {
    pub workflow_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct GetWorkflowResponse {
    pub workflow_id: String,
    pub artifacts: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Default total timeout for daemon readiness probe.
const DEFAULT_READY_TIMEOUT_MS: u64 = 5000;

/// Initial backoff delay for readiness probe.
const INITIAL_BACKOFF_MS: u64 = 200;

/// HTTP client for forged.
pub struct Client {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl Client {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
            http: reqwest::Client::new(),
        }
    }

    pub fn addr(&self) -> &str {
        &self.base_url
    }

    pub async fn check_health(&self) -> Result<bool, ClientError> {
        let url = format!("{}/health", self.base_url);
        let response = self.http.get(&url).headers(self.headers()).send().await?;
        Ok(response.status().is_success())
    }

    /// Probe `/health` with exponential backoff starting at 200ms, for up to
    /// `timeout_ms` total.
    pub async fn wait_for_ready_with_timeout(&self, timeout_ms: u64) -> Result<(), ClientError> {
        let start = std::time::Instant::now();
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            match self.check_health().await {
                Ok(true) => return Ok(()),
                Ok(false) | Err(_) => {
                    let elapsed = start.elapsed().as_millis() as u64;
                    if elapsed >= timeout_ms {
                        return Err(ClientError::DaemonNotReady { addr: self.base_url.clone(), timeout_ms });
                    }
                    eprintln!("waiting for daemon at {} (retrying in {}ms)", self.base_url, backoff_ms);
                    let remaining = timeout_ms.saturating_sub(elapsed);
                    let sleep_ms = backoff_ms.min(remaining);
                    tokio::time::sleep(std::time::Duration::from_millis(sleep_ms)).await;
                    backoff_ms = backoff_ms.saturating_mul(2);
                }
            }
        }
    }

    pub async fn wait_for_ready(&self) -> Result<(), ClientError> {
        self.wait_for_ready_with_timeout(DEFAULT_READY_TIMEOUT_MS).await
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = &self.token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        headers
    }

    async fn handle_error(&self, response: reqwest::Response) -> ClientError {
        let status = response.status().as_u16();
        if status == 401 {
            return ClientError::Unauthorized;
        }
        if status == 404 {
            return ClientError::WorkflowNotFound("resource not found".to_string());
        }
        let message =
            response.json::<ErrorResponse>().await.map(|e| e.error).unwrap_or_else(|_| "unknown error".to_string());
        ClientError::HttpError { status, message }
    }

    /// POST /workflows
    pub async fn start_workflow(&self, request: &str) -> Result<StartWorkflowResponse, ClientError> {
        let url = format!("{}/workflows", self.base_url);
        let response =
            self.http.post(&url).headers(self.headers()).json(&StartWorkflowRequest { request }).send().await?;
        if !response.status().is_success() && response.status().as_u16() != 200 {
            return Err(self.handle_error(response).await);
        }
        response.json().await.map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    /// GET /workflows
    pub async fn list_workflows(&self) -> Result<Vec<String>, ClientError> {
        let url = format!("{}/workflows", self.base_url);
        let response = self.http.get(&url).headers(self.headers()).send().await?;
        if !response.status().is_success() {
            return Err(self.handle_error(response).await);
        }
        let body: ListWorkflowsResponse =
            response.json().await.map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        Ok(body.workflow_ids)
    }

    /// GET /workflows/resumable
    pub async fn list_resumable(&self) -> Result<Vec<ResumableWorkflow>, ClientError> {
        let url = format!("{}/workflows/resumable", self.base_url);
        let response = self.http.get(&url).headers(self.headers()).send().await?;
        if !response.status().is_success() {
            return Err(self.handle_error(response).await);
        }
        response.json().await.map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    /// GET /workflows/{id}
    pub async fn get_workflow(&self, workflow_id: &str) -> Result<GetWorkflowResponse, ClientError> {
        let url = format!("{}/workflows/{}", self.base_url, workflow_id);
        let response = self.http.get(&url).headers(self.headers()).send().await?;
        if !response.status().is_success() {
            return Err(self.handle_error(response).await);
        }
        response.json().await.map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    /// POST /workflows/{id}/run
    pub async fn run_workflow(&self, workflow_id: &str) -> Result<RunResponse, ClientError> {
        let url = format!("{}/workflows/{}/run", self.base_url, workflow_id);
        let response = self.http.post(&url).headers(self.headers()).send().await?;
        if !response.status().is_success() {
            return Err(self.handle_error(response).await);
        }
        response.json().await.map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    /// POST /workflows/{id}/resume
    pub async fn resume_workflow(&self, workflow_id: &str) -> Result<RunResponse, ClientError> {
        let url = format!("{}/workflows/{}/resume", self.base_url, workflow_id);
        let response = self.http.post(&url).headers(self.headers()).send().await?;
        if !response.status().is_success() {
            return Err(self.handle_error(response).await);
        }
        response.json().await.map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    /// GET /workflows/{id}/logs
    pub async fn get_logs(&self, workflow_id: &str) -> Result<serde_json::Value, ClientError> {
        let url = format!("{}/workflows/{}/logs", self.base_url, workflow_id);
        let response = self.http.get(&url).headers(self.headers()).send().await?;
        if !response.status().is_success() {
            return Err(self.handle_error(response).await);
        }
        response.json().await.map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    /// GET /workflows/{id}/logs/stream (SSE), for `forgectl logs --follow`.
    pub async fn stream_logs(&self, workflow_id: &str) -> Result<(), ClientError> {
        use futures::StreamExt;

        let url = format!("{}/workflows/{}/logs/stream", self.base_url, workflow_id);
        let response = self.http.get(&url).headers(self.headers()).send().await?;
        if !response.status().is_success() {
            return Err(self.handle_error(response).await);
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(end) = buffer.find("\n\n") {
                let event_str = buffer[..end].to_string();
                buffer = buffer[end + 2..].to_string();
                if let Some(data) = parse_sse_data(&event_str) {
                    println!("{data}");
                }
            }
        }
        Ok(())
    }
}

/// Extract the `data:` payload from one SSE event block.
fn parse_sse_data(event_str: &str) -> Option<String> {
    for line in event_str.lines() {
        if let Some(value) = line.strip_prefix("data:") {
            return Some(value.trim().to_string());
        }
    }
    None
}
