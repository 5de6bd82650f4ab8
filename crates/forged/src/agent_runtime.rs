//! The external agent runtime collaborator.
//!
//! `invoke_subagent(subagent_type, description, prompt) -> completion signal`.
//! The coordinator never parses the subagent's output for control; it only
//! cares whether the call completed and, afterward, whether the artifact it
//! was supposed to produce exists and validates (C2). This module is the
//! thin boundary that actually runs the external process; everything about
//! *what* the process does is opaque to it.

use forge_core::{ForgeError, WorkflowId};
use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

pub type Result<T> = std::result::Result<T, ForgeError>;
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe so the coordinator can hold one runtime behind an `Arc<dyn
/// AgentRuntime>` and fan it out across the parallel validator cluster.
/// `timeout` is supplied by the caller per invocation (a pipeline stage's
/// `timeout_sec` from the registry; the alignment validator's own configured
/// timeout) rather than fixed once for the whole runtime, since the
/// registry enumerates timeout as a per-stage option.
pub trait AgentRuntime: Send + Sync {
    fn invoke_subagent<'a>(
        &'a self,
        workflow_id: &'a WorkflowId,
        subagent_type: &'a str,
        description: &'a str,
        prompt: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<()>>;
}

/// Drives the configured `agent_cli_bin` as a subprocess: the subagent type
/// and description are passed as arguments, the prompt on stdin. Retries on
/// failure up to `retries` times with a fixed backoff, per configuration.
#[derive(Debug, Clone)]
pub struct ProcessAgentRuntime {
    pub bin: String,
    pub retries: u32,
    pub retry_backoff: Duration,
}

impl ProcessAgentRuntime {
    pub fn new(bin: String, retries: u32, retry_backoff: Duration) -> Self {
        Self { bin, retries, retry_backoff }
    }

    async fn run_once(
        &self,
        workflow_id: &WorkflowId,
        subagent_type: &str,
        description: &str,
        prompt: &str,
        timeout: Duration,
    ) -> Result<()> {
        let mut child = Command::new(&self.bin)
            .arg("--subagent-type")
            .arg(subagent_type)
            .arg("--description")
            .arg(description)
            .arg("--workflow-id")
            .arg(workflow_id.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ForgeError::AgentRuntimeFailure {
                workflow_id: workflow_id.clone(),
                agent: subagent_type.to_string(),
                detail: format!("failed to spawn {}: {e}", self.bin),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| ForgeError::AgentRuntimeFailure {
                    workflow_id: workflow_id.clone(),
                    agent: subagent_type.to_string(),
                    detail: format!("failed to write prompt to stdin: {e}"),
                })?;
        }

        let outcome = tokio::time::timeout(timeout, child.wait_with_output()).await;
        let output = match outcome {
            Ok(result) => result.map_err(|e| ForgeError::AgentRuntimeFailure {
                workflow_id: workflow_id.clone(),
                agent: subagent_type.to_string(),
                detail: format!("failed to collect process output: {e}"),
            })?,
            Err(_) => {
                return Err(ForgeError::StageTimeout {
                    workflow_id: workflow_id.clone(),
                    agent: subagent_type.to_string(),
                    timeout_sec: timeout.as_secs(),
                })
            }
        };

        if output.status.success() {
            return Ok(());
        }

        Err(ForgeError::AgentRuntimeFailure {
            workflow_id: workflow_id.clone(),
            agent: subagent_type.to_string(),
            detail: format!(
                "exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            ),
        })
    }

    async fn invoke_subagent_impl(
        &self,
        workflow_id: &WorkflowId,
        subagent_type: &str,
        description: &str,
        prompt: &str,
        timeout: Duration,
    ) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.run_once(workflow_id, subagent_type, description, prompt, timeout).await {
                Ok(()) => return Ok(()),
                Err(err @ ForgeError::StageTimeout { .. }) => return Err(err),
                Err(err) if attempt < self.retries => {
                    attempt += 1;
                    tracing::warn!(%workflow_id, agent = subagent_type, attempt, %err, "agent runtime call failed, retrying");
                    tokio::time::sleep(self.retry_backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl AgentRuntime for ProcessAgentRuntime {
    fn invoke_subagent<'a>(
        &'a self,
        workflow_id: &'a WorkflowId,
        subagent_type: &'a str,
        description: &'a str,
        prompt: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.invoke_subagent_impl(workflow_id, subagent_type, description, prompt, timeout))
    }
}
