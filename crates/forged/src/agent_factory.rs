//! Agent invocation factory (C6).
//!
//! Single dispatch point: given a pipeline stage and a workflow, load the
//! manifest plus required upstream artifacts, compose the invocation
//! prompt, hand it to the agent runtime, then verify the artifact the
//! subagent was supposed to produce actually exists and validates.

use crate::agent_runtime::AgentRuntime;
use crate::checkpoint::CheckpointEngine;
use crate::events::EventLogger;
use crate::store::ArtifactStore;
use forge_core::{prompt, schemas, ArtifactType, ForgeError, PipelineStage, WorkflowId};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, ForgeError>;

/// Outcome of a single stage invocation: `{status, output_artifact_path?}`.
#[derive(Debug, Clone)]
pub struct InvokeOutcome {
    pub status: ArtifactType,
    pub output_artifact_path: std::path::PathBuf,
}

#[derive(Clone)]
pub struct AgentFactory {
    store: ArtifactStore,
    checkpoint: CheckpointEngine,
    log_dir: std::path::PathBuf,
    runtime: Arc<dyn AgentRuntime>,
    default_model: String,
}

impl AgentFactory {
    pub fn new(
        store: ArtifactStore,
        checkpoint: CheckpointEngine,
        log_dir: std::path::PathBuf,
        runtime: Arc<dyn AgentRuntime>,
        default_model: String,
    ) -> Self {
        Self { store, checkpoint, log_dir, runtime, default_model }
    }

    /// Run one stage end to end: load inputs, compose the prompt, invoke
    /// the runtime, verify the produced artifact. `pipeline` is used only
    /// to produce the post-invocation checkpoint; it is the coordinator's
    /// full agent order.
    pub async fn invoke(
        &self,
        stage: &PipelineStage,
        workflow_id: &WorkflowId,
        completed_agents_before: &[forge_core::AgentName],
        pipeline: &[forge_core::AgentName],
    ) -> Result<InvokeOutcome> {
        let logger = EventLogger::new(&self.log_dir, workflow_id, &stage.agent_name);

        // Step 1: load manifest and upstream artifacts.
        let manifest = self.store.read_artifact(workflow_id, ArtifactType::Manifest)?;
        let request = manifest
            .get("request")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let mut upstream_paths = Vec::new();
        for upstream_type in &stage.required_upstream_artifacts {
            if !self.store.is_artifact_completed(workflow_id, *upstream_type) {
                return Err(ForgeError::MissingUpstreamArtifact {
                    workflow_id: workflow_id.clone(),
                    artifact_type: *upstream_type,
                });
            }
            upstream_paths.push((
                *upstream_type,
                self.store.workflow_dir(workflow_id).join(upstream_type.filename()),
            ));
        }

        // Step 2: progress tracker update, logged since there is no
        // separate in-flight artifact write for "in progress".
        logger.log_event(
            &format!("{}_started", stage.agent_name),
            json!({ "progress_pct": stage.progress_pct }),
        )?;

        // Step 3: compose description + prompt.
        let description = prompt::render_description(stage, &request);
        let upstream_refs: Vec<_> = upstream_paths
            .iter()
            .map(|(ty, path)| (*ty, path.as_path()))
            .collect();
        let output_path = self.store.workflow_dir(workflow_id).join(stage.produced_artifact_type.filename());
        let schema_source = schemas::schema_source(stage.produced_artifact_type);
        let model_hint = match stage.optional_model_hint {
            Some(hint) => hint.to_string(),
            None => self.default_model.clone(),
        };
        let full_prompt = prompt::render_prompt(stage, &upstream_refs, &output_path, schema_source, &model_hint);

        // Step 4: hand off to the agent runtime and await completion.
        let invocation_result = self
            .runtime
            .invoke_subagent(
                workflow_id,
                &stage.agent_name,
                &description,
                &full_prompt,
                std::time::Duration::from_secs(stage.timeout_sec),
            )
            .await;

        if let Err(err) = invocation_result {
            logger.log_error(&err.to_string(), None)?;
            self.write_error_artifact(workflow_id, stage.produced_artifact_type, &err)?;
            return Err(err);
        }

        // Step 5: verify the output exists and validates.
        let verification =
            self.verify_output(workflow_id, &stage.agent_name, stage.produced_artifact_type, &output_path);
        if let Err(err) = &verification {
            logger.log_error(&err.to_string(), None)?;
            self.write_error_artifact(workflow_id, stage.produced_artifact_type, err)?;
        }
        verification?;

        // Step 6: completion log, checkpoint.
        logger.log_event(
            &format!("{}_completed", stage.agent_name),
            json!({ "output": stage.produced_artifact_type.filename() }),
        )?;

        let mut completed_agents = completed_agents_before.to_vec();
        completed_agents.push(stage.agent_name.clone());
        let artifacts_created: Vec<String> = self
            .store
            .list_artifacts(workflow_id)?
            .into_iter()
            .map(|ty| ty.filename())
            .collect();
        self.checkpoint
            .create_checkpoint(workflow_id, pipeline, completed_agents, artifacts_created)?;

        Ok(InvokeOutcome {
            status: stage.produced_artifact_type,
            output_artifact_path: output_path,
        })
    }

    fn verify_output(
        &self,
        workflow_id: &WorkflowId,
        agent_name: &str,
        artifact_type: ArtifactType,
        output_path: &Path,
    ) -> Result<()> {
        if !output_path.exists() {
            return Err(ForgeError::AgentRuntimeFailure {
                workflow_id: workflow_id.clone(),
                agent: agent_name.to_string(),
                detail: "subagent completed without producing the expected artifact".to_string(),
            });
        }
        // The subagent writes its artifact directly to this path, not
        // through the store's create-exclusive `write_artifact`, so nothing
        // has validated it yet. Read the file it actually wrote and check it
        // against the schema ourselves.
        let raw = std::fs::read_to_string(output_path)?;
        let value: serde_json::Value = serde_json::from_str(&raw)?;
        schemas::validate(artifact_type, &value).map_err(|detail| ForgeError::SchemaViolation {
            workflow_id: workflow_id.clone(),
            artifact_type,
            detail,
        })
    }

    fn write_error_artifact(
        &self,
        workflow_id: &WorkflowId,
        artifact_type: ArtifactType,
        err: &ForgeError,
    ) -> Result<()> {
        self.store.write_error_artifact(
            workflow_id,
            artifact_type,
            &json!({ "error": err.to_string() }),
        )
    }
}
