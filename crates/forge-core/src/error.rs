//! The engine's full error taxonomy, as a single enum so every collaborator
//! (charter parser, store, checkpoint engine, coordinator) surfaces the
//! same concrete kinds rather than ad hoc strings.

use crate::types::{AgentName, ArtifactType, WorkflowId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("charter file missing at {path}")]
    CharterMissing { path: String },

    #[error("charter file at {path} has no recognized GOALS/SCOPE/CONSTRAINTS section")]
    CharterUnparseable { path: String },

    #[error("request refused: {reason}")]
    AlignmentRefused { reason: String },

    #[error("workflow {0} already exists")]
    WorkflowExists(WorkflowId),

    #[error("artifact {artifact_type} already exists for workflow {workflow_id}")]
    ArtifactExists {
        workflow_id: WorkflowId,
        artifact_type: ArtifactType,
    },

    #[error("artifact {artifact_type} not found for workflow {workflow_id}")]
    ArtifactNotFound {
        workflow_id: WorkflowId,
        artifact_type: ArtifactType,
    },

    #[error("artifact {artifact_type} for workflow {workflow_id} violates its schema: {detail}")]
    SchemaViolation {
        workflow_id: WorkflowId,
        artifact_type: ArtifactType,
        detail: String,
    },

    #[error("upstream artifact {artifact_type} missing for workflow {workflow_id}")]
    MissingUpstreamArtifact {
        workflow_id: WorkflowId,
        artifact_type: ArtifactType,
    },

    #[error("agent runtime failed for agent {agent} on workflow {workflow_id}: {detail}")]
    AgentRuntimeFailure {
        workflow_id: WorkflowId,
        agent: AgentName,
        detail: String,
    },

    #[error("stage {agent} on workflow {workflow_id} exceeded its {timeout_sec}s timeout")]
    StageTimeout {
        workflow_id: WorkflowId,
        agent: AgentName,
        timeout_sec: u64,
    },

    #[error("checkpoint for workflow {0} was corrupt and has been rebuilt from the artifact set")]
    CheckpointCorrupt(WorkflowId),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ForgeError>;

/// Exit-code bucket for a workflow failure (spec §6: `0` success, `1`
/// alignment refusal, `2` upstream/schema violation, `3` agent-runtime
/// failure). Callers match on this instead of the error's Display text so
/// the mapping can't drift from the concrete variant it's meant to track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCategory {
    UpstreamOrSchema,
    AgentRuntime,
}

impl ForgeError {
    pub fn exit_category(&self) -> ExitCategory {
        match self {
            ForgeError::SchemaViolation { .. } | ForgeError::MissingUpstreamArtifact { .. } => {
                ExitCategory::UpstreamOrSchema
            }
            _ => ExitCategory::AgentRuntime,
        }
    }
}
