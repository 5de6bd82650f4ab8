pub mod charter;
pub mod error;
pub mod prompt;
pub mod registry;
pub mod schemas;
pub mod types;

pub use error::{ExitCategory, ForgeError, Result};
pub use types::{
    AgentName, AlignmentResult, ArtifactStatus, ArtifactType, CharterRecord, Checkpoint,
    PipelineStage, ResumableWorkflow, ResumePlan, ScopeAssessment, WorkflowId, WorkflowStatus,
};
