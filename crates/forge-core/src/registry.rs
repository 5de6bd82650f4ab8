//! The declarative pipeline registry (C6).
//!
//! Dynamic dispatch of agents: replace open-ended polymorphism with a
//! declarative registry. Add an agent by appending a record; do not
//! subclass.

use crate::types::{ArtifactType, PipelineStage};

/// Default stage timeout: 30 minutes, adopted by analogy with the parallel
/// cluster budget.
pub const DEFAULT_STAGE_TIMEOUT_SEC: u64 = 1800;

/// The default pipeline order:
/// `[researcher, planner, test-master, implementer, reviewer,
/// security-auditor, doc-master]`.
pub fn default_pipeline() -> Vec<PipelineStage> {
    vec![
        PipelineStage {
            agent_name: "researcher".into(),
            progress_pct: 15,
            required_upstream_artifacts: vec![ArtifactType::Manifest],
            produced_artifact_type: ArtifactType::Research,
            description_template: "Research prior art and constraints for: {request}",
            role_summary: "You are the researcher agent. Survey the codebase for relevant \
                patterns, best practices, security considerations, and candidate \
                libraries for the requested feature.",
            optional_model_hint: None,
            parallelizable: false,
            timeout_sec: DEFAULT_STAGE_TIMEOUT_SEC,
        },
        PipelineStage {
            agent_name: "planner".into(),
            progress_pct: 30,
            required_upstream_artifacts: vec![ArtifactType::Research],
            produced_artifact_type: ArtifactType::Architecture,
            description_template: "Design the architecture for: {request}",
            role_summary: "You are the planner agent. Produce the component design, data \
                model, API contracts, and threat list that the implementer and \
                security-auditor will build against.",
            optional_model_hint: None,
            parallelizable: false,
            timeout_sec: DEFAULT_STAGE_TIMEOUT_SEC,
        },
        PipelineStage {
            agent_name: "test-master".into(),
            progress_pct: 45,
            required_upstream_artifacts: vec![ArtifactType::Research, ArtifactType::Architecture],
            produced_artifact_type: ArtifactType::TestPlan,
            description_template: "Design the test plan for: {request}",
            role_summary: "You are the test-master agent. Enumerate concrete test cases and \
                a coverage strategy that exercise the planned architecture.",
            optional_model_hint: None,
            parallelizable: false,
            timeout_sec: DEFAULT_STAGE_TIMEOUT_SEC,
        },
        PipelineStage {
            agent_name: "implementer".into(),
            progress_pct: 60,
            required_upstream_artifacts: vec![ArtifactType::Architecture, ArtifactType::TestPlan],
            produced_artifact_type: ArtifactType::Implementation,
            description_template: "Implement: {request}",
            role_summary: "You are the implementer agent. Write the code and tests the \
                architecture and test plan describe.",
            optional_model_hint: None,
            parallelizable: false,
            timeout_sec: DEFAULT_STAGE_TIMEOUT_SEC,
        },
        PipelineStage {
            agent_name: "reviewer".into(),
            progress_pct: 80,
            required_upstream_artifacts: vec![ArtifactType::Implementation],
            produced_artifact_type: ArtifactType::Review,
            description_template: "Review the implementation for: {request}",
            role_summary: "You are the reviewer agent. Judge code quality and correctness; \
                approve or request changes with concrete issues.",
            optional_model_hint: None,
            parallelizable: true,
            timeout_sec: 1800,
        },
        PipelineStage {
            agent_name: "security-auditor".into(),
            progress_pct: 80,
            required_upstream_artifacts: vec![ArtifactType::Implementation],
            produced_artifact_type: ArtifactType::Security,
            description_template: "Audit the implementation for: {request}",
            role_summary: "You are the security-auditor agent. Validate that the threats \
                identified during planning are mitigated in the implementation.",
            optional_model_hint: None,
            parallelizable: true,
            timeout_sec: 1800,
        },
        PipelineStage {
            agent_name: "doc-master".into(),
            progress_pct: 80,
            required_upstream_artifacts: vec![ArtifactType::Implementation],
            produced_artifact_type: ArtifactType::Docs,
            description_template: "Document: {request}",
            role_summary: "You are the doc-master agent. Update user-facing and \
                developer-facing documentation to reflect the implementation.",
            optional_model_hint: None,
            parallelizable: true,
            timeout_sec: 1800,
        },
    ]
}
