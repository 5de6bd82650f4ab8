//! Core types shared by the workflow coordinator and its collaborators.
//!
//! These mirror the data model shared across the engine: workflows,
//! artifacts, the charter record, checkpoints, and the pipeline registry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A workflow identifier.
///
/// Monotonically ordered string (timestamp-based: `YYYYMMDD_HHMMSS[_NNN]`),
/// unique within the store. Ordering of workflows is by directory listing,
/// not by parsing this value — `WorkflowId` is therefore an opaque newtype,
/// not a parsed timestamp.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for WorkflowId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Status recorded on every artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Initialized,
    InProgress,
    Completed,
    Failed,
}

impl ArtifactStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Derived workflow lifecycle state. Never stored directly; computed from
/// which artifacts/checkpoint exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    Created,
    Running,
    Suspended,
    Completed,
    Failed,
}

/// Every artifact type in the pipeline, plus the two artifact kinds that
/// exist but are not pipeline stages: `Manifest` (the workflow root,
/// produced by the coordinator rather than an agent) and `AlignmentCheck`
/// (ephemeral, never persisted across workflows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactType {
    Manifest,
    Research,
    Architecture,
    TestPlan,
    Implementation,
    Review,
    Security,
    Docs,
    FinalReport,
    AlignmentCheck,
}

impl ArtifactType {
    /// The `<type>.json` filename stem used on disk.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manifest => "manifest",
            Self::Research => "research",
            Self::Architecture => "architecture",
            Self::TestPlan => "test-plan",
            Self::Implementation => "implementation",
            Self::Review => "review",
            Self::Security => "security",
            Self::Docs => "docs",
            Self::FinalReport => "final-report",
            Self::AlignmentCheck => "alignment-check",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "manifest" => Self::Manifest,
            "research" => Self::Research,
            "architecture" => Self::Architecture,
            "test-plan" => Self::TestPlan,
            "implementation" => Self::Implementation,
            "review" => Self::Review,
            "security" => Self::Security,
            "docs" => Self::Docs,
            "final-report" => Self::FinalReport,
            "alignment-check" => Self::AlignmentCheck,
            _ => return None,
        })
    }

    pub fn filename(self) -> String {
        format!("{}.json", self.as_str())
    }

    /// Filename for the stage's error artifact, `<stage>.error.json`.
    pub fn error_filename(self) -> String {
        format!("{}.error.json", self.as_str())
    }
}

impl std::fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A logical agent name in the pipeline (e.g. `"researcher"`). Kept as a
/// plain owned string rather than an enum: the pipeline registry (C6) is a
/// declarative, appendable list, not a closed set baked into the type
/// system.
pub type AgentName = String;

/// One entry in the agent invocation factory's registry.
#[derive(Debug, Clone)]
pub struct PipelineStage {
    pub agent_name: AgentName,
    pub progress_pct: u8,
    pub required_upstream_artifacts: Vec<ArtifactType>,
    pub produced_artifact_type: ArtifactType,
    pub description_template: &'static str,
    pub role_summary: &'static str,
    pub optional_model_hint: Option<&'static str>,
    /// The trailing validator cluster (reviewer, security-auditor,
    /// doc-master) is declaratively marked parallelizable.
    pub parallelizable: bool,
    /// Per-invocation timeout in seconds (30 min default; extended by
    /// analogy for sequential stages).
    pub timeout_sec: u64,
}

/// The charter record extracted from `PROJECT.md`.
///
/// Produced in memory only, for the duration of a validation or
/// coordination call — never written back to disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharterRecord {
    pub goals: Vec<String>,
    pub scope_in: BTreeSet<String>,
    pub scope_out: BTreeSet<String>,
    pub constraints: Vec<String>,
}

/// Scope assessment returned by the alignment validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeAssessment {
    In,
    Out,
    Unclear,
}

/// Result of an alignment check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentResult {
    pub is_aligned: bool,
    pub confidence: f64,
    pub matching_goals: Vec<String>,
    pub scope_assessment: ScopeAssessment,
    pub constraint_violations: Vec<String>,
    pub reasoning: String,
}

impl AlignmentResult {
    /// Outcome policy: unclear scope with high confidence
    /// and no violations is treated as aligned; the validator's raw
    /// `is_aligned` judgement is overridden by this rule so the coordinator
    /// has one source of truth.
    pub fn resolve(mut self, confidence_threshold: f64) -> Self {
        if self.scope_assessment == ScopeAssessment::Unclear {
            self.is_aligned =
                self.confidence >= confidence_threshold && self.constraint_violations.is_empty();
        }
        self
    }
}

/// The `checkpoint.json` record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub workflow_id: WorkflowId,
    pub completed_agents: Vec<AgentName>,
    pub current_agent: Option<AgentName>,
    pub artifacts_created: Vec<String>,
    pub progress_percentage: u8,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// A resume plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumePlan {
    pub next_agent: Option<AgentName>,
    pub progress_percentage: u8,
    pub remaining_agents: Vec<AgentName>,
}

/// Summary row for a resumable workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumableWorkflow {
    pub workflow_id: WorkflowId,
    pub progress_percentage: u8,
    pub completed_agents: Vec<AgentName>,
    pub next_agent: Option<AgentName>,
}
