//! Alignment validator (C5).
//!
//! Delegates the aligned/blocked judgement to a dedicated validator agent
//! invoked through the agent runtime with artifact type `alignment-check`.
//! The result is ephemeral: it is embedded in the manifest but never
//! written to the store as its own artifact file, since it has no
//! standing once the workflow starts.

use crate::agent_runtime::AgentRuntime;
use forge_core::{schemas, AlignmentResult, ArtifactType, CharterRecord, ForgeError, WorkflowId};
use std::sync::Arc;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, ForgeError>;

#[derive(Clone)]
pub struct AlignmentValidator {
    runtime: Arc<dyn AgentRuntime>,
    confidence_threshold: f64,
    work_dir: std::path::PathBuf,
    timeout: Duration,
}

impl AlignmentValidator {
    pub fn new(
        runtime: Arc<dyn AgentRuntime>,
        confidence_threshold: f64,
        work_dir: std::path::PathBuf,
        timeout: Duration,
    ) -> Self {
        Self { runtime, confidence_threshold, work_dir, timeout }
    }

    /// Invoke the validator agent fresh for this request; it must never be
    /// cached across requests.
    pub async fn validate(
        &self,
        request: &str,
        charter: &CharterRecord,
        workflow_id: &WorkflowId,
    ) -> Result<AlignmentResult> {
        let schema_source = schemas::schema_source(ArtifactType::AlignmentCheck);
        let output_path = self.work_dir.join(format!("{}.alignment-check.json", workflow_id.as_str()));
        let _ = std::fs::remove_file(&output_path);

        let description = format!("Assess charter alignment for: {request}");
        let prompt = render_validator_prompt(request, charter, &output_path, schema_source);

        self.runtime
            .invoke_subagent(workflow_id, "alignment-validator", &description, &prompt, self.timeout)
            .await?;

        let raw = std::fs::read_to_string(&output_path).map_err(|_| ForgeError::AgentRuntimeFailure {
            workflow_id: workflow_id.clone(),
            agent: "alignment-validator".to_string(),
            detail: "validator completed without producing an alignment-check artifact".to_string(),
        })?;
        let value: serde_json::Value = serde_json::from_str(&raw)?;
        schemas::validate(ArtifactType::AlignmentCheck, &value).map_err(|detail| ForgeError::SchemaViolation {
            workflow_id: workflow_id.clone(),
            artifact_type: ArtifactType::AlignmentCheck,
            detail,
        })?;

        let result: AlignmentResult = serde_json::from_value(value)?;
        let _ = std::fs::remove_file(&output_path);
        Ok(result.resolve(self.confidence_threshold))
    }
}

fn render_validator_prompt(
    request: &str,
    charter: &CharterRecord,
    output_path: &std::path::Path,
    schema_source: &str,
) -> String {
    let mut out = String::new();
    out.push_str("# Mission\n");
    out.push_str(
        "You are the alignment validator. Decide whether the request falls within the \
         project charter's goals and scope and violates no constraint.\n\n",
    );
    out.push_str("# Request\n");
    out.push_str(request);
    out.push_str("\n\n# Charter\n## Goals\n");
    for goal in &charter.goals {
        out.push_str(&format!("- {goal}\n"));
    }
    out.push_str("## In scope\n");
    for item in &charter.scope_in {
        out.push_str(&format!("- {item}\n"));
    }
    out.push_str("## Out of scope\n");
    for item in &charter.scope_out {
        out.push_str(&format!("- {item}\n"));
    }
    out.push_str("## Constraints\n");
    for constraint in &charter.constraints {
        out.push_str(&format!("- {constraint}\n"));
    }
    out.push_str(&format!(
        "\n# Output\nWrite your result as JSON to: {}\n",
        output_path.display()
    ));
    out.push_str("\nThe output MUST validate against this JSON Schema:\n```json\n");
    out.push_str(schema_source);
    out.push_str("\n```\n");
    out
}
