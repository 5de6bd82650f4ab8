//! Invocation prompt assembly (C6).
//!
//! Builds the human-readable description and the full prompt handed to the
//! agent runtime: mission/role, the upstream artifact paths the agent must
//! read, the output artifact path it must produce, and that output's JSON
//! schema.

use crate::types::{ArtifactType, PipelineStage};
use std::path::Path;

/// A human-readable description filled from the stage's
/// `description_template` and the manifest's `request` field.
///
/// `description_template` may contain a single `{request}` placeholder.
pub fn render_description(stage: &PipelineStage, request: &str) -> String {
    stage.description_template.replace("{request}", request)
}

/// Build the full prompt for an agent invocation. `model_hint` is the
/// effective model to request: the stage's own `optional_model_hint` if
/// set, otherwise the daemon's configured default.
pub fn render_prompt(
    stage: &PipelineStage,
    upstream_paths: &[(ArtifactType, &Path)],
    output_path: &Path,
    output_schema: &str,
    model_hint: &str,
) -> String {
    let mut out = String::new();
    out.push_str("# Mission\n");
    out.push_str(stage.role_summary);
    out.push_str(&format!("\nModel: {model_hint}\n"));
    out.push_str("\n# Inputs\n");
    if upstream_paths.is_empty() {
        out.push_str("(none — this is the first stage after the manifest)\n");
    } else {
        for (ty, path) in upstream_paths {
            out.push_str(&format!("- {}: {}\n", ty, path.display()));
        }
    }
    out.push_str("\n# Output\n");
    out.push_str(&format!(
        "Write your result as JSON to: {}\n",
        output_path.display()
    ));
    out.push_str("\nThe output MUST validate against this JSON Schema:\n```json\n");
    out.push_str(output_schema);
    out.push_str("\n```\n");
    out
}
