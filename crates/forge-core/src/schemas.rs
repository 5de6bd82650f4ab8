//! Artifact contracts (C8).
//!
//! Each artifact type's minimum required fields are expressed as a JSON
//! Schema document under `schemas/` and compiled with the `jsonschema`
//! crate, the same library and `validator_for`/`validate` pattern used for
//! gateable JSON contracts elsewhere in this ecosystem. `additionalProperties:
//! true` on every schema preserves unknown extra fields for
//! forward-compatibility.

use crate::types::ArtifactType;
use serde_json::Value;
use std::sync::OnceLock;

macro_rules! schema_source {
    ($ty:expr) => {
        match $ty {
            ArtifactType::Manifest => include_str!("../schemas/manifest.schema.json"),
            ArtifactType::Research => include_str!("../schemas/research.schema.json"),
            ArtifactType::Architecture => include_str!("../schemas/architecture.schema.json"),
            ArtifactType::TestPlan => include_str!("../schemas/test-plan.schema.json"),
            ArtifactType::Implementation => include_str!("../schemas/implementation.schema.json"),
            ArtifactType::Review => include_str!("../schemas/review.schema.json"),
            ArtifactType::Security => include_str!("../schemas/security.schema.json"),
            ArtifactType::Docs => include_str!("../schemas/docs.schema.json"),
            ArtifactType::FinalReport => include_str!("../schemas/final-report.schema.json"),
            ArtifactType::AlignmentCheck => include_str!("../schemas/alignment-check.schema.json"),
        }
    };
}

struct CompiledSchema {
    validator: jsonschema::Validator,
}

// One cell per artifact type; compiled lazily and reused for every
// write_artifact call rather than recompiled per call.
fn cell_for(ty: ArtifactType) -> &'static OnceLock<CompiledSchema> {
    static MANIFEST: OnceLock<CompiledSchema> = OnceLock::new();
    static RESEARCH: OnceLock<CompiledSchema> = OnceLock::new();
    static ARCHITECTURE: OnceLock<CompiledSchema> = OnceLock::new();
    static TEST_PLAN: OnceLock<CompiledSchema> = OnceLock::new();
    static IMPLEMENTATION: OnceLock<CompiledSchema> = OnceLock::new();
    static REVIEW: OnceLock<CompiledSchema> = OnceLock::new();
    static SECURITY: OnceLock<CompiledSchema> = OnceLock::new();
    static DOCS: OnceLock<CompiledSchema> = OnceLock::new();
    static FINAL_REPORT: OnceLock<CompiledSchema> = OnceLock::new();
    static ALIGNMENT_CHECK: OnceLock<CompiledSchema> = OnceLock::new();

    match ty {
        ArtifactType::Manifest => &MANIFEST,
        ArtifactType::Research => &RESEARCH,
        ArtifactType::Architecture => &ARCHITECTURE,
        ArtifactType::TestPlan => &TEST_PLAN,
        ArtifactType::Implementation => &IMPLEMENTATION,
        ArtifactType::Review => &REVIEW,
        ArtifactType::Security => &SECURITY,
        ArtifactType::Docs => &DOCS,
        ArtifactType::FinalReport => &FINAL_REPORT,
        ArtifactType::AlignmentCheck => &ALIGNMENT_CHECK,
    }
}

fn compiled(ty: ArtifactType) -> &'static CompiledSchema {
    cell_for(ty).get_or_init(|| {
        let source = schema_source!(ty);
        let schema: Value =
            serde_json::from_str(source).expect("embedded schema document must be valid JSON");
        let validator = jsonschema::validator_for(&schema)
            .expect("embedded schema document must compile as a JSON Schema");
        CompiledSchema { validator }
    })
}

/// Validate `instance` against the schema for `artifact_type`.
///
/// Returns `Ok(())` when valid, or `Err(detail)` with a human-readable
/// description of every violation, suitable for `ForgeError::SchemaViolation`.
pub fn validate(artifact_type: ArtifactType, instance: &Value) -> std::result::Result<(), String> {
    let schema = compiled(artifact_type);
    let errors: Vec<String> = schema
        .validator
        .iter_errors(instance)
        .map(|e| format!("{} (at {})", e, e.instance_path))
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

/// Raw JSON Schema source text for `artifact_type`, for embedding in an
/// agent invocation prompt (C6 step 3) or serving over the control API.
pub fn schema_source(artifact_type: ArtifactType) -> &'static str {
    schema_source!(artifact_type)
}
