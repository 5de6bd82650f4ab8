//! Artifact store (C2).
//!
//! A plain filesystem tree: `<store_root>/<workflow_id>/<type>.json`.
//! Writes are create-exclusive and atomic with respect to observers
//! (write-to-temp then rename), so a reader never sees a partially written
//! artifact.

use chrono::Utc;
use forge_core::{schemas, ArtifactType, ForgeError, WorkflowId};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, ForgeError>;

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn workflow_dir(&self, id: &WorkflowId) -> PathBuf {
        self.root.join(id.as_str())
    }

    fn artifact_path(&self, id: &WorkflowId, ty: ArtifactType) -> PathBuf {
        self.workflow_dir(id).join(ty.filename())
    }

    fn error_path(&self, id: &WorkflowId, ty: ArtifactType) -> PathBuf {
        self.workflow_dir(id).join(ty.error_filename())
    }

    /// Generate a new workflow id: `YYYYMMDD_HHMMSS`, with a `_NNN` suffix
    /// appended if that timestamp is already taken in the store (collisions
    /// within one clock tick are resolved by suffix).
    pub fn generate_workflow_id(&self) -> WorkflowId {
        let base = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        if !self.workflow_dir(&WorkflowId::from_string(base.clone())).exists() {
            return WorkflowId::from_string(base);
        }
        for suffix in 1..1000u32 {
            let candidate = format!("{base}_{suffix:03}");
            if !self
                .workflow_dir(&WorkflowId::from_string(candidate.clone()))
                .exists()
            {
                return WorkflowId::from_string(candidate);
            }
        }
        // Exhausted the suffix space within one second; fall back to a
        // nanosecond-qualified id, which cannot collide.
        WorkflowId::from_string(format!("{base}_{}", Utc::now().timestamp_subsec_nanos()))
    }

    pub fn create_workflow(&self, id: &WorkflowId) -> Result<()> {
        let dir = self.workflow_dir(id);
        if dir.exists() {
            return Err(ForgeError::WorkflowExists(id.clone()));
        }
        fs::create_dir_all(&dir)?;
        Ok(())
    }

    /// Write an artifact, create-exclusive, validating against its schema
    /// first.
    pub fn write_artifact(&self, id: &WorkflowId, ty: ArtifactType, data: &Value) -> Result<()> {
        if let Err(detail) = schemas::validate(ty, data) {
            return Err(ForgeError::SchemaViolation {
                workflow_id: id.clone(),
                artifact_type: ty,
                detail,
            });
        }

        let path = self.artifact_path(id, ty);
        if path.exists() {
            return Err(ForgeError::ArtifactExists {
                workflow_id: id.clone(),
                artifact_type: ty,
            });
        }

        self.write_atomic(&path, data)
    }

    /// Record a stage failure alongside the verbatim offending payload: the
    /// offending artifact is preserved as-is alongside an `.error.json`
    /// describing the violation.
    pub fn write_error_artifact(
        &self,
        id: &WorkflowId,
        ty: ArtifactType,
        error_body: &Value,
    ) -> Result<()> {
        let path = self.error_path(id, ty);
        self.write_atomic(&path, error_body)
    }

    /// Write a plain-text companion file (e.g. the human-readable
    /// `final-report.md`) alongside a workflow's JSON artifacts. Not
    /// schema-validated and not create-exclusive; it's a rendering of an
    /// already-written artifact, not an artifact itself.
    pub fn write_text(&self, id: &WorkflowId, filename: &str, contents: &str) -> Result<()> {
        let dir = self.workflow_dir(id);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(filename), contents)?;
        Ok(())
    }

    fn write_atomic(&self, path: &Path, data: &Value) -> Result<()> {
        let dir = path.parent().expect("artifact path always has a parent");
        fs::create_dir_all(dir)?;
        let tmp_path = dir.join(format!(
            ".{}.tmp-{}",
            path.file_name().unwrap_or_default().to_string_lossy(),
            std::process::id()
        ));
        let body = serde_json::to_vec_pretty(data)?;
        fs::write(&tmp_path, body)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn read_artifact(&self, id: &WorkflowId, ty: ArtifactType) -> Result<Value> {
        let path = self.artifact_path(id, ty);
        let content = fs::read_to_string(&path).map_err(|_| ForgeError::ArtifactNotFound {
            workflow_id: id.clone(),
            artifact_type: ty,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn has_artifact(&self, id: &WorkflowId, ty: ArtifactType) -> bool {
        self.artifact_path(id, ty).exists()
    }

    pub fn has_error_artifact(&self, id: &WorkflowId, ty: ArtifactType) -> bool {
        self.error_path(id, ty).exists()
    }

    /// Whether the artifact exists *and* is recorded as `completed`.
    /// Downstream stages require their upstream artifacts to be `completed`.
    pub fn is_artifact_completed(&self, id: &WorkflowId, ty: ArtifactType) -> bool {
        match self.read_artifact(id, ty) {
            Ok(value) => value.get("status").and_then(Value::as_str) == Some("completed"),
            Err(_) => false,
        }
    }

    pub fn list_artifacts(&self, id: &WorkflowId) -> Result<Vec<ArtifactType>> {
        let dir = self.workflow_dir(id);
        let mut found = Vec::new();
        if !dir.exists() {
            return Ok(found);
        }
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let Some(stem) = name.strip_suffix(".json") else {
                continue;
            };
            if stem.ends_with(".error") {
                continue;
            }
            if let Some(ty) = ArtifactType::from_str(stem) {
                found.push(ty);
            }
        }
        found.sort();
        Ok(found)
    }

    pub fn list_workflows(&self) -> Result<Vec<WorkflowId>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                ids.push(WorkflowId::from_string(
                    entry.file_name().to_string_lossy().to_string(),
                ));
            }
        }
        ids.sort();
        Ok(ids)
    }
}
