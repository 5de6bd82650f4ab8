//! Checkpoint / resume engine (C4).
//!
//! `checkpoint.json` lives alongside the artifacts in the workflow
//! directory. Unlike artifacts it is mutable: each stage completion
//! overwrites it (still via the same temp-then-rename write used by the
//! artifact store, so a reader never observes a partial file).

use crate::store::ArtifactStore;
use chrono::Utc;
use forge_core::{AgentName, ArtifactType, Checkpoint, ForgeError, ResumePlan, ResumableWorkflow, WorkflowId};
use std::fs;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, ForgeError>;

const CHECKPOINT_FILENAME: &str = "checkpoint.json";

#[derive(Debug, Clone)]
pub struct CheckpointEngine {
    store: ArtifactStore,
}

impl CheckpointEngine {
    pub fn new(store: ArtifactStore) -> Self {
        Self { store }
    }

    fn checkpoint_path(&self, id: &WorkflowId) -> PathBuf {
        self.store.workflow_dir(id).join(CHECKPOINT_FILENAME)
    }

    fn progress_percentage(completed: usize, total: usize) -> u8 {
        if total == 0 {
            return 100;
        }
        ((100 * completed) as f64 / total as f64).round() as u8
    }

    /// `current_agent` MUST be the first pipeline member not present in
    /// `completed_agents`, or `None` if all completed (spec invariant).
    fn current_agent(pipeline: &[AgentName], completed_agents: &[AgentName]) -> Option<AgentName> {
        pipeline
            .iter()
            .find(|agent| !completed_agents.contains(agent))
            .cloned()
    }

    pub fn create_checkpoint(
        &self,
        workflow_id: &WorkflowId,
        pipeline: &[AgentName],
        completed_agents: Vec<AgentName>,
        artifacts_created: Vec<String>,
    ) -> Result<Checkpoint> {
        let current_agent = Self::current_agent(pipeline, &completed_agents);
        let progress_percentage = Self::progress_percentage(completed_agents.len(), pipeline.len());
        let checkpoint = Checkpoint {
            workflow_id: workflow_id.clone(),
            completed_agents,
            current_agent,
            artifacts_created,
            progress_percentage,
            updated_at: Utc::now(),
        };
        self.write(workflow_id, &checkpoint)?;
        Ok(checkpoint)
    }

    fn write(&self, workflow_id: &WorkflowId, checkpoint: &Checkpoint) -> Result<()> {
        let path = self.checkpoint_path(workflow_id);
        let dir = path.parent().expect("checkpoint path always has a parent");
        fs::create_dir_all(dir)?;
        let tmp_path = dir.join(format!(".checkpoint.tmp-{}", std::process::id()));
        let body = serde_json::to_vec_pretty(checkpoint)?;
        fs::write(&tmp_path, body)?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    /// Load the checkpoint, repairing it against the artifact set if it
    /// contradicts what is actually on disk: rebuild `completed_agents` in
    /// pipeline order and rewrite the checkpoint before returning.
    pub fn load_checkpoint(
        &self,
        workflow_id: &WorkflowId,
        pipeline: &[(AgentName, ArtifactType)],
    ) -> Result<Checkpoint> {
        let path = self.checkpoint_path(workflow_id);
        let on_disk = fs::read_to_string(&path).ok().and_then(|content| {
            serde_json::from_str::<Checkpoint>(&content).ok()
        });

        let artifact_backed_completed: Vec<AgentName> = pipeline
            .iter()
            .filter(|(_, artifact_type)| self.store.is_artifact_completed(workflow_id, *artifact_type))
            .map(|(agent, _)| agent.clone())
            .collect();

        let agrees = on_disk
            .as_ref()
            .is_some_and(|cp| cp.completed_agents == artifact_backed_completed);

        if let (true, Some(checkpoint)) = (agrees, on_disk) {
            return Ok(checkpoint);
        }

        let pipeline_names: Vec<AgentName> = pipeline.iter().map(|(agent, _)| agent.clone()).collect();
        let artifacts_created: Vec<String> = self
            .store
            .list_artifacts(workflow_id)?
            .into_iter()
            .map(|ty| ty.filename())
            .collect();

        self.create_checkpoint(
            workflow_id,
            &pipeline_names,
            artifact_backed_completed,
            artifacts_created,
        )
    }

    pub fn get_resume_plan(
        &self,
        workflow_id: &WorkflowId,
        pipeline: &[(AgentName, ArtifactType)],
    ) -> Result<ResumePlan> {
        let checkpoint = self.load_checkpoint(workflow_id, pipeline)?;
        let pipeline_names: Vec<AgentName> = pipeline.iter().map(|(agent, _)| agent.clone()).collect();
        let remaining_agents: Vec<AgentName> = pipeline_names
            .into_iter()
            .filter(|agent| !checkpoint.completed_agents.contains(agent))
            .collect();
        Ok(ResumePlan {
            next_agent: checkpoint.current_agent,
            progress_percentage: checkpoint.progress_percentage,
            remaining_agents,
        })
    }

    /// All workflows with a checkpoint that is not yet terminal
    /// (`WorkflowStatus::Suspended`).
    pub fn list_resumable_workflows(
        &self,
        pipeline: &[(AgentName, ArtifactType)],
    ) -> Result<Vec<ResumableWorkflow>> {
        let mut resumable = Vec::new();
        for workflow_id in self.store.list_workflows()? {
            if self.store.has_artifact(&workflow_id, ArtifactType::FinalReport) {
                continue;
            }
            let checkpoint = self.load_checkpoint(&workflow_id, pipeline)?;
            if checkpoint.current_agent.is_none() {
                continue;
            }
            resumable.push(ResumableWorkflow {
                workflow_id,
                progress_percentage: checkpoint.progress_percentage,
                completed_agents: checkpoint.completed_agents,
                next_agent: checkpoint.current_agent,
            });
        }
        Ok(resumable)
    }
}
