//! Workflow coordinator (C7).
//!
//! Top-level state machine: validate -> create workflow -> invoke agents
//! in order -> checkpoint -> resume. Holds only its charter path and store
//! root; everything else is scoped to the workflow being driven. No
//! global state is required.

use crate::agent_factory::AgentFactory;
use crate::agent_runtime::AgentRuntime;
use crate::alignment::AlignmentValidator;
use crate::checkpoint::CheckpointEngine;
use crate::events::EventLogger;
use crate::store::ArtifactStore;
use chrono::Utc;
use forge_core::{charter, registry, ArtifactType, ExitCategory, ForgeError, PipelineStage, WorkflowId};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, ForgeError>;

/// Outcome of `start_workflow`.
#[derive(Debug, Clone)]
pub struct StartOutcome {
    pub ok: bool,
    pub message: String,
    pub workflow_id: Option<WorkflowId>,
}

/// Outcome of `run`/`resume`.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub ok: bool,
    pub message: String,
    pub workflow_id: WorkflowId,
    pub failed_agent: Option<String>,
    /// `None` on success; the failing `ForgeError`'s exit-code bucket
    /// otherwise, for exit-code mapping at the process boundary.
    pub failure_category: Option<ExitCategory>,
}

pub struct Coordinator {
    charter_path: PathBuf,
    store: ArtifactStore,
    checkpoint: CheckpointEngine,
    factory: AgentFactory,
    alignment: AlignmentValidator,
    pipeline: Vec<PipelineStage>,
    log_dir: PathBuf,
}

impl Coordinator {
    pub fn new(
        charter_path: PathBuf,
        store_root: PathBuf,
        log_dir: PathBuf,
        runtime: Arc<dyn AgentRuntime>,
        alignment_confidence_threshold: f64,
        alignment_timeout: std::time::Duration,
        default_model: String,
        pipeline: Option<Vec<PipelineStage>>,
    ) -> Self {
        let store = ArtifactStore::new(store_root);
        let checkpoint = CheckpointEngine::new(store.clone());
        let factory =
            AgentFactory::new(store.clone(), checkpoint.clone(), log_dir.clone(), runtime.clone(), default_model);
        let alignment = AlignmentValidator::new(
            runtime,
            alignment_confidence_threshold,
            store.root().to_path_buf(),
            alignment_timeout,
        );
        Self {
            charter_path,
            store,
            checkpoint,
            factory,
            alignment,
            // An explicit override pipeline wins over the default.
            pipeline: pipeline.unwrap_or_else(registry::default_pipeline),
            log_dir,
        }
    }

    fn pipeline_names(&self) -> Vec<String> {
        self.pipeline.iter().map(|s| s.agent_name.clone()).collect()
    }

    fn pipeline_pairs(&self) -> Vec<(String, ArtifactType)> {
        self.pipeline
            .iter()
            .map(|s| (s.agent_name.clone(), s.produced_artifact_type))
            .collect()
    }

    pub async fn start_workflow(&self, request: &str) -> Result<StartOutcome> {
        let charter = match charter::parse_file(&self.charter_path) {
            Ok(c) => c,
            Err(ForgeError::CharterMissing { path }) => {
                return Ok(StartOutcome {
                    ok: false,
                    message: format!("charter missing at {path}"),
                    workflow_id: None,
                });
            }
            Err(ForgeError::CharterUnparseable { path }) => {
                return Ok(StartOutcome {
                    ok: false,
                    message: format!("charter at {path} has no recognized sections"),
                    workflow_id: None,
                });
            }
            Err(other) => return Err(other),
        };

        let id = self.store.generate_workflow_id();
        let alignment = self.alignment.validate(request, &charter, &id).await?;

        if !alignment.is_aligned {
            return Ok(StartOutcome {
                ok: false,
                message: alignment.reasoning,
                workflow_id: None,
            });
        }

        self.store.create_workflow(&id)?;

        let manifest = json!({
            "version": "1.0",
            "agent": "coordinator",
            "workflow_id": id.as_str(),
            "status": "completed",
            "timestamp": Utc::now().to_rfc3339(),
            "request": request,
            "alignment": {
                "is_aligned": alignment.is_aligned,
                "confidence": alignment.confidence,
                "matching_goals": alignment.matching_goals,
                "scope_assessment": alignment.scope_assessment,
                "constraint_violations": alignment.constraint_violations,
                "reasoning": alignment.reasoning,
            },
            "pipeline": self.pipeline_names(),
        });
        self.store.write_artifact(&id, ArtifactType::Manifest, &manifest)?;

        self.checkpoint.create_checkpoint(&id, &self.pipeline_names(), vec![], vec!["manifest.json".to_string()])?;

        let logger = EventLogger::new(&self.log_dir, &id, "coordinator");
        logger.log_decision(
            "start_workflow",
            &alignment.reasoning,
            vec![],
            json!({ "pipeline": self.pipeline_names() }),
        )?;

        Ok(StartOutcome {
            ok: true,
            message: "workflow created".to_string(),
            workflow_id: Some(id),
        })
    }

    /// Drive the pipeline forward from wherever its checkpoint says it is:
    /// idempotent resume, skip already-completed stages, dispatch the
    /// trailing validator cluster concurrently.
    pub async fn run(&self, workflow_id: &WorkflowId) -> Result<RunOutcome> {
        let pairs = self.pipeline_pairs();
        let mut checkpoint = self.checkpoint.load_checkpoint(workflow_id, &pairs)?;

        if checkpoint.current_agent.is_none() {
            // Already fully completed: idempotent no-op.
            self.ensure_final_report(workflow_id)?;
            return Ok(RunOutcome {
                ok: true,
                message: "workflow already complete".to_string(),
                workflow_id: workflow_id.clone(),
                failed_agent: None,
                failure_category: None,
            });
        }

        let mut index = 0;
        while index < self.pipeline.len() {
            let stage = &self.pipeline[index];

            if self.store.is_artifact_completed(workflow_id, stage.produced_artifact_type) {
                if !checkpoint.completed_agents.contains(&stage.agent_name) {
                    checkpoint.completed_agents.push(stage.agent_name.clone());
                }
                index += 1;
                continue;
            }

            if stage.parallelizable {
                let cluster_start = index;
                let mut cluster_end = index;
                while cluster_end < self.pipeline.len() && self.pipeline[cluster_end].parallelizable {
                    cluster_end += 1;
                }
                let cluster = &self.pipeline[cluster_start..cluster_end];
                let cluster_results = self.run_cluster(cluster, workflow_id, &checkpoint.completed_agents).await;

                let mut any_failed = None;
                for (stage, result) in cluster.iter().zip(cluster_results) {
                    match result {
                        Ok(_) => {
                            if !checkpoint.completed_agents.contains(&stage.agent_name) {
                                checkpoint.completed_agents.push(stage.agent_name.clone());
                            }
                        }
                        Err(err) => {
                            any_failed.get_or_insert((stage.agent_name.clone(), err));
                        }
                    }
                }

                if let Some((agent, err)) = any_failed {
                    return Ok(RunOutcome {
                        ok: false,
                        message: err.to_string(),
                        workflow_id: workflow_id.clone(),
                        failed_agent: Some(agent),
                        failure_category: Some(err.exit_category()),
                    });
                }

                index = cluster_end;
                continue;
            }

            let pipeline_names = self.pipeline_names();
            match self
                .factory
                .invoke(stage, workflow_id, &checkpoint.completed_agents, &pipeline_names)
                .await
            {
                Ok(_) => {
                    checkpoint.completed_agents.push(stage.agent_name.clone());
                    index += 1;
                }
                Err(err) => {
                    return Ok(RunOutcome {
                        ok: false,
                        message: err.to_string(),
                        workflow_id: workflow_id.clone(),
                        failed_agent: Some(stage.agent_name.clone()),
                        failure_category: Some(err.exit_category()),
                    });
                }
            }
        }

        self.ensure_final_report(workflow_id)?;
        Ok(RunOutcome {
            ok: true,
            message: "workflow complete".to_string(),
            workflow_id: workflow_id.clone(),
            failed_agent: None,
            failure_category: None,
        })
    }

    async fn run_cluster(
        &self,
        cluster: &[PipelineStage],
        workflow_id: &WorkflowId,
        completed_before: &[String],
    ) -> Vec<Result<crate::agent_factory::InvokeOutcome>> {
        let pipeline_names = self.pipeline_names();
        let futures = cluster.iter().map(|stage| {
            self.factory.invoke(stage, workflow_id, completed_before, &pipeline_names)
        });
        futures_util::future::join_all(futures).await
    }

    fn ensure_final_report(&self, workflow_id: &WorkflowId) -> Result<()> {
        if self.store.has_artifact(workflow_id, ArtifactType::FinalReport) {
            return Ok(());
        }
        let artifacts_created: Vec<String> = self
            .store
            .list_artifacts(workflow_id)?
            .into_iter()
            .map(|ty| ty.filename())
            .collect();
        let summary = format!("pipeline completed with {} artifacts", artifacts_created.len());
        let report = json!({
            "version": "1.0",
            "agent": "coordinator",
            "workflow_id": workflow_id.as_str(),
            "status": "completed",
            "timestamp": Utc::now().to_rfc3339(),
            "outcome": "success",
            "artifacts_created": artifacts_created,
            "summary": summary,
        });
        self.store.write_artifact(workflow_id, ArtifactType::FinalReport, &report)?;
        self.store.write_text(
            workflow_id,
            "final-report.md",
            &render_final_report_markdown(workflow_id, &summary, &artifacts_created),
        )
    }

    /// Consult C4's resume plan, then call `run` from where it left off:
    /// `resume` delegates to `run`, which is itself idempotent over
    /// already-completed stages.
    pub async fn resume(&self, workflow_id: &WorkflowId) -> Result<RunOutcome> {
        let _plan = self.checkpoint.get_resume_plan(workflow_id, &self.pipeline_pairs())?;
        self.run(workflow_id).await
    }

    pub fn list_resumable(&self) -> Result<Vec<forge_core::ResumableWorkflow>> {
        self.checkpoint.list_resumable_workflows(&self.pipeline_pairs())
    }

    pub fn list_workflows(&self) -> Result<Vec<WorkflowId>> {
        self.store.list_workflows()
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn log_dir(&self) -> &std::path::Path {
        &self.log_dir
    }
}

/// Renders the human-skimmable companion to `final-report.json`: a short
/// Markdown summary alongside it for humans skimming a workflow directory
/// without a JSON viewer handy.
fn render_final_report_markdown(workflow_id: &WorkflowId, summary: &str, artifacts: &[String]) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Final Report: {}\n\n", workflow_id.as_str()));
    out.push_str(summary);
    out.push_str("\n\n## Artifacts\n\n");
    for artifact in artifacts {
        out.push_str(&format!("- {artifact}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_runtime::BoxFuture;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Deterministic fake agent runtime used for lifecycle scenarios: every
    /// subagent type writes a minimally valid artifact for itself, and the
    /// alignment validator writes based on a keyword rule.
    struct FakeRuntime {
        store_root: PathBuf,
    }

    impl FakeRuntime {
        fn artifact_for(subagent_type: &str, workflow_id: &str) -> (ArtifactType, Value) {
            match subagent_type {
                "researcher" => (
                    ArtifactType::Research,
                    json!({
                        "version": "1.0", "agent": "researcher", "workflow_id": workflow_id,
                        "status": "completed", "timestamp": "2026-01-01T00:00:00Z",
                        "codebase_patterns": [], "best_practices": [], "security_considerations": [],
                        "recommended_libraries": [], "alternatives_considered": []
                    }),
                ),
                "planner" => (
                    ArtifactType::Architecture,
                    json!({
                        "version": "1.0", "agent": "planner", "workflow_id": workflow_id,
                        "status": "completed", "timestamp": "2026-01-01T00:00:00Z",
                        "components": [], "data_model": {}, "api_contracts": [], "threats": []
                    }),
                ),
                "test-master" => (
                    ArtifactType::TestPlan,
                    json!({
                        "version": "1.0", "agent": "test-master", "workflow_id": workflow_id,
                        "status": "completed", "timestamp": "2026-01-01T00:00:00Z",
                        "test_cases": [], "coverage_strategy": "unit + integration"
                    }),
                ),
                "implementer" => (
                    ArtifactType::Implementation,
                    json!({
                        "version": "1.0", "agent": "implementer", "workflow_id": workflow_id,
                        "status": "completed", "timestamp": "2026-01-01T00:00:00Z",
                        "files_changed": ["src/auth.rs"], "diff_summary": "added JWT auth", "tests_added": 3
                    }),
                ),
                "reviewer" => (
                    ArtifactType::Review,
                    json!({
                        "version": "1.0", "agent": "reviewer", "workflow_id": workflow_id,
                        "status": "completed", "timestamp": "2026-01-01T00:00:00Z",
                        "decision": "approve", "score": 90, "issues": []
                    }),
                ),
                "security-auditor" => (
                    ArtifactType::Security,
                    json!({
                        "version": "1.0", "agent": "security-auditor", "workflow_id": workflow_id,
                        "status": "completed", "timestamp": "2026-01-01T00:00:00Z",
                        "threats_validated": [], "overall_coverage": 90, "recommendation": "pass"
                    }),
                ),
                "doc-master" => (
                    ArtifactType::Docs,
                    json!({
                        "version": "1.0", "agent": "doc-master", "workflow_id": workflow_id,
                        "status": "completed", "timestamp": "2026-01-01T00:00:00Z",
                        "docs_updated": ["README.md"], "summary": "documented JWT auth"
                    }),
                ),
                other => panic!("unexpected subagent {other}"),
            }
        }
    }

    impl AgentRuntime for FakeRuntime {
        fn invoke_subagent<'a>(
            &'a self,
            workflow_id: &'a WorkflowId,
            subagent_type: &'a str,
            _description: &'a str,
            _prompt: &'a str,
            _timeout: std::time::Duration,
        ) -> BoxFuture<'a, Result<()>> {
            let store_root = self.store_root.clone();
            let workflow_id = workflow_id.clone();
            let subagent_type = subagent_type.to_string();
            Box::pin(async move {
                if subagent_type == "alignment-validator" {
                    let is_aligned = true;
                    let path = store_root.join(format!("{}.alignment-check.json", workflow_id.as_str()));
                    let value = json!({
                        "version": "1.0", "agent": "alignment-validator", "workflow_id": workflow_id.as_str(),
                        "status": "completed", "timestamp": "2026-01-01T00:00:00Z",
                        "is_aligned": is_aligned, "confidence": 0.95,
                        "matching_goals": ["Improve security"], "scope_assessment": "in",
                        "constraint_violations": [], "reasoning": "matches the authentication goal"
                    });
                    std::fs::write(path, serde_json::to_vec(&value).unwrap()).unwrap();
                    return Ok(());
                }
                let (ty, value) = Self::artifact_for(&subagent_type, workflow_id.as_str());
                let path = store_root.join(workflow_id.as_str()).join(ty.filename());
                std::fs::write(path, serde_json::to_vec(&value).unwrap()).unwrap();
                Ok(())
            })
        }
    }

    /// Fails for a configured set of subagent types; used to exercise
    /// schema-violation and halt-on-failure scenarios.
    struct FailingRuntime {
        inner: FakeRuntime,
        fail_once: Mutex<HashMap<String, bool>>,
    }

    impl AgentRuntime for FailingRuntime {
        fn invoke_subagent<'a>(
            &'a self,
            workflow_id: &'a WorkflowId,
            subagent_type: &'a str,
            description: &'a str,
            prompt: &'a str,
            _timeout: std::time::Duration,
        ) -> BoxFuture<'a, Result<()>> {
            let should_fail = {
                let mut guard = self.fail_once.lock().unwrap();
                guard.remove(subagent_type).unwrap_or(false)
            };
            if should_fail {
                let workflow_id = workflow_id.clone();
                let subagent_type = subagent_type.to_string();
                return Box::pin(async move {
                    Err(ForgeError::AgentRuntimeFailure {
                        workflow_id,
                        agent: subagent_type,
                        detail: "forced failure".to_string(),
                    })
                });
            }
            self.inner.invoke_subagent(workflow_id, subagent_type, description, prompt, _timeout)
        }
    }

    fn charter_text() -> &'static str {
        "## GOALS\n- Improve security\n\n## SCOPE\n### In Scope\n- Authentication\n\n## CONSTRAINTS\n"
    }

    fn write_charter(dir: &std::path::Path) -> PathBuf {
        let path = dir.join("PROJECT.md");
        std::fs::write(&path, charter_text()).unwrap();
        path
    }

    #[tokio::test]
    async fn happy_path_runs_to_final_report() {
        let tmp = TempDir::new().unwrap();
        let charter_path = write_charter(tmp.path());
        let store_root = tmp.path().join("workflows");
        std::fs::create_dir_all(&store_root).unwrap();
        let runtime: Arc<dyn AgentRuntime> = Arc::new(FakeRuntime { store_root: store_root.clone() });

        let coordinator = Coordinator::new(
            charter_path,
            store_root.clone(),
            tmp.path().join("logs"),
            runtime,
            0.8,
            std::time::Duration::from_secs(5),
            "default".to_string(),
            None,
        );

        let start = coordinator.start_workflow("implement user authentication with JWT tokens").await.unwrap();
        assert!(start.ok);
        let id = start.workflow_id.unwrap();

        let run = coordinator.run(&id).await.unwrap();
        assert!(run.ok, "{}", run.message);
        assert!(coordinator.store().has_artifact(&id, ArtifactType::FinalReport));
        for ty in [
            ArtifactType::Manifest,
            ArtifactType::Research,
            ArtifactType::Architecture,
            ArtifactType::TestPlan,
            ArtifactType::Implementation,
            ArtifactType::Review,
            ArtifactType::Security,
            ArtifactType::Docs,
            ArtifactType::FinalReport,
        ] {
            assert!(coordinator.store().has_artifact(&id, ty), "missing {ty}");
        }
        let report_md = coordinator.store().workflow_dir(&id).join("final-report.md");
        assert!(report_md.exists());
        let contents = std::fs::read_to_string(report_md).unwrap();
        assert!(contents.contains("manifest.json"));
    }

    #[tokio::test]
    async fn resume_after_partial_completion_finishes_the_pipeline() {
        let tmp = TempDir::new().unwrap();
        let charter_path = write_charter(tmp.path());
        let store_root = tmp.path().join("workflows");
        std::fs::create_dir_all(&store_root).unwrap();
        let runtime: Arc<dyn AgentRuntime> = Arc::new(FakeRuntime { store_root: store_root.clone() });

        let coordinator = Coordinator::new(
            charter_path,
            store_root.clone(),
            tmp.path().join("logs"),
            runtime,
            0.8,
            std::time::Duration::from_secs(5),
            "default".to_string(),
            None,
        );

        let start = coordinator.start_workflow("implement user authentication with JWT tokens").await.unwrap();
        let id = start.workflow_id.unwrap();

        // Simulate a crash after `architecture.json` but before `test-plan.json`
        // by driving the factory directly for the first two sequential stages.
        let pipeline = registry::default_pipeline();
        coordinator
            .factory
            .invoke(&pipeline[0], &id, &[], &coordinator.pipeline_names())
            .await
            .unwrap();
        coordinator
            .factory
            .invoke(&pipeline[1], &id, &["researcher".to_string()], &coordinator.pipeline_names())
            .await
            .unwrap();

        let resumed = coordinator.resume(&id).await.unwrap();
        assert!(resumed.ok, "{}", resumed.message);
        assert!(coordinator.store().has_artifact(&id, ArtifactType::FinalReport));
    }

    #[tokio::test]
    async fn alignment_refusal_creates_no_workflow_directory() {
        let tmp = TempDir::new().unwrap();
        let charter_path = write_charter(tmp.path());
        let store_root = tmp.path().join("workflows");
        std::fs::create_dir_all(&store_root).unwrap();

        struct RefusingRuntime {
            store_root: PathBuf,
        }
        impl AgentRuntime for RefusingRuntime {
            fn invoke_subagent<'a>(
                &'a self,
                workflow_id: &'a WorkflowId,
                _subagent_type: &'a str,
                _description: &'a str,
                _prompt: &'a str,
                _timeout: std::time::Duration,
            ) -> BoxFuture<'a, Result<()>> {
                let path = self.store_root.join(format!("{}.alignment-check.json", workflow_id.as_str()));
                let workflow_id = workflow_id.clone();
                Box::pin(async move {
                    let value = json!({
                        "version": "1.0", "agent": "alignment-validator", "workflow_id": workflow_id.as_str(),
                        "status": "completed", "timestamp": "2026-01-01T00:00:00Z",
                        "is_aligned": false, "confidence": 0.95,
                        "matching_goals": [], "scope_assessment": "out",
                        "constraint_violations": [], "reasoning": "out of scope: chat features are not a goal"
                    });
                    std::fs::write(path, serde_json::to_vec(&value).unwrap()).unwrap();
                    Ok(())
                })
            }
        }

        let runtime: Arc<dyn AgentRuntime> = Arc::new(RefusingRuntime { store_root: store_root.clone() });
        let coordinator = Coordinator::new(
            charter_path,
            store_root.clone(),
            tmp.path().join("logs"),
            runtime,
            0.8,
            std::time::Duration::from_secs(5),
            "default".to_string(),
            None,
        );

        let start = coordinator.start_workflow("add a chatroom to the homepage").await.unwrap();
        assert!(!start.ok);
        assert!(start.workflow_id.is_none());
        assert!(coordinator.list_workflows().unwrap().is_empty());
    }

    #[tokio::test]
    async fn schema_violation_halts_pipeline_without_downstream_artifacts() {
        let tmp = TempDir::new().unwrap();
        let charter_path = write_charter(tmp.path());
        let store_root = tmp.path().join("workflows");
        std::fs::create_dir_all(&store_root).unwrap();

        let mut fail_once = HashMap::new();
        fail_once.insert("implementer".to_string(), true);
        let runtime: Arc<dyn AgentRuntime> = Arc::new(FailingRuntime {
            inner: FakeRuntime { store_root: store_root.clone() },
            fail_once: Mutex::new(fail_once),
        });

        let coordinator = Coordinator::new(
            charter_path,
            store_root.clone(),
            tmp.path().join("logs"),
            runtime,
            0.8,
            std::time::Duration::from_secs(5),
            "default".to_string(),
            None,
        );
        let start = coordinator.start_workflow("implement user authentication with JWT tokens").await.unwrap();
        let id = start.workflow_id.unwrap();

        let run = coordinator.run(&id).await.unwrap();
        assert!(!run.ok);
        assert_eq!(run.failed_agent.as_deref(), Some("implementer"));
        assert!(!coordinator.store().has_artifact(&id, ArtifactType::Review));
    }
}
