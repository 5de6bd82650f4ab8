//! Integration tests for the HTTP control-plane server.
//!
//! Drives `forged`'s REST API end to end (start, run, list, resume, logs)
//! against a deterministic fake agent runtime.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use forge_core::{ArtifactType, WorkflowId};
use forged::agent_runtime::{AgentRuntime, BoxFuture};
use forged::coordinator::Coordinator;
use forged::server::{create_router, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

fn charter_text() -> &'static str {
    "## GOALS\n- Improve security\n\n## SCOPE\n### In Scope\n- Authentication\n\n## CONSTRAINTS\n"
}

/// Writes a minimally valid artifact for every pipeline stage, and an
/// aligned `alignment-check` response, keyed off the subagent type.
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
    ) -> BoxFuture<'a, forged::agent_runtime::Result<()>> {
        let store_root = self.store_root.clone();
        let workflow_id = workflow_id.clone();
        let subagent_type = subagent_type.to_string();
        Box::pin(async move {
            if subagent_type == "alignment-validator" {
                let path = store_root.join(format!("{}.alignment-check.json", workflow_id.as_str()));
                let value = json!({
                    "version": "1.0", "agent": "alignment-validator", "workflow_id": workflow_id.as_str(),
                    "status": "completed", "timestamp": "2026-01-01T00:00:00Z",
                    "is_aligned": true, "confidence": 0.95,
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

async fn create_test_app() -> (axum::Router, TempDir) {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("PROJECT.md"), charter_text()).unwrap();
    let store_root = dir.path().join("workflows");
    std::fs::create_dir_all(&store_root).unwrap();

    let runtime: Arc<dyn AgentRuntime> = Arc::new(FakeRuntime { store_root: store_root.clone() });
    let coordinator = Arc::new(Coordinator::new(
        dir.path().join("PROJECT.md"),
        store_root,
        dir.path().join("logs"),
        runtime,
        0.8,
        std::time::Duration::from_secs(5),
        "default".to_string(),
        None,
    ));
    let state = Arc::new(AppState { coordinator });
    (create_router(state), dir)
}

async fn body_to_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn start_run_round_trip_produces_final_report() {
    let (app, _dir) = create_test_app().await;

    let start_response = app
        .clone()
        .oneshot(post("/workflows", json!({ "request": "implement user authentication with JWT tokens" })))
        .await
        .unwrap();
    assert_eq!(start_response.status(), StatusCode::CREATED);
    let start_body = body_to_json(start_response).await;
    assert_eq!(start_body["ok"], true);
    let workflow_id = start_body["workflow_id"].as_str().unwrap().to_string();

    let run_response = app.clone().oneshot(post(&format!("/workflows/{workflow_id}/run"), json!({}))).await.unwrap();
    assert_eq!(run_response.status(), StatusCode::OK);
    let run_body = body_to_json(run_response).await;
    assert_eq!(run_body["ok"], true, "{run_body}");

    let get_response = app.clone().oneshot(get(&format!("/workflows/{workflow_id}"))).await.unwrap();
    assert_eq!(get_response.status(), StatusCode::OK);
    let get_body = body_to_json(get_response).await;
    let artifacts: Vec<String> =
        get_body["artifacts"].as_array().unwrap().iter().map(|v| v.as_str().unwrap().to_string()).collect();
    assert!(artifacts.contains(&"final-report.json".to_string()));
    assert!(artifacts.contains(&"manifest.json".to_string()));
}

#[tokio::test]
async fn alignment_refusal_returns_ok_false_without_creating_workflow() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("PROJECT.md"), charter_text()).unwrap();
    let store_root = dir.path().join("workflows");
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
        ) -> BoxFuture<'a, forged::agent_runtime::Result<()>> {
            let path = self.store_root.join(format!("{}.alignment-check.json", workflow_id.as_str()));
            let workflow_id = workflow_id.clone();
            Box::pin(async move {
                let value = json!({
                    "version": "1.0", "agent": "alignment-validator", "workflow_id": workflow_id.as_str(),
                    "status": "completed", "timestamp": "2026-01-01T00:00:00Z",
                    "is_aligned": false, "confidence": 0.9,
                    "matching_goals": [], "scope_assessment": "out",
                    "constraint_violations": [], "reasoning": "out of scope: not an authentication feature"
                });
                std::fs::write(path, serde_json::to_vec(&value).unwrap()).unwrap();
                Ok(())
            })
        }
    }

    let runtime: Arc<dyn AgentRuntime> = Arc::new(RefusingRuntime { store_root: store_root.clone() });
    let coordinator = Arc::new(Coordinator::new(
        dir.path().join("PROJECT.md"),
        store_root,
        dir.path().join("logs"),
        runtime,
        0.8,
        std::time::Duration::from_secs(5),
        "default".to_string(),
        None,
    ));
    let state = Arc::new(AppState { coordinator });
    let app = create_router(state);

    let response =
        app.clone().oneshot(post("/workflows", json!({ "request": "add a chatroom to the homepage" }))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response).await;
    assert_eq!(body["ok"], false);
    assert!(body["workflow_id"].is_null());

    let list_response = app.oneshot(get("/workflows")).await.unwrap();
    let list_body = body_to_json(list_response).await;
    assert_eq!(list_body["workflow_ids"], json!([]));
}

#[tokio::test]
async fn logs_endpoint_returns_events_recorded_during_run() {
    let (app, _dir) = create_test_app().await;

    let start_response = app
        .clone()
        .oneshot(post("/workflows", json!({ "request": "implement user authentication with JWT tokens" })))
        .await
        .unwrap();
    let start_body = body_to_json(start_response).await;
    let workflow_id = start_body["workflow_id"].as_str().unwrap().to_string();

    app.clone().oneshot(post(&format!("/workflows/{workflow_id}/run"), json!({}))).await.unwrap();

    let logs_response = app.oneshot(get(&format!("/workflows/{workflow_id}/logs"))).await.unwrap();
    assert_eq!(logs_response.status(), StatusCode::OK);
    let logs_body = body_to_json(logs_response).await;
    assert!(logs_body.as_array().map(|a| !a.is_empty()).unwrap_or(false), "{logs_body}");
}

#[tokio::test]
async fn resumable_list_reflects_partial_progress() {
    let (app, _dir) = create_test_app().await;

    let start_response = app
        .clone()
        .oneshot(post("/workflows", json!({ "request": "implement user authentication with JWT tokens" })))
        .await
        .unwrap();
    let start_body = body_to_json(start_response).await;
    let workflow_id = start_body["workflow_id"].as_str().unwrap().to_string();

    let resumable_response = app.oneshot(get("/workflows/resumable")).await.unwrap();
    assert_eq!(resumable_response.status(), StatusCode::OK);
    let resumable_body = body_to_json(resumable_response).await;
    let rows = resumable_body.as_array().unwrap();
    assert!(rows.iter().any(|r| r["workflow_id"] == workflow_id));
}
