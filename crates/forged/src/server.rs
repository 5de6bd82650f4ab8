//! HTTP control-plane server for forged.
//!
//! Exposes the workflow coordinator (C7) over a local-only REST API plus an
//! SSE log stream, for `forgectl` and any other local client.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::coordinator::Coordinator;
use crate::events;
use forge_core::WorkflowId;

pub struct AppState {
    pub coordinator: Arc<Coordinator>,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/workflows", post(start_workflow).get(list_workflows))
        .route("/workflows/resumable", get(list_resumable))
        .route("/workflows/{id}", get(get_workflow))
        .route("/workflows/{id}/run", post(run_workflow))
        .route("/workflows/{id}/resume", post(resume_workflow))
        .route("/workflows/{id}/logs", get(get_logs))
        .route("/workflows/{id}/logs/stream", get(stream_logs))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind to localhost only: this engine drives one workflow at a time per
/// coordinator instance and has no multi-user concurrency story.
pub async fn serve(coordinator: Arc<Coordinator>, bind_addr: &str) -> eyre::Result<()> {
    let state = Arc::new(AppState { coordinator });
    let router = create_router(state);
    let addr: SocketAddr = bind_addr.parse()?;
    info!(%addr, "forged listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn internal_error(context: &str, err: impl std::fmt::Display) -> (StatusCode, Json<ErrorResponse>) {
    error!(%err, context, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: format!("{context}: {err}") }))
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct StartWorkflowRequest {
    request: String,
}

#[derive(Debug, Serialize)]
struct StartWorkflowResponse {
    ok: bool,
    message: String,
    workflow_id: Option<String>,
}

async fn start_workflow(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StartWorkflowRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let outcome = state
        .coordinator
        .start_workflow(&body.request)
        .await
        .map_err(|e| internal_error("start_workflow", e))?;

    let status = if outcome.ok { StatusCode::CREATED } else { StatusCode::OK };
    Ok((
        status,
        Json(StartWorkflowResponse {
            ok: outcome.ok,
            message: outcome.message,
            workflow_id: outcome.workflow_id.map(|id| id.as_str().to_string()),
        }),
    ))
}

#[derive(Debug, Serialize)]
struct ListWorkflowsResponse {
    workflow_ids: Vec<String>,
}

async fn list_workflows(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let ids = state.coordinator.list_workflows().map_err(|e| internal_error("list_workflows", e))?;
    Ok(Json(ListWorkflowsResponse {
        workflow_ids: ids.into_iter().map(|id| id.as_str().to_string()).collect(),
    }))
}

async fn list_resumable(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let resumable = state.coordinator.list_resumable().map_err(|e| internal_error("list_resumable", e))?;
    Ok(Json(resumable))
}

#[derive(Debug, Serialize)]
struct GetWorkflowResponse {
    workflow_id: String,
    artifacts: Vec<String>,
}

async fn get_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let workflow_id = WorkflowId::from_string(id);
    let artifacts = state
        .coordinator
        .store()
        .list_artifacts(&workflow_id)
        .map_err(|e| internal_error("get_workflow", e))?;
    if artifacts.is_empty() && !state.coordinator.store().workflow_dir(&workflow_id).exists() {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse { error: format!("workflow {} not found", workflow_id.as_str()) }),
        ));
    }
    Ok(Json(GetWorkflowResponse {
        workflow_id: workflow_id.as_str().to_string(),
        artifacts: artifacts.into_iter().map(|ty| ty.filename()).collect(),
    }))
}

#[derive(Debug, Serialize)]
struct RunResponse {
    ok: bool,
    message: String,
    workflow_id: String,
    failed_agent: Option<String>,
}

async fn run_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let workflow_id = WorkflowId::from_string(id);
    let outcome = state
        .coordinator
        .run(&workflow_id)
        .await
        .map_err(|e| internal_error("run_workflow", e))?;
    Ok(Json(RunResponse {
        ok: outcome.ok,
        message: outcome.message,
        workflow_id: outcome.workflow_id.as_str().to_string(),
        failed_agent: outcome.failed_agent,
    }))
}

async fn resume_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let workflow_id = WorkflowId::from_string(id);
    let outcome = state
        .coordinator
        .resume(&workflow_id)
        .await
        .map_err(|e| internal_error("resume_workflow", e))?;
    Ok(Json(RunResponse {
        ok: outcome.ok,
        message: outcome.message,
        workflow_id: outcome.workflow_id.as_str().to_string(),
        failed_agent: outcome.failed_agent,
    }))
}

async fn get_logs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let workflow_id = WorkflowId::from_string(id);
    let events = events::read_workflow_events(state.coordinator.log_dir(), &workflow_id)
        .map_err(|e| internal_error("get_logs", e))?;
    Ok(Json(events))
}

/// Poll-based SSE stream of new events for a workflow, for `forgectl logs --follow`.
async fn stream_logs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let workflow_id = WorkflowId::from_string(id);
    let log_dir = state.coordinator.log_dir().to_path_buf();

    let stream = stream::unfold((log_dir, workflow_id, 0usize), |(log_dir, workflow_id, sent)| async move {
        loop {
            let events = events::read_workflow_events(&log_dir, &workflow_id).unwrap_or_default();
            if events.len() > sent {
                let next = events[sent].clone();
                let json = serde_json::to_string(&next).unwrap_or_default();
                return Some((Ok(SseEvent::default().data(json)), (log_dir, workflow_id, sent + 1)));
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
