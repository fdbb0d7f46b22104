use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use agentflow_core::types::WorkflowPatch;
use agentflow_engine::RunTarget;
use agentflow_graph::document::{CreateWorkflowBody, UpdateWorkflowBody, WorkflowDocument};
use agentflow_graph::EditCommand;
use agentflow_store::migrate_legacy_store;

use crate::auth::Access;
use crate::error::{execution_failure, ApiError};
use crate::middleware::Authenticated;
use crate::state::AppState;

type ApiResult<T> = Result<T, ApiError>;

// GET /health (no auth)
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// GET /workflows (viewer)
pub async fn list_workflows(
    auth: Authenticated,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<WorkflowDocument>>> {
    auth.require(Access::Read)?;
    let workflows = state.store.list().await?;
    Ok(Json(workflows.iter().map(WorkflowDocument::from).collect()))
}

// POST /workflows (operator)
pub async fn create_workflow(
    auth: Authenticated,
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateWorkflowBody>,
) -> ApiResult<(StatusCode, Json<WorkflowDocument>)> {
    auth.require(Access::Write)?;
    let saved = state.store.create(body.into_new()?).await?;
    info!(id = %saved.id, name = %saved.name, by = %auth.0.name, "Workflow created");
    Ok((StatusCode::CREATED, Json(WorkflowDocument::from(&saved))))
}

// GET /workflows/{id} (viewer)
pub async fn get_workflow(
    auth: Authenticated,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<WorkflowDocument>> {
    auth.require(Access::Read)?;
    let saved = state.store.get(&id).await?;
    Ok(Json(WorkflowDocument::from(&saved)))
}

// PUT /workflows/{id} (operator)
pub async fn update_workflow(
    auth: Authenticated,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateWorkflowBody>,
) -> ApiResult<Json<WorkflowDocument>> {
    auth.require(Access::Write)?;
    let saved = state.store.update(&id, body.into_patch()?).await?;
    info!(id = %saved.id, "Workflow updated");
    Ok(Json(WorkflowDocument::from(&saved)))
}

// DELETE /workflows/{id} (operator)
pub async fn delete_workflow(
    auth: Authenticated,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    auth.require(Access::Write)?;
    state.store.delete(&id).await?;
    state.close_canvas(&id);
    state.orchestrator.forget(&id);
    info!(id = %id, "Workflow deleted");
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
pub struct MigrateBody {
    #[serde(default)]
    pub workflows: Vec<Value>,
}

// POST /workflows/migrate (admin)
pub async fn migrate_workflows(
    auth: Authenticated,
    State(state): State<Arc<AppState>>,
    Json(body): Json<MigrateBody>,
) -> ApiResult<Json<Value>> {
    auth.require(Access::Admin)?;
    let report = migrate_legacy_store(state.store.as_ref(), body.workflows).await;
    let workflows: Vec<WorkflowDocument> =
        report.workflows.iter().map(WorkflowDocument::from).collect();
    Ok(Json(json!({
        "success": true,
        "migratedCount": report.migrated_count,
        "alreadyExisted": report.already_existed,
        "failed": report.failed,
        "totalAttempted": report.total_attempted,
        "workflows": workflows,
    })))
}

// POST /workflows/{id}/edit (operator)
pub async fn edit_workflow(
    auth: Authenticated,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(command): Json<EditCommand>,
) -> ApiResult<Json<Value>> {
    auth.require(Access::Write)?;
    let current = state.store.get(&id).await?;
    // The stored graph wins over whatever the canvas held from earlier edits
    let canvas = state.canvas(&id)?;
    canvas.load(current.graph).await?;
    let outcome = canvas.edit(command).await?;
    let saved = state
        .store
        .update(
            &id,
            WorkflowPatch {
                graph: Some(outcome.graph),
                ..Default::default()
            },
        )
        .await?;
    Ok(Json(json!({
        "workflow": WorkflowDocument::from(&saved),
        "createdId": outcome.created,
    })))
}

#[derive(Deserialize)]
pub struct ExecuteBody {
    #[serde(default, alias = "inputText")]
    pub input_text: String,
}

// POST /workflows/{id}/execute (operator)
pub async fn execute_workflow(
    auth: Authenticated,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ExecuteBody>,
) -> ApiResult<Response> {
    auth.require(Access::Write)?;
    info!(id = %id, by = %auth.0.name, "Execution requested");
    Ok(run(&state, RunTarget::Saved(id), &body.input_text).await)
}

#[derive(Deserialize)]
pub struct DraftExecutionBody {
    #[serde(flatten)]
    pub workflow: CreateWorkflowBody,
    #[serde(default, alias = "inputText")]
    pub input_text: String,
}

// POST /executions (operator): run an unsaved draft, persisting it first
pub async fn execute_draft(
    auth: Authenticated,
    State(state): State<Arc<AppState>>,
    Json(body): Json<DraftExecutionBody>,
) -> ApiResult<Response> {
    auth.require(Access::Write)?;
    let draft = body.workflow.into_new()?;
    info!(name = %draft.name, by = %auth.0.name, "Draft execution requested");
    Ok(run(&state, RunTarget::Draft(draft), &body.input_text).await)
}

async fn run(state: &AppState, target: RunTarget, input: &str) -> Response {
    match state.orchestrator.execute(target, input).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => {
            warn!(error = %e, "Execution failed");
            execution_failure(e)
        }
    }
}

// POST /workflows/{id}/cancel (operator)
pub async fn cancel_run(
    auth: Authenticated,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    auth.require(Access::Write)?;
    let cancelled = state.orchestrator.cancel(&id);
    Ok(Json(json!({ "cancelled": cancelled })))
}

// GET /workflows/{id}/run (viewer)
pub async fn run_state(
    auth: Authenticated,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    auth.require(Access::Read)?;
    Ok(Json(json!({ "state": state.orchestrator.state(&id) })))
}
