use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use agentflow_core::error::FlowError;

/// Error returned by every handler. Renders as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    Flow(FlowError),
    Status(StatusCode, String),
}

impl ApiError {
    pub fn unauthorized() -> Self {
        Self::Status(StatusCode::UNAUTHORIZED, "authentication required".into())
    }

    pub fn forbidden(who: &str) -> Self {
        Self::Status(
            StatusCode::FORBIDDEN,
            format!("{} is not allowed to do this", who),
        )
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Flow(e) => status_for(e),
            Self::Status(code, _) => *code,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Flow(e) => e.to_string(),
            Self::Status(_, msg) => msg.clone(),
        }
    }
}

impl From<FlowError> for ApiError {
    fn from(e: FlowError) -> Self {
        Self::Flow(e)
    }
}

pub fn status_for(e: &FlowError) -> StatusCode {
    match e {
        FlowError::Validation(_) | FlowError::PersistFailed(_) => StatusCode::BAD_REQUEST,
        FlowError::NotFound { .. } | FlowError::EdgeNotFound(_) => StatusCode::NOT_FOUND,
        FlowError::RunInProgress(_) | FlowError::Cancelled => StatusCode::CONFLICT,
        FlowError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        FlowError::StepExecutionFailed { .. }
        | FlowError::AgentSyncFailed { .. }
        | FlowError::Backend(_) => StatusCode::BAD_GATEWAY,
        FlowError::Database(_)
        | FlowError::Config(_)
        | FlowError::ConfigNotFound(_)
        | FlowError::Io(_)
        | FlowError::Json(_)
        | FlowError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.message(), "Request failed");
        }
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}

/// Failure body for the execute routes: `{status, error, failedStep?}`.
pub fn execution_failure(e: FlowError) -> Response {
    let failed_step = match &e {
        FlowError::StepExecutionFailed {
            index,
            node_id,
            agent_name,
            ..
        } => Some(json!({
            "index": index,
            "nodeId": node_id,
            "agentName": agent_name,
        })),
        _ => None,
    };
    let mut body = json!({
        "status": "failed",
        "error": e.to_string(),
    });
    if let Some(step) = failed_step {
        body["failedStep"] = step;
    }
    (status_for(&e), Json(body)).into_response()
}
