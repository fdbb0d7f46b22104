use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use agentflow_core::config::GatewayConfig;
use agentflow_engine::Orchestrator;

use crate::routes;
use crate::state::AppState;

/// Build the REST router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route(
            "/workflows",
            get(routes::list_workflows).post(routes::create_workflow),
        )
        .route("/workflows/migrate", post(routes::migrate_workflows))
        .route(
            "/workflows/{id}",
            get(routes::get_workflow)
                .put(routes::update_workflow)
                .delete(routes::delete_workflow),
        )
        .route("/workflows/{id}/edit", post(routes::edit_workflow))
        .route("/workflows/{id}/execute", post(routes::execute_workflow))
        .route("/workflows/{id}/cancel", post(routes::cancel_run))
        .route("/workflows/{id}/run", get(routes::run_state))
        .route("/executions", post(routes::execute_draft))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// HTTP gateway for workflow persistence and execution.
pub struct GatewayServer {
    config: GatewayConfig,
    orchestrator: Arc<Orchestrator>,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    /// Serve until the cancellation token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let app = router(AppState::new(self.config.clone(), self.orchestrator.clone()));

        let listener = TcpListener::bind(&self.config.bind).await?;
        info!(bind = %self.config.bind, "Gateway listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use agentflow_core::config::{ApiKeyConfig, ApiKeyRole, ExecutionConfig};
    use agentflow_core::event::EventBus;
    use agentflow_graph::document::CreateWorkflowBody;
    use agentflow_test_utils::*;

    fn state_with(config: GatewayConfig, backend: Arc<EchoBackend>) -> Arc<AppState> {
        let orchestrator = Arc::new(Orchestrator::new(
            memory_store(),
            backend,
            Arc::new(FixedCatalog::default()),
            Arc::new(EventBus::default()),
            ExecutionConfig::default(),
        ));
        AppState::new(config, orchestrator)
    }

    fn app_with(config: GatewayConfig, backend: Arc<EchoBackend>) -> Router {
        router(state_with(config, backend))
    }

    fn app() -> Router {
        app_with(
            GatewayConfig::default(),
            EchoBackend::new().with_agents(&["a", "b"]).into_arc(),
        )
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(b) => builder.body(Body::from(b.to_string())).unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn create_body(name: &str, agents: &[&str]) -> Value {
        serde_json::to_value(CreateWorkflowBody::from_new(&new_workflow(name, agents))).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(&app(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_crud_lifecycle() {
        let app = app();
        let (status, created) = call(&app, "POST", "/workflows", Some(create_body("Pipeline", &["a"]))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["nodeCount"], 3);
        assert_eq!(created["agentCount"], 1);
        let id = created["id"].as_str().unwrap().to_string();

        let (_, listed) = call(&app, "GET", "/workflows", None).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let (status, updated) = call(
            &app,
            "PUT",
            &format!("/workflows/{}", id),
            Some(json!({"name": "Renamed"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["name"], "Renamed");
        assert_eq!(updated["nodes"], created["nodes"]);

        let (status, body) = call(&app, "DELETE", &format!("/workflows/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (status, body) = call(&app, "GET", &format!("/workflows/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_invalid_name_is_bad_request() {
        let (status, body) = call(&app(), "POST", "/workflows", Some(create_body("ab", &[]))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_edit_route() {
        let app = app();
        let (_, created) = call(&app, "POST", "/workflows", Some(create_body("Editable", &[]))).await;
        let id = created["id"].as_str().unwrap();

        let (status, body) = call(
            &app,
            "POST",
            &format!("/workflows/{}/edit", id),
            Some(json!({
                "action": "insert_node_on_edge",
                "edge_id": "edge-end",
                "node": {"type": "agent", "agent": {"id": "a", "name": "Agent a"}},
                "position": {"x": 300.0, "y": 200.0}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["workflow"]["agentCount"], 1);
        assert!(body["createdId"].as_str().unwrap().starts_with("agent-"));

        let (status, _) = call(
            &app,
            "POST",
            &format!("/workflows/{}/edit", id),
            Some(json!({"action": "remove_node", "node_id": "start"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (_, after) = call(&app, "GET", &format!("/workflows/{}", id), None).await;
        assert_eq!(after["nodeCount"], 3);
    }

    #[tokio::test]
    async fn test_execute_saved_and_draft() {
        let app = app();
        let (_, created) = call(&app, "POST", "/workflows", Some(create_body("Runner", &["a", "b"]))).await;
        let id = created["id"].as_str().unwrap();

        let (status, result) = call(
            &app,
            "POST",
            &format!("/workflows/{}/execute", id),
            Some(json!({"input_text": "go"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(result["status"], "success");
        assert_eq!(result["results"].as_array().unwrap().len(), 2);

        let (_, run) = call(&app, "GET", &format!("/workflows/{}/run", id), None).await;
        assert_eq!(run["state"], "completed");

        let mut draft = create_body("Draft run", &["a"]);
        draft["input_text"] = json!("hi");
        let (status, result) = call(&app, "POST", "/executions", Some(draft)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(result["results"][0]["output"], "HI [a]");

        let (_, listed) = call(&app, "GET", "/workflows", None).await;
        assert_eq!(listed.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_execute_failure_body() {
        let app = app_with(
            GatewayConfig::default(),
            EchoBackend::new().with_agents(&["a"]).fail_on("a").into_arc(),
        );
        let (_, created) = call(&app, "POST", "/workflows", Some(create_body("Failing", &["a"]))).await;
        let id = created["id"].as_str().unwrap();
        let (status, body) = call(
            &app,
            "POST",
            &format!("/workflows/{}/execute", id),
            Some(json!({"input_text": "go"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["status"], "failed");
        assert_eq!(body["failedStep"]["nodeId"], "node-a");
    }

    #[tokio::test]
    async fn test_delete_clears_run_state_and_canvas() {
        let state = state_with(
            GatewayConfig::default(),
            EchoBackend::new().with_agents(&["a"]).into_arc(),
        );
        let app = router(state.clone());
        let (_, created) = call(&app, "POST", "/workflows", Some(create_body("Short lived", &[]))).await;
        let id = created["id"].as_str().unwrap();

        let (status, _) = call(
            &app,
            "POST",
            &format!("/workflows/{}/edit", id),
            Some(json!({
                "action": "insert_node_on_edge",
                "edge_id": "edge-end",
                "node": {"type": "agent", "agent": {"id": "a", "name": "Agent a"}},
                "position": {"x": 300.0, "y": 200.0}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state.open_canvases(), 1);

        let (status, _) = call(
            &app,
            "POST",
            &format!("/workflows/{}/execute", id),
            Some(json!({"input_text": "go"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (_, run) = call(&app, "GET", &format!("/workflows/{}/run", id), None).await;
        assert_eq!(run["state"], "completed");

        let (status, _) = call(&app, "DELETE", &format!("/workflows/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state.open_canvases(), 0);
        let (_, run) = call(&app, "GET", &format!("/workflows/{}/run", id), None).await;
        assert_eq!(run["state"], "idle");

        // Runs against ids that do not exist leave nothing behind either
        let (status, _) = call(
            &app,
            "POST",
            "/workflows/ghost/execute",
            Some(json!({"input_text": "go"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(!state.orchestrator.forget("ghost"));
    }

    #[tokio::test]
    async fn test_cancel_without_run() {
        let (status, body) = call(&app(), "POST", "/workflows/nope/cancel", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cancelled"], false);
    }

    #[tokio::test]
    async fn test_migrate() {
        let app = app();
        let records = json!({"workflows": [
            {"name": "Legacy one", "nodes": [], "edges": []},
            {"name": "Legacy one"},
            42
        ]});
        let (status, body) = call(&app, "POST", "/workflows/migrate", Some(records)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["migratedCount"], 1);
        assert_eq!(body["alreadyExisted"], 1);
        assert_eq!(body["failed"], 1);
        assert_eq!(body["totalAttempted"], 3);
    }

    #[tokio::test]
    async fn test_role_enforcement() {
        let config = GatewayConfig {
            api_keys: vec![ApiKeyConfig {
                name: "dashboard".into(),
                key: "ak_view".into(),
                role: ApiKeyRole::Viewer,
            }],
            ..Default::default()
        };
        let app = app_with(config, EchoBackend::new().into_arc());

        let (status, _) = call(&app, "GET", "/workflows", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .uri("/workflows")
            .header("authorization", "Bearer ak_view")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let request = Request::builder()
            .method("POST")
            .uri("/workflows")
            .header("authorization", "Bearer ak_view")
            .header("content-type", "application/json")
            .body(Body::from(create_body("Forbidden", &[]).to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
