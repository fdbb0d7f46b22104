use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use agentflow_core::config::{BackendConfig, RetryConfig};
use agentflow_core::error::{FlowError, Result};
use agentflow_core::traits::AgentBackend;
use agentflow_core::types::*;

use crate::retry::with_retry;

/// Map a transport failure, tagging timeouts and connection errors so the
/// retry layer can recognise them.
pub(crate) fn request_err(e: reqwest::Error) -> FlowError {
    if e.is_timeout() {
        FlowError::Backend(format!("timeout: {}", e))
    } else if e.is_connect() {
        FlowError::Backend(format!("connection failed: {}", e))
    } else {
        FlowError::Backend(e.to_string())
    }
}

/// Send a request and decode a JSON body, turning non-2xx into `Backend`.
pub(crate) async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let response = request.send().await.map_err(request_err)?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(FlowError::Backend(format!("HTTP {}: {}", status, body)));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| FlowError::Backend(format!("invalid response body: {}", e)))
}

#[derive(Deserialize)]
struct InvokeResponse {
    output: String,
}

#[derive(Deserialize)]
struct RegisteredWorkflow {
    id: String,
}

/// Client for the agent execution backend.
pub struct HttpAgentBackend {
    http: Client,
    base_url: String,
    retry: RetryConfig,
}

impl HttpAgentBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| FlowError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: config.retry.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl AgentBackend for HttpAgentBackend {
    fn list_agents(&self) -> BoxFuture<'_, Result<Vec<BackendAgent>>> {
        Box::pin(async move {
            let url = self.url("/agents");
            with_retry(&self.retry, "list_agents", || send_json(self.http.get(&url))).await
        })
    }

    fn create_agent(&self, agent: AgentDefinition) -> BoxFuture<'_, Result<BackendAgent>> {
        Box::pin(async move {
            let url = self.url("/agents");
            debug!(agent = %agent.name, "Creating backend agent");
            // Retrying is only safe when the backend can dedupe by id
            if agent.id.is_some() {
                with_retry(&self.retry, "create_agent", || {
                    send_json(self.http.post(&url).json(&agent))
                })
                .await
            } else {
                send_json(self.http.post(&url).json(&agent)).await
            }
        })
    }

    fn invoke(&self, target_id: &str, input: &str) -> BoxFuture<'_, Result<String>> {
        let url = self.url(&format!("/agents/{}/invoke", urlencoding::encode(target_id)));
        let body = serde_json::json!({ "input_text": input });
        Box::pin(async move {
            let response: InvokeResponse = send_json(self.http.post(&url).json(&body)).await?;
            Ok(response.output)
        })
    }

    fn register_workflow(&self, workflow: BackendWorkflow) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let url = self.url("/workflows");
            let registered: RegisteredWorkflow = with_retry(&self.retry, "register_workflow", || {
                send_json(self.http.post(&url).json(&workflow))
            })
            .await?;
            debug!(id = %registered.id, "Workflow registered with backend");
            Ok(registered.id)
        })
    }

    fn execute_workflow(
        &self,
        workflow_id: &str,
        input: &str,
    ) -> BoxFuture<'_, Result<WorkflowExecutionResult>> {
        let url = self.url(&format!(
            "/workflows/{}/execute",
            urlencoding::encode(workflow_id)
        ));
        let body = serde_json::json!({ "input_text": input });
        Box::pin(async move { send_json(self.http.post(&url).json(&body)).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn backend(base_url: String) -> HttpAgentBackend {
        HttpAgentBackend::new(&BackendConfig {
            base_url,
            request_timeout_secs: 5,
            retry: RetryConfig {
                max_retries: 2,
                initial_backoff_ms: 1,
                max_backoff_ms: 5,
            },
        })
        .unwrap()
    }

    fn fake_backend(flaky: Arc<AtomicU32>) -> Router {
        let workflows: Arc<Mutex<Vec<String>>> = Arc::default();
        let known = workflows.clone();
        Router::new()
            .route(
                "/agents",
                get(move || {
                    let flaky = flaky.clone();
                    async move {
                        if flaky.fetch_add(1, Ordering::SeqCst) == 0 {
                            return Err(StatusCode::SERVICE_UNAVAILABLE);
                        }
                        Ok(Json(json!([{"id": "a1", "name": "Researcher"}])))
                    }
                })
                .post(|Json(body): Json<Value>| async move {
                    Json(json!({"id": body["id"].as_str().unwrap_or("generated"), "name": body["name"]}))
                }),
            )
            .route(
                "/agents/{id}/invoke",
                post(|Path(id): Path<String>, Json(body): Json<Value>| async move {
                    if id == "broken" {
                        return Err((StatusCode::INTERNAL_SERVER_ERROR, "model exploded"));
                    }
                    let input = body["input_text"].as_str().unwrap_or_default();
                    Ok(Json(json!({"output": format!("{}:{}", id, input)})))
                }),
            )
            // A present id is an update and must already exist
            .route(
                "/workflows",
                post(move |Json(body): Json<Value>| {
                    let workflows = workflows.clone();
                    async move {
                        let mut workflows = workflows.lock().unwrap();
                        let id = match body["id"].as_str() {
                            Some(id) if workflows.iter().any(|w| w == id) => id.to_string(),
                            Some(_) => return Err((StatusCode::NOT_FOUND, "workflow not found")),
                            None => {
                                let id = format!("wf-{}", workflows.len() + 1);
                                workflows.push(id.clone());
                                id
                            }
                        };
                        Ok(Json(json!({"id": id, "name": body["name"]})))
                    }
                }),
            )
            .route(
                "/workflows/{id}/execute",
                post(move |Path(id): Path<String>| {
                    let known = known.clone();
                    async move {
                        if !known.lock().unwrap().contains(&id) {
                            return Err((StatusCode::NOT_FOUND, "workflow not found"));
                        }
                        Ok(Json(json!({
                            "workflow_id": id,
                            "results": [
                                {"node_id": "n1", "agent_name": "Researcher", "processed_text": "in", "output": "out"}
                            ],
                            "execution_time": 0.25,
                            "status": "success"
                        })))
                    }
                }),
            )
    }

    fn workflow(id: Option<&str>) -> BackendWorkflow {
        BackendWorkflow {
            id: id.map(str::to_string),
            name: "Flow".into(),
            description: String::new(),
            nodes: vec![],
            edges: vec![],
        }
    }

    #[tokio::test]
    async fn test_list_agents_retries_transient_failure() {
        let hits = Arc::new(AtomicU32::new(0));
        let base = serve(fake_backend(hits.clone())).await;
        let agents = backend(base).list_agents().await.unwrap();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].id, "a1");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invoke_and_error_body() {
        let base = serve(fake_backend(Arc::new(AtomicU32::new(1)))).await;
        let client = backend(base);
        assert_eq!(client.invoke("a1", "hello").await.unwrap(), "a1:hello");

        let err = client.invoke("broken", "hello").await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("500"), "{}", msg);
        assert!(msg.contains("model exploded"), "{}", msg);
    }

    #[tokio::test]
    async fn test_create_agent() {
        let base = serve(fake_backend(Arc::new(AtomicU32::new(1)))).await;
        let created = backend(base)
            .create_agent(AgentDefinition {
                id: Some("a9".into()),
                name: "Writer".into(),
                description: String::new(),
                prompt: "Write.".into(),
            })
            .await
            .unwrap();
        assert_eq!(created.id, "a9");
    }

    #[tokio::test]
    async fn test_register_and_execute() {
        let base = serve(fake_backend(Arc::new(AtomicU32::new(1)))).await;
        let client = backend(base);
        let id = client.register_workflow(workflow(None)).await.unwrap();
        assert_eq!(id, "wf-1");
        let result = client.execute_workflow(&id, "in").await.unwrap();
        assert_eq!(result.status, RunStatus::Success);
        assert_eq!(result.workflow_id, "wf-1");
        assert_eq!(result.final_output(), Some("out"));

        // Re-registering a known id updates in place
        assert_eq!(client.register_workflow(workflow(Some("wf-1"))).await.unwrap(), "wf-1");
    }

    #[tokio::test]
    async fn test_register_unknown_id_is_not_found() {
        let base = serve(fake_backend(Arc::new(AtomicU32::new(1)))).await;
        let client = backend(base);
        let err = client
            .register_workflow(workflow(Some("local-id")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("404"), "{}", err);

        let err = client.execute_workflow("local-id", "in").await.unwrap_err();
        assert!(err.to_string().contains("404"), "{}", err);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_connection_error() {
        let mut client = backend("http://127.0.0.1:9".into());
        client.retry.max_retries = 0;
        let err = client.list_agents().await.unwrap_err();
        assert!(matches!(err, FlowError::Backend(_)));
    }
}
