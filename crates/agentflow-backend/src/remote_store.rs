use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use agentflow_core::error::{FlowError, Result};
use agentflow_core::traits::WorkflowStore;
use agentflow_core::types::{NewWorkflow, SavedWorkflow, WorkflowPatch};
use agentflow_graph::document::{CreateWorkflowBody, UpdateWorkflowBody, WorkflowDocument};

use crate::client::request_err;

/// `WorkflowStore` backed by a remote persistence gateway's REST surface.
pub struct HttpWorkflowStore {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpWorkflowStore {
    pub fn new(base_url: &str, token: Option<String>, timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| FlowError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn workflow_path(id: &str) -> String {
        format!("/workflows/{}", urlencoding::encode(id))
    }
}

/// Pull the `error` field out of a gateway error body, falling back to raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
        .unwrap_or_else(|| body.to_string())
}

async fn send<T: DeserializeOwned>(request: RequestBuilder, id: Option<&str>) -> Result<T> {
    let response = request.send().await.map_err(request_err)?;
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| FlowError::Backend(format!("invalid response body: {}", e)));
    }
    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::NOT_FOUND => FlowError::not_found("workflow", id.unwrap_or_default()),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            FlowError::Validation(error_message(&body))
        }
        _ => FlowError::Backend(format!("HTTP {}: {}", status, error_message(&body))),
    })
}

impl WorkflowStore for HttpWorkflowStore {
    fn create(&self, workflow: NewWorkflow) -> BoxFuture<'_, Result<SavedWorkflow>> {
        Box::pin(async move {
            let body = CreateWorkflowBody::from_new(&workflow);
            let doc: WorkflowDocument = send(
                self.request(reqwest::Method::POST, "/workflows").json(&body),
                None,
            )
            .await?;
            debug!(id = %doc.id, "Workflow created remotely");
            doc.into_saved()
        })
    }

    fn list(&self) -> BoxFuture<'_, Result<Vec<SavedWorkflow>>> {
        Box::pin(async move {
            let docs: Vec<WorkflowDocument> =
                send(self.request(reqwest::Method::GET, "/workflows"), None).await?;
            docs.into_iter().map(WorkflowDocument::into_saved).collect()
        })
    }

    fn get(&self, id: &str) -> BoxFuture<'_, Result<SavedWorkflow>> {
        let id = id.to_string();
        Box::pin(async move {
            let doc: WorkflowDocument = send(
                self.request(reqwest::Method::GET, &Self::workflow_path(&id)),
                Some(&id),
            )
            .await?;
            doc.into_saved()
        })
    }

    fn find_by_name(&self, name: &str) -> BoxFuture<'_, Result<Option<SavedWorkflow>>> {
        let name = name.trim().to_string();
        Box::pin(async move {
            // No server-side lookup; oldest match wins like the SQLite store
            let all = self.list().await?;
            Ok(all.into_iter().rev().find(|w| w.name == name))
        })
    }

    fn update(&self, id: &str, patch: WorkflowPatch) -> BoxFuture<'_, Result<SavedWorkflow>> {
        let id = id.to_string();
        Box::pin(async move {
            let body = UpdateWorkflowBody::from_patch(&patch);
            let doc: WorkflowDocument = send(
                self.request(reqwest::Method::PUT, &Self::workflow_path(&id))
                    .json(&body),
                Some(&id),
            )
            .await?;
            doc.into_saved()
        })
    }

    fn delete(&self, id: &str) -> BoxFuture<'_, Result<()>> {
        let id = id.to_string();
        Box::pin(async move {
            let _: serde_json::Value = send(
                self.request(reqwest::Method::DELETE, &Self::workflow_path(&id)),
                Some(&id),
            )
            .await?;
            Ok(())
        })
    }
}
