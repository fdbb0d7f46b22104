use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use agentflow_core::config::GatewayConfig;
use agentflow_core::error::{FlowError, Result};
use agentflow_core::model::Graph;
use agentflow_core::traits::WorkflowStore;
use agentflow_engine::Orchestrator;
use agentflow_graph::{Canvas, CanvasHandle};

/// Shared application state for axum handlers.
pub struct AppState {
    pub config: GatewayConfig,
    pub store: Arc<dyn WorkflowStore>,
    pub orchestrator: Arc<Orchestrator>,
    /// One editing canvas per workflow, so edits to it apply in order.
    canvases: Mutex<HashMap<String, CanvasHandle>>,
}

impl AppState {
    /// The store is taken from the orchestrator so both see the same records.
    pub fn new(config: GatewayConfig, orchestrator: Arc<Orchestrator>) -> Arc<Self> {
        Arc::new(Self {
            config,
            store: orchestrator.store().clone(),
            orchestrator,
            canvases: Mutex::new(HashMap::new()),
        })
    }

    /// Editing canvas for `workflow_id`, spawned on first use.
    pub fn canvas(&self, workflow_id: &str) -> Result<CanvasHandle> {
        let mut canvases = self
            .canvases
            .lock()
            .map_err(|e| FlowError::Internal(format!("canvas sessions poisoned: {}", e)))?;
        Ok(canvases
            .entry(workflow_id.to_string())
            .or_insert_with(|| Canvas::spawn(Graph::new()))
            .clone())
    }

    /// Drop the canvas of `workflow_id`. Its task ends with the last handle.
    pub fn close_canvas(&self, workflow_id: &str) -> bool {
        self.canvases
            .lock()
            .map(|mut canvases| canvases.remove(workflow_id).is_some())
            .unwrap_or(false)
    }

    pub fn open_canvases(&self) -> usize {
        self.canvases.lock().map(|c| c.len()).unwrap_or(0)
    }
}
