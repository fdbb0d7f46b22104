use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use agentflow_core::error::{FlowError, Result};
use agentflow_core::model::Graph;

use crate::edit::{EditCommand, EditOutcome};

/// A request queued for the canvas.
pub enum CanvasRequest {
    Edit {
        command: EditCommand,
        respond: oneshot::Sender<Result<EditOutcome>>,
    },
    Snapshot {
        respond: oneshot::Sender<Graph>,
    },
    Load {
        graph: Graph,
        respond: oneshot::Sender<Result<()>>,
    },
}

/// Owns the in-memory graph of an editing session and applies requests
/// one at a time, in arrival order.
pub struct Canvas {
    graph: Graph,
    rx: mpsc::Receiver<CanvasRequest>,
}

/// Cloneable sender side of a `Canvas`.
#[derive(Clone)]
pub struct CanvasHandle {
    tx: mpsc::Sender<CanvasRequest>,
}

impl Canvas {
    pub fn new(graph: Graph, buffer: usize) -> (Self, CanvasHandle) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { graph, rx }, CanvasHandle { tx })
    }

    /// Create a canvas and run it on a background task.
    pub fn spawn(graph: Graph) -> CanvasHandle {
        let (canvas, handle) = Self::new(graph, 64);
        tokio::spawn(canvas.run());
        handle
    }

    /// Process requests until every handle is dropped.
    pub async fn run(mut self) {
        while let Some(request) = self.rx.recv().await {
            match request {
                CanvasRequest::Edit { command, respond } => {
                    let outcome = command.apply(&self.graph);
                    match &outcome {
                        Ok(ok) => self.graph = ok.graph.clone(),
                        Err(e) => warn!(error = %e, "Canvas edit rejected"),
                    }
                    let _ = respond.send(outcome);
                }
                CanvasRequest::Snapshot { respond } => {
                    let _ = respond.send(self.graph.clone());
                }
                CanvasRequest::Load { graph, respond } => {
                    let result = graph.check_integrity().map(|()| {
                        debug!(nodes = graph.node_count(), "Canvas loaded graph");
                        self.graph = graph;
                    });
                    let _ = respond.send(result);
                }
            }
        }
        debug!("Canvas closed");
    }
}

fn closed() -> FlowError {
    FlowError::Validation("canvas is closed".into())
}

impl CanvasHandle {
    /// Apply an edit and wait for its outcome.
    pub async fn edit(&self, command: EditCommand) -> Result<EditOutcome> {
        let (respond, rx) = oneshot::channel();
        self.tx
            .send(CanvasRequest::Edit { command, respond })
            .await
            .map_err(|_| closed())?;
        rx.await.map_err(|_| closed())?
    }

    pub async fn snapshot(&self) -> Result<Graph> {
        let (respond, rx) = oneshot::channel();
        self.tx
            .send(CanvasRequest::Snapshot { respond })
            .await
            .map_err(|_| closed())?;
        rx.await.map_err(|_| closed())
    }

    /// Replace the whole graph, e.g. when a saved workflow is opened.
    pub async fn load(&self, graph: Graph) -> Result<()> {
        let (respond, rx) = oneshot::channel();
        self.tx
            .send(CanvasRequest::Load { graph, respond })
            .await
            .map_err(|_| closed())?;
        rx.await.map_err(|_| closed())?
    }
}
