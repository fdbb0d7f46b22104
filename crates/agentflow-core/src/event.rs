use serde::Serialize;

use crate::types::RunState;

/// Progress notifications emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    StateChanged {
        workflow_id: String,
        state: RunState,
    },
    StepStarted {
        workflow_id: String,
        index: usize,
        node_id: String,
        agent_name: String,
    },
    StepCompleted {
        workflow_id: String,
        index: usize,
        node_id: String,
        elapsed_ms: u64,
    },
    AgentSyncFailed {
        agent_id: String,
        message: String,
    },
}

/// Event bus using tokio broadcast channel.
/// All subscribers receive all events.
pub struct EventBus {
    tx: tokio::sync::broadcast::Sender<RunEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: RunEvent) {
        // No receivers is fine
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RunEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
