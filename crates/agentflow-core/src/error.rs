use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    // Graph and record validation
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    #[error("Edge not found: {0}")]
    EdgeNotFound(String),

    // Persistence errors
    #[error("Failed to persist workflow before execution: {0}")]
    PersistFailed(String),

    #[error("Database error: {0}")]
    Database(String),

    // Execution errors
    #[error("Agent sync failed for {agent_id}: {message}")]
    AgentSyncFailed { agent_id: String, message: String },

    #[error("Step {index} failed at node {node_id} ({agent_name}): {message}")]
    StepExecutionFailed {
        index: usize,
        node_id: String,
        agent_name: String,
        message: String,
    },

    #[error("{scope} timed out after {secs}s")]
    Timeout { scope: String, secs: u64 },

    #[error("Run cancelled")]
    Cancelled,

    #[error("A run is already in progress for workflow {0}")]
    RunInProgress(String),

    // Backend errors
    #[error("Backend request failed: {0}")]
    Backend(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FlowError {
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// True for the variants that mean "the referenced thing does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::EdgeNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
