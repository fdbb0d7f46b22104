use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};
use crate::model::{Graph, Position};

pub const NAME_MIN_CHARS: usize = 3;
pub const NAME_MAX_CHARS: usize = 50;
pub const DESCRIPTION_MAX_CHARS: usize = 200;

// ---------------------------------------------------------------------------
// Saved workflow records
// ---------------------------------------------------------------------------

/// A persisted workflow. Counts are always derived from `graph` on write.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedWorkflow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub graph: Graph,
    pub node_count: usize,
    pub agent_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for `WorkflowStore::create`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWorkflow {
    pub name: String,
    pub description: Option<String>,
    pub graph: Graph,
    /// Only set when importing legacy records.
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl NewWorkflow {
    pub fn new(name: impl Into<String>, graph: Graph) -> Self {
        Self {
            name: name.into(),
            description: None,
            graph,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Validate and normalize name and description, check graph integrity.
    pub fn validated(mut self) -> Result<Self> {
        self.name = validate_name(&self.name)?;
        self.description = normalize_description(self.description.as_deref())?;
        self.graph.check_integrity()?;
        Ok(self)
    }
}

/// Partial update. Absent fields are left unchanged.
/// `description: Some("")` clears the description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub graph: Option<Graph>,
}

impl WorkflowPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.graph.is_none()
    }

    /// Merge this patch into `current`, validating every supplied field.
    pub fn apply_to(self, current: &SavedWorkflow, now: DateTime<Utc>) -> Result<SavedWorkflow> {
        let mut next = current.clone();
        if let Some(name) = self.name {
            next.name = validate_name(&name)?;
        }
        if let Some(description) = self.description {
            next.description = normalize_description(Some(&description))?;
        }
        if let Some(graph) = self.graph {
            graph.check_integrity()?;
            next.graph = graph;
        }
        next.node_count = next.graph.node_count();
        next.agent_count = next.graph.agent_count();
        next.updated_at = now;
        Ok(next)
    }
}

/// Trimmed name, or `Validation` when out of bounds.
pub fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(FlowError::Validation("name is required".into()));
    }
    let len = trimmed.chars().count();
    if len < NAME_MIN_CHARS {
        return Err(FlowError::Validation(format!(
            "name must be at least {} characters",
            NAME_MIN_CHARS
        )));
    }
    if len > NAME_MAX_CHARS {
        return Err(FlowError::Validation(format!(
            "name must be at most {} characters",
            NAME_MAX_CHARS
        )));
    }
    Ok(trimmed.to_string())
}

/// Empty or whitespace-only descriptions become `None`.
pub fn normalize_description(description: Option<&str>) -> Result<Option<String>> {
    let Some(description) = description else {
        return Ok(None);
    };
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(FlowError::Validation(format!(
            "description must be at most {} characters",
            DESCRIPTION_MAX_CHARS
        )));
    }
    Ok(Some(trimmed.to_string()))
}

// ---------------------------------------------------------------------------
// Execution backend wire types
// ---------------------------------------------------------------------------

/// Local agent definition pushed to the backend during agent sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub prompt: String,
}

/// An agent as reported by `GET /agents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendAgent {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendNodeData {
    pub label: String,
    #[serde(rename = "agentId")]
    pub agent_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub position: Position,
    pub data: BackendNodeData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendEdge {
    pub id: String,
    pub source: String,
    pub target: String,
}

/// Workflow shape accepted by the backend's `POST /workflows`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendWorkflow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub nodes: Vec<BackendNode>,
    pub edges: Vec<BackendEdge>,
}

// ---------------------------------------------------------------------------
// Execution results
// ---------------------------------------------------------------------------

/// One entry of the ordered result trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub node_id: String,
    pub agent_name: String,
    /// The text this step received.
    #[serde(default)]
    pub processed_text: String,
    pub output: String,
    #[serde(default)]
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionResult {
    pub workflow_id: String,
    pub results: Vec<StepResult>,
    /// Wall-clock seconds.
    pub execution_time: f64,
    pub status: RunStatus,
}

impl WorkflowExecutionResult {
    /// Output of the last step, or `None` for an empty trace.
    pub fn final_output(&self) -> Option<&str> {
        self.results.last().map(|r| r.output.as_str())
    }
}

/// Lifecycle of a single execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Preparing,
    Running,
    Completed,
    Failed,
}

impl RunState {
    pub fn is_active(&self) -> bool {
        matches!(self, RunState::Preparing | RunState::Running)
    }
}
