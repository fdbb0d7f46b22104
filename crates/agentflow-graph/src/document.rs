use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use agentflow_core::error::{FlowError, Result};
use agentflow_core::model::{Graph, NodeKind};
use agentflow_core::types::*;

use crate::storable::{self, StorableEdge, StorableNode};

/// JSON shape of a saved workflow on the REST surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDocument {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub nodes: Vec<StorableNode>,
    pub edges: Vec<StorableEdge>,
    pub node_count: usize,
    pub agent_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&SavedWorkflow> for WorkflowDocument {
    fn from(wf: &SavedWorkflow) -> Self {
        let stored = storable::serialize(&wf.graph);
        Self {
            id: wf.id.clone(),
            name: wf.name.clone(),
            description: wf.description.clone(),
            nodes: stored.nodes,
            edges: stored.edges,
            node_count: wf.node_count,
            agent_count: wf.agent_count,
            created_at: wf.created_at,
            updated_at: wf.updated_at,
        }
    }
}

impl WorkflowDocument {
    /// Rebuild the domain record. Counts are recomputed from the graph.
    pub fn into_saved(self) -> Result<SavedWorkflow> {
        let graph = storable::deserialize_parts(self.nodes, self.edges)?;
        Ok(SavedWorkflow {
            id: self.id,
            name: self.name,
            description: self.description,
            node_count: graph.node_count(),
            agent_count: graph.agent_count(),
            graph,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Body of `POST /workflows`. Any `nodeCount`/`agentCount` sent by the
/// client are accepted and discarded. Timestamps are only sent for imported
/// legacy records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkflowBody {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub nodes: Vec<StorableNode>,
    pub edges: Vec<StorableEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CreateWorkflowBody {
    pub fn from_new(workflow: &NewWorkflow) -> Self {
        let stored = storable::serialize(&workflow.graph);
        Self {
            name: workflow.name.clone(),
            description: workflow.description.clone(),
            nodes: stored.nodes,
            edges: stored.edges,
            created_at: workflow.created_at,
            updated_at: workflow.updated_at,
        }
    }

    pub fn into_new(self) -> Result<NewWorkflow> {
        let graph = storable::deserialize_parts(self.nodes, self.edges)?;
        Ok(NewWorkflow {
            name: self.name,
            description: self.description,
            graph,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Body of `PUT /workflows/{id}`. Nodes and edges travel together.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWorkflowBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<StorableNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edges: Option<Vec<StorableEdge>>,
}

impl UpdateWorkflowBody {
    pub fn from_patch(patch: &WorkflowPatch) -> Self {
        let (nodes, edges) = match &patch.graph {
            Some(graph) => {
                let stored = storable::serialize(graph);
                (Some(stored.nodes), Some(stored.edges))
            }
            None => (None, None),
        };
        Self {
            name: patch.name.clone(),
            description: patch.description.clone(),
            nodes,
            edges,
        }
    }

    pub fn into_patch(self) -> Result<WorkflowPatch> {
        let graph = match (self.nodes, self.edges) {
            (Some(nodes), Some(edges)) => Some(storable::deserialize_parts(nodes, edges)?),
            (None, None) => None,
            _ => {
                return Err(FlowError::Validation(
                    "nodes and edges must be updated together".into(),
                ))
            }
        };
        Ok(WorkflowPatch {
            name: self.name,
            description: self.description,
            graph,
        })
    }
}

/// A record exported from the old client-side store.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyWorkflow {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub nodes: Vec<StorableNode>,
    #[serde(default)]
    pub edges: Vec<StorableEdge>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl LegacyWorkflow {
    pub fn into_new(self) -> Result<NewWorkflow> {
        let graph = if self.nodes.is_empty() && self.edges.is_empty() {
            Graph::default()
        } else {
            storable::deserialize_parts(self.nodes, self.edges)?
        };
        Ok(NewWorkflow {
            name: self.name,
            description: self.description,
            graph,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn node_type_name(kind: &NodeKind) -> &'static str {
    match kind {
        NodeKind::Start => "startNode",
        NodeKind::End => "endNode",
        NodeKind::Agent(_) => "agentNode",
        NodeKind::Tool(_) => "toolNode",
    }
}

/// Re-tag a saved workflow for the execution backend. Start/End become
/// `START`/`END`, agent and tool nodes carry their reference id.
///
/// The local id is left out: the backend reads a present id as an update of
/// a record it already holds and rejects unknown ones, so each registration
/// creates a new record and the caller runs it under the id the backend
/// returns.
pub fn to_backend_workflow(wf: &SavedWorkflow) -> BackendWorkflow {
    let nodes = wf
        .graph
        .nodes
        .iter()
        .map(|node| {
            let (label, agent_id) = match &node.kind {
                NodeKind::Start => ("START".to_string(), "START".to_string()),
                NodeKind::End => ("END".to_string(), "END".to_string()),
                NodeKind::Agent(agent) => (agent.name.clone(), agent.id.clone()),
                NodeKind::Tool(tool) => (tool.name.clone(), tool.id.clone()),
            };
            BackendNode {
                id: node.id.clone(),
                node_type: node_type_name(&node.kind).to_string(),
                position: node.position,
                data: BackendNodeData { label, agent_id },
            }
        })
        .collect();
    let edges = wf
        .graph
        .edges
        .iter()
        .map(|e| BackendEdge {
            id: e.id.clone(),
            source: e.source.clone(),
            target: e.target.clone(),
        })
        .collect();
    BackendWorkflow {
        id: None,
        name: wf.name.clone(),
        description: wf.description.clone().unwrap_or_default(),
        nodes,
        edges,
    }
}
