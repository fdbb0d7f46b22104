//! Persisted node/edge form.
//!
//! This is the JSON layout stored in the database and exchanged with older
//! clients. Only identity, type, position and agent/tool references are
//! stored; rendered labels never are, and unknown keys from older records
//! (`label`, `style`, `draggable`, ...) are ignored on read.

use serde::{Deserialize, Serialize};

use agentflow_core::error::{FlowError, Result};
use agentflow_core::model::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorableNodeType {
    #[serde(rename = "startNode", alias = "input")]
    Start,
    #[serde(rename = "endNode", alias = "output")]
    End,
    #[serde(rename = "agentNode", alias = "default")]
    Agent,
    #[serde(rename = "toolNode")]
    Tool,
}

/// Agent reference in the legacy field layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAgentInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "tool_selection_checkboxes_webSearch", default)]
    pub web_search: bool,
    #[serde(rename = "tool_selection_checkboxes_codeExecution", default)]
    pub code_execution: bool,
    #[serde(rename = "tool_selection_checkboxes_fileAnalysis", default)]
    pub file_analysis: bool,
}

impl From<&AgentRef> for StoredAgentInfo {
    fn from(agent: &AgentRef) -> Self {
        Self {
            id: agent.id.clone(),
            name: agent.name.clone(),
            description: agent.description.clone(),
            web_search: agent.web_search_enabled,
            code_execution: agent.code_execution_enabled,
            file_analysis: agent.file_analysis_enabled,
        }
    }
}

impl From<StoredAgentInfo> for AgentRef {
    fn from(info: StoredAgentInfo) -> Self {
        AgentRef {
            id: info.id,
            name: info.name,
            description: info.description,
            web_search_enabled: info.web_search,
            code_execution_enabled: info.code_execution,
            file_analysis_enabled: info.file_analysis,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorableNodeData {
    #[serde(rename = "agentInfo", default, skip_serializing_if = "Option::is_none")]
    pub agent_info: Option<StoredAgentInfo>,
    #[serde(rename = "toolInfo", default, skip_serializing_if = "Option::is_none")]
    pub tool_info: Option<ToolRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorableNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: StorableNodeType,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub data: StorableNodeData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorableEdge {
    pub id: String,
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorableGraph {
    pub nodes: Vec<StorableNode>,
    pub edges: Vec<StorableEdge>,
    #[serde(default)]
    pub node_count: usize,
    #[serde(default)]
    pub agent_count: usize,
}

pub fn serialize_node(node: &Node) -> StorableNode {
    let (node_type, data) = match &node.kind {
        NodeKind::Start => (StorableNodeType::Start, StorableNodeData::default()),
        NodeKind::End => (StorableNodeType::End, StorableNodeData::default()),
        NodeKind::Agent(agent) => (
            StorableNodeType::Agent,
            StorableNodeData {
                agent_info: Some(agent.into()),
                tool_info: None,
            },
        ),
        NodeKind::Tool(tool) => (
            StorableNodeType::Tool,
            StorableNodeData {
                agent_info: None,
                tool_info: Some(tool.clone()),
            },
        ),
    };
    StorableNode {
        id: node.id.clone(),
        node_type,
        position: node.position,
        data,
    }
}

pub fn deserialize_node(node: StorableNode) -> Result<Node> {
    let kind = match node.node_type {
        StorableNodeType::Start => NodeKind::Start,
        StorableNodeType::End => NodeKind::End,
        StorableNodeType::Agent => {
            let info = node.data.agent_info.ok_or_else(|| {
                FlowError::Validation(format!("agent node '{}' has no agentInfo", node.id))
            })?;
            NodeKind::Agent(info.into())
        }
        StorableNodeType::Tool => {
            let info = node.data.tool_info.ok_or_else(|| {
                FlowError::Validation(format!("tool node '{}' has no toolInfo", node.id))
            })?;
            NodeKind::Tool(info)
        }
    };
    Ok(Node::new(node.id, kind, node.position))
}

pub fn serialize_edges(edges: &[Edge]) -> Vec<StorableEdge> {
    edges
        .iter()
        .map(|e| StorableEdge {
            id: e.id.clone(),
            source: e.source.clone(),
            target: e.target.clone(),
        })
        .collect()
}

/// Convert a graph to its storable form. Total and idempotent.
pub fn serialize(graph: &Graph) -> StorableGraph {
    StorableGraph {
        nodes: graph.nodes.iter().map(serialize_node).collect(),
        edges: serialize_edges(&graph.edges),
        node_count: graph.node_count(),
        agent_count: graph.agent_count(),
    }
}

/// Rebuild a graph from parts, validating references and integrity.
pub fn deserialize_parts(nodes: Vec<StorableNode>, edges: Vec<StorableEdge>) -> Result<Graph> {
    let nodes = nodes
        .into_iter()
        .map(deserialize_node)
        .collect::<Result<Vec<_>>>()?;
    let edges = edges
        .into_iter()
        .map(|e| Edge::new(e.id, e.source, e.target))
        .collect();
    let graph = Graph::from_parts(nodes, edges);
    graph.check_integrity()?;
    Ok(graph)
}

/// Rebuild a graph. Stored counts are ignored.
pub fn deserialize(stored: StorableGraph) -> Result<Graph> {
    deserialize_parts(stored.nodes, stored.edges)
}
