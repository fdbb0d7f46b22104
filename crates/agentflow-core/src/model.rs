//! Workflow graph data model.
//!
//! A workflow is a directed graph of `Node`s (Start, End, Agent, Tool)
//! connected by payload-free `Edge`s that only encode execution order.
//! Everything else in the workspace (editing, storage, execution) operates
//! on these types.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};

/// Id of the Start node seeded into every new graph.
pub const START_NODE_ID: &str = "start";
/// Id of the End node seeded into every new graph.
pub const END_NODE_ID: &str = "end";

/// Canvas coordinate. Presentation-only, but persisted for session continuity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Snapshot of an agent's identity and capability flags at placement time.
///
/// This is a value copy: editing the agent definition later does not
/// update nodes already on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub web_search_enabled: bool,
    #[serde(default)]
    pub code_execution_enabled: bool,
    #[serde(default)]
    pub file_analysis_enabled: bool,
}

impl AgentRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            web_search_enabled: false,
            code_execution_enabled: false,
            file_analysis_enabled: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tools(mut self, web_search: bool, code_execution: bool, file_analysis: bool) -> Self {
        self.web_search_enabled = web_search;
        self.code_execution_enabled = code_execution;
        self.file_analysis_enabled = file_analysis;
        self
    }
}

/// Capability marker a Tool node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolKind {
    WebSearch,
    CodeExecution,
    FileAnalysis,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::WebSearch => "web-search",
            ToolKind::CodeExecution => "code-execution",
            ToolKind::FileAnalysis => "file-analysis",
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: ToolKind,
}

impl ToolRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: ToolKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            kind,
        }
    }
}

/// Closed set of node variants. Agent and Tool nodes carry their reference,
/// so an Agent node without an `AgentRef` cannot be constructed.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Start,
    End,
    Agent(AgentRef),
    Tool(ToolRef),
}

/// Payload-free tag for `NodeKind`, used for counting and matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKindTag {
    Start,
    End,
    Agent,
    Tool,
}

impl NodeKind {
    pub fn tag(&self) -> NodeKindTag {
        match self {
            NodeKind::Start => NodeKindTag::Start,
            NodeKind::End => NodeKindTag::End,
            NodeKind::Agent(_) => NodeKindTag::Agent,
            NodeKind::Tool(_) => NodeKindTag::Tool,
        }
    }

    /// Display name used in result traces.
    pub fn display_name(&self) -> &str {
        match self {
            NodeKind::Start => "START",
            NodeKind::End => "END",
            NodeKind::Agent(agent) => &agent.name,
            NodeKind::Tool(tool) => &tool.name,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeKind::Start | NodeKind::End)
    }
}

/// Payload for nodes created by editing operations. Start and End are
/// seeded by `Graph::new` and cannot be inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeSpec {
    Agent { agent: AgentRef },
    Tool { tool: ToolRef },
}

impl From<NodeSpec> for NodeKind {
    fn from(spec: NodeSpec) -> Self {
        match spec {
            NodeSpec::Agent { agent } => NodeKind::Agent(agent),
            NodeSpec::Tool { tool } => NodeKind::Tool(tool),
        }
    }
}

/// A vertex in the workflow graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub position: Position,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind, position: Position) -> Self {
        Self {
            id: id.into(),
            kind,
            position,
        }
    }

    pub fn start() -> Self {
        Self::new(START_NODE_ID, NodeKind::Start, Position::new(100.0, 50.0))
    }

    pub fn end() -> Self {
        Self::new(END_NODE_ID, NodeKind::End, Position::new(600.0, 300.0))
    }

    pub fn agent_ref(&self) -> Option<&AgentRef> {
        match &self.kind {
            NodeKind::Agent(agent) => Some(agent),
            _ => None,
        }
    }

    pub fn tool_ref(&self) -> Option<&ToolRef> {
        match &self.kind {
            NodeKind::Tool(tool) => Some(tool),
            _ => None,
        }
    }
}

/// A directed connection between two node ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
}

impl Edge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
        }
    }
}

/// True when either endpoint of `edge` is missing from `nodes`.
pub fn is_dangling(edge: &Edge, nodes: &[Node]) -> bool {
    let has = |id: &str| nodes.iter().any(|n| n.id == id);
    !has(&edge.source) || !has(&edge.target)
}

pub fn count_by_kind(nodes: &[Node], kind: NodeKindTag) -> usize {
    nodes.iter().filter(|n| n.kind.tag() == kind).count()
}

/// The workflow graph aggregate.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    /// A fresh builder graph: Start and End joined by a single edge.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::start(), Node::end()],
            edges: vec![Edge::new(
                format!("edge-{}-{}", START_NODE_ID, END_NODE_ID),
                START_NODE_ID,
                END_NODE_ID,
            )],
        }
    }

    pub fn from_parts(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn agent_count(&self) -> usize {
        count_by_kind(&self.nodes, NodeKindTag::Agent)
    }

    /// Outgoing edges of `node_id` in edge-array order.
    pub fn outgoing<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    pub fn incoming<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == node_id)
    }

    pub fn find_kind(&self, kind: NodeKindTag) -> Option<&Node> {
        self.nodes.iter().find(|n| n.kind.tag() == kind)
    }

    /// Ids of edges whose source or target is not in the graph.
    pub fn dangling_edges(&self) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| is_dangling(e, &self.nodes))
            .map(|e| e.id.as_str())
            .collect()
    }

    /// Structural validity: unique ids, at most one Start/End, no dangling edges.
    pub fn check_integrity(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(FlowError::Validation(format!(
                    "duplicate node id '{}'",
                    node.id
                )));
            }
        }

        let mut seen = HashSet::new();
        for edge in &self.edges {
            if !seen.insert(edge.id.as_str()) {
                return Err(FlowError::Validation(format!(
                    "duplicate edge id '{}'",
                    edge.id
                )));
            }
        }

        for tag in [NodeKindTag::Start, NodeKindTag::End] {
            let count = count_by_kind(&self.nodes, tag);
            if count > 1 {
                return Err(FlowError::Validation(format!(
                    "graph has {} {:?} nodes, at most one is allowed",
                    count, tag
                )));
            }
        }

        let dangling = self.dangling_edges();
        if !dangling.is_empty() {
            return Err(FlowError::Validation(format!(
                "dangling edges: {}",
                dangling.join(", ")
            )));
        }

        Ok(())
    }
}
