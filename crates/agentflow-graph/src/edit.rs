//! Pure graph editing operations.
//!
//! Every operation borrows the current graph and returns a new one. On error
//! the caller's graph is untouched, and every successful result passes
//! `Graph::check_integrity`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use agentflow_core::error::{FlowError, Result};
use agentflow_core::model::*;

/// Default rendered node footprint, used to centre dropped nodes.
pub const NODE_WIDTH: f64 = 180.0;
pub const NODE_HEIGHT: f64 = 80.0;

fn new_node_id(kind: &NodeKind) -> String {
    let prefix = match kind {
        NodeKind::Agent(_) => "agent",
        NodeKind::Tool(_) => "tool",
        NodeKind::Start => "start",
        NodeKind::End => "end",
    };
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}

fn new_edge_id() -> String {
    format!("edge-{}", uuid::Uuid::new_v4())
}

fn push_node(graph: &Graph, kind: NodeKind, position: Position) -> (Graph, String) {
    let mut next = graph.clone();
    let id = new_node_id(&kind);
    next.nodes.push(Node::new(id.clone(), kind, position));
    (next, id)
}

pub fn add_agent_node(graph: &Graph, agent: AgentRef, position: Position) -> (Graph, String) {
    push_node(graph, NodeKind::Agent(agent), position)
}

pub fn add_tool_node(graph: &Graph, tool: ToolRef, position: Position) -> (Graph, String) {
    push_node(graph, NodeKind::Tool(tool), position)
}

/// Replace `edge_id` (s -> t) with s -> n -> t, where n is a new node
/// centred on `drop_position`.
pub fn insert_node_on_edge(
    graph: &Graph,
    edge_id: &str,
    spec: NodeSpec,
    drop_position: Position,
) -> Result<(Graph, String)> {
    let edge = graph
        .edge(edge_id)
        .cloned()
        .ok_or_else(|| FlowError::EdgeNotFound(edge_id.to_string()))?;

    let kind = NodeKind::from(spec);
    let node_id = new_node_id(&kind);
    let position = Position::new(
        drop_position.x - NODE_WIDTH / 2.0,
        drop_position.y - NODE_HEIGHT / 2.0,
    );

    let mut next = graph.clone();
    next.edges.retain(|e| e.id != edge_id);
    next.nodes.push(Node::new(node_id.clone(), kind, position));
    next.edges
        .push(Edge::new(new_edge_id(), edge.source.clone(), node_id.clone()));
    next.edges
        .push(Edge::new(new_edge_id(), node_id.clone(), edge.target.clone()));

    debug!(edge_id, node_id = %node_id, "Inserted node on edge");
    Ok((next, node_id))
}

/// Add a directed edge. Parallel edges between the same pair are allowed.
pub fn connect_nodes(graph: &Graph, source: &str, target: &str) -> Result<(Graph, String)> {
    for id in [source, target] {
        if !graph.contains_node(id) {
            return Err(FlowError::not_found("node", id));
        }
    }
    let mut next = graph.clone();
    let edge_id = new_edge_id();
    next.edges.push(Edge::new(edge_id.clone(), source, target));
    Ok((next, edge_id))
}

/// Remove a node and every edge touching it. Start and End are permanent.
pub fn remove_node(graph: &Graph, node_id: &str) -> Result<Graph> {
    let node = graph
        .node(node_id)
        .ok_or_else(|| FlowError::not_found("node", node_id))?;
    if node_id == START_NODE_ID || node_id == END_NODE_ID || node.kind.is_terminal() {
        return Err(FlowError::Validation(format!(
            "node '{}' is reserved and cannot be removed",
            node_id
        )));
    }

    let mut next = graph.clone();
    next.nodes.retain(|n| n.id != node_id);
    next.edges
        .retain(|e| e.source != node_id && e.target != node_id);
    Ok(next)
}

pub fn remove_edge(graph: &Graph, edge_id: &str) -> Result<Graph> {
    if graph.edge(edge_id).is_none() {
        return Err(FlowError::not_found("edge", edge_id));
    }
    let mut next = graph.clone();
    next.edges.retain(|e| e.id != edge_id);
    Ok(next)
}

pub fn move_node(graph: &Graph, node_id: &str, position: Position) -> Result<Graph> {
    let mut next = graph.clone();
    let node = next
        .nodes
        .iter_mut()
        .find(|n| n.id == node_id)
        .ok_or_else(|| FlowError::not_found("node", node_id))?;
    node.position = position;
    Ok(next)
}

/// A single editing action, as sent over the REST surface or canvas channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum EditCommand {
    AddAgentNode {
        agent: AgentRef,
        #[serde(default)]
        position: Position,
    },
    AddToolNode {
        tool: ToolRef,
        #[serde(default)]
        position: Position,
    },
    InsertNodeOnEdge {
        edge_id: String,
        node: NodeSpec,
        position: Position,
    },
    ConnectNodes {
        source: String,
        target: String,
    },
    RemoveNode {
        node_id: String,
    },
    RemoveEdge {
        edge_id: String,
    },
    MoveNode {
        node_id: String,
        position: Position,
    },
}

/// Result of applying an `EditCommand`.
#[derive(Debug, Clone, PartialEq)]
pub struct EditOutcome {
    pub graph: Graph,
    /// Id of the node or edge the command created, if any.
    pub created: Option<String>,
}

impl EditCommand {
    pub fn apply(&self, graph: &Graph) -> Result<EditOutcome> {
        let (graph, created) = match self.clone() {
            EditCommand::AddAgentNode { agent, position } => {
                let (g, id) = add_agent_node(graph, agent, position);
                (g, Some(id))
            }
            EditCommand::AddToolNode { tool, position } => {
                let (g, id) = add_tool_node(graph, tool, position);
                (g, Some(id))
            }
            EditCommand::InsertNodeOnEdge {
                edge_id,
                node,
                position,
            } => {
                let (g, id) = insert_node_on_edge(graph, &edge_id, node, position)?;
                (g, Some(id))
            }
            EditCommand::ConnectNodes { source, target } => {
                let (g, id) = connect_nodes(graph, &source, &target)?;
                (g, Some(id))
            }
            EditCommand::RemoveNode { node_id } => (remove_node(graph, &node_id)?, None),
            EditCommand::RemoveEdge { edge_id } => (remove_edge(graph, &edge_id)?, None),
            EditCommand::MoveNode { node_id, position } => {
                (move_node(graph, &node_id, position)?, None)
            }
        };
        Ok(EditOutcome { graph, created })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writer() -> AgentRef {
        AgentRef::new("a-writer", "Writer")
    }

    fn seeded_edge_id(graph: &Graph) -> String {
        graph.edges[0].id.clone()
    }

    #[test]
    fn test_add_agent_node_keeps_edges() {
        let graph = Graph::new();
        let (next, id) = add_agent_node(&graph, writer(), Position::new(10.0, 20.0));
        assert_eq!(next.node_count(), graph.node_count() + 1);
        assert_eq!(next.edges, graph.edges);
        assert!(id.starts_with("agent-"));
        assert_eq!(next.node(&id).unwrap().agent_ref().unwrap().name, "Writer");
    }

    #[test]
    fn test_add_tool_node() {
        let tool = ToolRef::new("web-search", "Web Search", ToolKind::WebSearch);
        let (next, id) = add_tool_node(&Graph::new(), tool, Position::default());
        assert!(id.starts_with("tool-"));
        assert_eq!(next.agent_count(), 0);
        assert_eq!(next.node_count(), 3);
    }

    #[test]
    fn test_insert_node_on_edge_splits() {
        let graph = Graph::new();
        let edge_id = seeded_edge_id(&graph);
        let (next, id) = insert_node_on_edge(
            &graph,
            &edge_id,
            NodeSpec::Agent { agent: writer() },
            Position::new(300.0, 200.0),
        )
        .unwrap();

        assert_eq!(next.node_count(), 3);
        assert_eq!(next.edges.len(), 2);
        assert!(next.edge(&edge_id).is_none());
        assert!(next
            .edges
            .iter()
            .any(|e| e.source == START_NODE_ID && e.target == id));
        assert!(next
            .edges
            .iter()
            .any(|e| e.source == id && e.target == END_NODE_ID));
        let node = next.node(&id).unwrap();
        assert_eq!(node.position, Position::new(210.0, 160.0));
        assert!(next.check_integrity().is_ok());
    }

    #[test]
    fn test_insert_on_missing_edge() {
        let graph = Graph::new();
        let err = insert_node_on_edge(
            &graph,
            "nope",
            NodeSpec::Agent { agent: writer() },
            Position::default(),
        )
        .unwrap_err();
        assert!(matches!(err, FlowError::EdgeNotFound(ref id) if id == "nope"));
    }

    #[test]
    fn test_connect_allows_parallel_edges() {
        let graph = Graph::new();
        let (g1, e1) = connect_nodes(&graph, START_NODE_ID, END_NODE_ID).unwrap();
        let (g2, e2) = connect_nodes(&g1, START_NODE_ID, END_NODE_ID).unwrap();
        assert_ne!(e1, e2);
        assert_eq!(g2.edges.len(), 3);
    }

    #[test]
    fn test_connect_missing_node() {
        let err = connect_nodes(&Graph::new(), START_NODE_ID, "ghost").unwrap_err();
        assert!(matches!(err, FlowError::NotFound { ref kind, ref id } if kind == "node" && id == "ghost"));
    }

    #[test]
    fn test_remove_node_drops_incident_edges() {
        let graph = Graph::new();
        let edge_id = seeded_edge_id(&graph);
        let (with_agent, id) = insert_node_on_edge(
            &graph,
            &edge_id,
            NodeSpec::Agent { agent: writer() },
            Position::default(),
        )
        .unwrap();
        let next = remove_node(&with_agent, &id).unwrap();
        assert_eq!(next.node_count(), 2);
        assert!(next.edges.is_empty());
        assert!(next.dangling_edges().is_empty());
    }

    #[test]
    fn test_reserved_nodes_cannot_be_removed() {
        let graph = Graph::new();
        for id in [START_NODE_ID, END_NODE_ID] {
            assert!(matches!(
                remove_node(&graph, id),
                Err(FlowError::Validation(_))
            ));
        }
        assert!(remove_node(&graph, "ghost").unwrap_err().is_not_found());
    }

    #[test]
    fn test_remove_edge() {
        let graph = Graph::new();
        let edge_id = seeded_edge_id(&graph);
        let next = remove_edge(&graph, &edge_id).unwrap();
        assert!(next.edges.is_empty());
        let err = remove_edge(&next, &edge_id).unwrap_err();
        assert!(matches!(err, FlowError::NotFound { ref kind, .. } if kind == "edge"));
    }

    #[test]
    fn test_move_node() {
        let next = move_node(&Graph::new(), END_NODE_ID, Position::new(1.0, 2.0)).unwrap();
        assert_eq!(next.node(END_NODE_ID).unwrap().position, Position::new(1.0, 2.0));
    }

    #[test]
    fn test_command_from_json() {
        let graph = Graph::new();
        let cmd: EditCommand = serde_json::from_value(serde_json::json!({
            "action": "insert_node_on_edge",
            "edge_id": seeded_edge_id(&graph),
            "node": { "type": "agent", "agent": { "id": "a1", "name": "Researcher" } },
            "position": { "x": 100.0, "y": 100.0 }
        }))
        .unwrap();
        let outcome = cmd.apply(&graph).unwrap();
        assert_eq!(outcome.graph.agent_count(), 1);
        assert!(outcome.created.unwrap().starts_with("agent-"));
    }

    #[test]
    fn test_failed_command_leaves_input() {
        let graph = Graph::new();
        let before = graph.clone();
        let cmd = EditCommand::RemoveNode {
            node_id: START_NODE_ID.into(),
        };
        assert!(cmd.apply(&graph).is_err());
        assert_eq!(graph, before);
    }
}
