//! Execution ordering for a workflow graph.
//!
//! Only linear pipelines are executable: Start, a chain of agent/tool
//! nodes, End. Parallel edges between the same pair collapse into one
//! hop; anything that fans out to two distinct targets is rejected.

use std::collections::HashSet;

use tracing::warn;

use agentflow_core::error::{FlowError, Result};
use agentflow_core::model::*;

/// What a plan step invokes on the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum StepTarget {
    Agent { id: String, name: String },
    Tool { id: String, name: String },
}

impl StepTarget {
    pub fn id(&self) -> &str {
        match self {
            StepTarget::Agent { id, .. } | StepTarget::Tool { id, .. } => id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            StepTarget::Agent { name, .. } | StepTarget::Tool { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanStep {
    pub node_id: String,
    pub target: StepTarget,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionPlan {
    /// Steps in execution order, excluding Start and End.
    pub steps: Vec<PlanStep>,
    /// Node ids not reachable from Start. They are never executed.
    pub unreachable: Vec<String>,
}

impl ExecutionPlan {
    /// Distinct agent ids referenced by the plan, in first-use order.
    pub fn agent_ids(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.steps
            .iter()
            .filter_map(|s| match &s.target {
                StepTarget::Agent { id, .. } => Some(id.as_str()),
                StepTarget::Tool { .. } => None,
            })
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

fn invalid(msg: impl Into<String>) -> FlowError {
    FlowError::Validation(msg.into())
}

/// Walk the graph from Start to End and produce the ordered step list.
pub fn build_plan(graph: &Graph) -> Result<ExecutionPlan> {
    graph.check_integrity()?;

    let start = graph
        .find_kind(NodeKindTag::Start)
        .ok_or_else(|| invalid("workflow has no START node"))?;
    let end = graph
        .find_kind(NodeKindTag::End)
        .ok_or_else(|| invalid("workflow has no END node"))?;

    if graph.incoming(&start.id).next().is_some() {
        return Err(invalid("START node must not have incoming edges"));
    }
    if graph.outgoing(&end.id).next().is_some() {
        return Err(invalid("END node must not have outgoing edges"));
    }

    let mut steps = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(start.id.as_str());
    let mut current = start;

    loop {
        let mut targets: Vec<&str> = Vec::new();
        for edge in graph.outgoing(&current.id) {
            if !targets.contains(&edge.target.as_str()) {
                targets.push(edge.target.as_str());
            }
        }

        let next_id = match targets.as_slice() {
            [] => {
                return Err(invalid(format!(
                    "END is not reachable: node '{}' has no outgoing edge",
                    current.id
                )))
            }
            [only] => *only,
            _ => {
                return Err(invalid(format!(
                    "branching is not supported: node '{}' has {} successors",
                    current.id,
                    targets.len()
                )))
            }
        };

        if !visited.insert(next_id) {
            return Err(invalid(format!("cycle detected at node '{}'", next_id)));
        }

        let next = graph
            .node(next_id)
            .ok_or_else(|| FlowError::not_found("node", next_id))?;

        match &next.kind {
            NodeKind::End => break,
            NodeKind::Start => return Err(invalid("START node must not have incoming edges")),
            NodeKind::Agent(agent) => steps.push(PlanStep {
                node_id: next.id.clone(),
                target: StepTarget::Agent {
                    id: agent.id.clone(),
                    name: agent.name.clone(),
                },
            }),
            NodeKind::Tool(tool) => steps.push(PlanStep {
                node_id: next.id.clone(),
                target: StepTarget::Tool {
                    id: tool.id.clone(),
                    name: tool.name.clone(),
                },
            }),
        }
        current = next;
    }

    visited.insert(end.id.as_str());
    let unreachable: Vec<String> = graph
        .nodes
        .iter()
        .filter(|n| !visited.contains(n.id.as_str()))
        .map(|n| n.id.clone())
        .collect();
    if !unreachable.is_empty() {
        warn!(nodes = ?unreachable, "Ignoring nodes unreachable from START");
    }

    Ok(ExecutionPlan { steps, unreachable })
}
