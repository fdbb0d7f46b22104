//! Test doubles and graph fixtures shared across agentflow crates.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;

use agentflow_core::error::{FlowError, Result};
use agentflow_core::model::*;
use agentflow_core::traits::{AgentBackend, AgentCatalog};
use agentflow_core::types::*;
use agentflow_store::SqliteStore;

/// Deterministic in-process `AgentBackend`.
///
/// `invoke` returns the input uppercased with `[target]` appended, so a chain
/// of steps leaves a readable trace. Failures and delays are injected per
/// target id and apply to both `invoke` and `execute_workflow`.
///
/// Workflow registration follows the execution backend: a body without an id
/// creates a record under a fresh `remote-<n>` id, and a body with an id
/// updates that record or fails with 404 when it does not exist.
#[derive(Default)]
pub struct EchoBackend {
    agents: Mutex<Vec<BackendAgent>>,
    created: Mutex<Vec<AgentDefinition>>,
    invocations: Mutex<Vec<(String, String)>>,
    fail_on: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    list_fails: Mutex<bool>,
    registered: Mutex<Vec<(String, BackendWorkflow)>>,
    call_count: AtomicU32,
}

impl EchoBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agents the backend already knows about.
    pub fn with_agents(self, ids: &[&str]) -> Self {
        if let Ok(mut agents) = self.agents.lock() {
            agents.extend(ids.iter().map(|id| BackendAgent {
                id: id.to_string(),
                name: id.to_string(),
                description: String::new(),
            }));
        }
        self
    }

    pub fn fail_on(self, target_id: &str) -> Self {
        if let Ok(mut set) = self.fail_on.lock() {
            set.insert(target_id.to_string());
        }
        self
    }

    pub fn delay(self, target_id: &str, delay: Duration) -> Self {
        if let Ok(mut map) = self.delays.lock() {
            map.insert(target_id.to_string(), delay);
        }
        self
    }

    pub fn fail_listing(self) -> Self {
        if let Ok(mut flag) = self.list_fails.lock() {
            *flag = true;
        }
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// `(target_id, input)` pairs in call order.
    pub fn invocations(&self) -> Vec<(String, String)> {
        self.invocations.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn created_agents(&self) -> Vec<AgentDefinition> {
        self.created.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Registration bodies as received, in call order.
    pub fn registered_workflows(&self) -> Vec<BackendWorkflow> {
        self.registered
            .lock()
            .map(|v| v.iter().map(|(_, w)| w.clone()).collect())
            .unwrap_or_default()
    }

    /// Ids the backend assigned, in registration order.
    pub fn registered_ids(&self) -> Vec<String> {
        self.registered
            .lock()
            .map(|v| v.iter().map(|(id, _)| id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    fn echo(target_id: &str, input: &str) -> String {
        format!("{} [{}]", input.to_uppercase(), target_id)
    }

    fn should_fail(&self, target_id: &str) -> bool {
        self.fail_on
            .lock()
            .map(|set| set.contains(target_id))
            .unwrap_or(false)
    }

    fn delay_for(&self, target_id: &str) -> Option<Duration> {
        self.delays
            .lock()
            .ok()
            .and_then(|map| map.get(target_id).copied())
    }
}

impl AgentBackend for EchoBackend {
    fn list_agents(&self) -> BoxFuture<'_, Result<Vec<BackendAgent>>> {
        Box::pin(async move {
            if self.list_fails.lock().map(|f| *f).unwrap_or(false) {
                return Err(FlowError::Backend("HTTP 503 Service Unavailable: listing".into()));
            }
            Ok(self.agents.lock().map(|v| v.clone()).unwrap_or_default())
        })
    }

    fn create_agent(&self, agent: AgentDefinition) -> BoxFuture<'_, Result<BackendAgent>> {
        Box::pin(async move {
            let id = agent.id.clone().unwrap_or_else(|| agent.name.clone());
            if self.should_fail(&id) {
                return Err(FlowError::Backend(format!("HTTP 500: cannot create {}", id)));
            }
            let created = BackendAgent {
                id,
                name: agent.name.clone(),
                description: agent.description.clone(),
            };
            if let Ok(mut agents) = self.agents.lock() {
                agents.push(created.clone());
            }
            if let Ok(mut log) = self.created.lock() {
                log.push(agent);
            }
            Ok(created)
        })
    }

    fn invoke(&self, target_id: &str, input: &str) -> BoxFuture<'_, Result<String>> {
        let target_id = target_id.to_string();
        let input = input.to_string();
        Box::pin(async move {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut log) = self.invocations.lock() {
                log.push((target_id.clone(), input.clone()));
            }
            if let Some(delay) = self.delay_for(&target_id) {
                tokio::time::sleep(delay).await;
            }
            if self.should_fail(&target_id) {
                return Err(FlowError::Backend(format!(
                    "HTTP 500 Internal Server Error: agent {} failed",
                    target_id
                )));
            }
            Ok(Self::echo(&target_id, &input))
        })
    }

    fn register_workflow(&self, workflow: BackendWorkflow) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let mut registered = self
                .registered
                .lock()
                .map_err(|_| FlowError::Internal("registry lock poisoned".into()))?;
            let id = match workflow.id.clone() {
                Some(id) if registered.iter().any(|(known, _)| *known == id) => id,
                Some(_) => {
                    return Err(FlowError::Backend(
                        "HTTP 404 Not Found: workflow not found".into(),
                    ))
                }
                None => format!("remote-{}", registered.len() + 1),
            };
            registered.push((id.clone(), workflow));
            Ok(id)
        })
    }

    /// Walks the registered workflow in edge order, echoing through
    /// every non-terminal node. Terminal entries are included, as a real
    /// backend would report them.
    fn execute_workflow(
        &self,
        workflow_id: &str,
        input: &str,
    ) -> BoxFuture<'_, Result<WorkflowExecutionResult>> {
        let workflow_id = workflow_id.to_string();
        let input = input.to_string();
        Box::pin(async move {
            let workflow = self
                .registered
                .lock()
                .ok()
                .and_then(|v| {
                    v.iter()
                        .rev()
                        .find(|(id, _)| *id == workflow_id)
                        .map(|(_, w)| w.clone())
                })
                .ok_or_else(|| FlowError::Backend("HTTP 404 Not Found: workflow not found".into()))?;

            let mut results = Vec::new();
            let mut text = input;
            let mut current = workflow
                .nodes
                .iter()
                .find(|n| n.data.agent_id == "START")
                .cloned();
            let mut status = RunStatus::Success;
            while let Some(node) = current {
                let agent_id = node.data.agent_id.clone();
                if let Some(delay) = self.delay_for(&agent_id) {
                    tokio::time::sleep(delay).await;
                }
                let output = if agent_id == "START" || agent_id == "END" {
                    text.clone()
                } else if self.should_fail(&agent_id) {
                    status = RunStatus::Failed;
                    results.push(StepResult {
                        node_id: node.id.clone(),
                        agent_name: node.data.label.clone(),
                        processed_text: text.clone(),
                        output: format!("agent {} failed", agent_id),
                        elapsed_ms: 0,
                    });
                    break;
                } else {
                    Self::echo(&agent_id, &text)
                };
                results.push(StepResult {
                    node_id: node.id.clone(),
                    agent_name: node.data.label.clone(),
                    processed_text: text.clone(),
                    output: output.clone(),
                    elapsed_ms: 0,
                });
                text = output;
                current = workflow
                    .edges
                    .iter()
                    .find(|e| e.source == node.id)
                    .and_then(|e| workflow.nodes.iter().find(|n| n.id == e.target))
                    .cloned();
            }

            Ok(WorkflowExecutionResult {
                workflow_id,
                results,
                execution_time: 0.01,
                status,
            })
        })
    }
}

/// `AgentCatalog` over a fixed list of definitions.
#[derive(Default)]
pub struct FixedCatalog {
    definitions: Vec<AgentDefinition>,
}

impl FixedCatalog {
    pub fn new(definitions: Vec<AgentDefinition>) -> Self {
        Self { definitions }
    }

    pub fn for_ids(ids: &[&str]) -> Self {
        Self::new(ids.iter().map(|id| agent_definition(id)).collect())
    }
}

impl AgentCatalog for FixedCatalog {
    fn definition(&self, agent_id: &str) -> Option<AgentDefinition> {
        self.definitions
            .iter()
            .find(|d| d.id.as_deref() == Some(agent_id))
            .cloned()
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn agent_ref(id: &str) -> AgentRef {
    AgentRef::new(id, format!("Agent {}", id)).with_description(format!("Test agent {}", id))
}

pub fn agent_definition(id: &str) -> AgentDefinition {
    AgentDefinition {
        id: Some(id.to_string()),
        name: format!("Agent {}", id),
        description: format!("Test agent {}", id),
        prompt: format!("You are agent {}.", id),
    }
}

/// Start -> agent(ids[0]) -> ... -> End, node ids `node-<agent id>`.
pub fn linear_graph(agent_ids: &[&str]) -> Graph {
    let mut graph = Graph::new();
    graph.edges.clear();
    let mut prev = START_NODE_ID.to_string();
    for (i, id) in agent_ids.iter().enumerate() {
        let node_id = format!("node-{}", id);
        graph.nodes.push(Node::new(
            node_id.clone(),
            NodeKind::Agent(agent_ref(id)),
            Position::new(200.0 + 150.0 * i as f64, 150.0),
        ));
        graph
            .edges
            .push(Edge::new(format!("edge-{}", i), prev, node_id.clone()));
        prev = node_id;
    }
    graph
        .edges
        .push(Edge::new("edge-end", prev, END_NODE_ID));
    graph
}

/// Start fanning out to two agents that both reach End.
pub fn branching_graph() -> Graph {
    let mut graph = linear_graph(&["a"]);
    graph.nodes.push(Node::new(
        "node-b",
        NodeKind::Agent(agent_ref("b")),
        Position::default(),
    ));
    graph
        .edges
        .push(Edge::new("edge-branch", START_NODE_ID, "node-b"));
    graph
        .edges
        .push(Edge::new("edge-b-end", "node-b", END_NODE_ID));
    graph
}

pub fn new_workflow(name: &str, agent_ids: &[&str]) -> NewWorkflow {
    NewWorkflow::new(name, linear_graph(agent_ids))
}

/// In-memory SQLite store.
pub fn memory_store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::in_memory().expect("in-memory store"))
}

/// On-disk store in a temp dir. Keep the `TempDir` alive for the test.
pub fn temp_store() -> (Arc<SqliteStore>, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let store = SqliteStore::open(&dir.path().join("workflows.db")).expect("open store");
    (Arc::new(store), dir)
}
