//! Runs saved or draft workflows against the agent execution backend.
//!
//! A run moves through `Preparing -> Running -> Completed | Failed`. Drafts
//! are persisted before anything else so every run has a stable workflow
//! id. Agent sync is best-effort; step failures abort the run and discard
//! the partial trace.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use agentflow_core::config::{ExecutionConfig, ExecutionMode};
use agentflow_core::error::{FlowError, Result};
use agentflow_core::event::{EventBus, RunEvent};
use agentflow_core::model::NodeKind;
use agentflow_core::traits::{AgentBackend, AgentCatalog, WorkflowStore};
use agentflow_core::types::*;
use agentflow_graph::document::to_backend_workflow;
use agentflow_graph::plan::{build_plan, ExecutionPlan};

use crate::runs::{RunGuard, RunRegistry};

/// What to execute.
#[derive(Debug, Clone)]
pub enum RunTarget {
    /// A workflow already in the store.
    Saved(String),
    /// An unsaved builder graph. It is persisted first.
    Draft(NewWorkflow),
}

pub struct Orchestrator {
    store: Arc<dyn WorkflowStore>,
    backend: Arc<dyn AgentBackend>,
    catalog: Arc<dyn AgentCatalog>,
    events: Arc<EventBus>,
    config: ExecutionConfig,
    runs: Arc<RunRegistry>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        backend: Arc<dyn AgentBackend>,
        catalog: Arc<dyn AgentCatalog>,
        events: Arc<EventBus>,
        config: ExecutionConfig,
    ) -> Self {
        Self {
            store,
            backend,
            catalog,
            events,
            config,
            runs: RunRegistry::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn WorkflowStore> {
        &self.store
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Last known state of `workflow_id`, `Idle` if it never ran.
    pub fn state(&self, workflow_id: &str) -> RunState {
        self.runs.state(workflow_id)
    }

    /// Cancel the active run of `workflow_id`. Returns false if none is active.
    pub fn cancel(&self, workflow_id: &str) -> bool {
        let cancelled = self.runs.cancel(workflow_id);
        if cancelled {
            info!(workflow_id, "Run cancellation requested");
        }
        cancelled
    }

    /// Drop the run state kept for `workflow_id`, e.g. after it was deleted.
    /// Returns false while a run is active.
    pub fn forget(&self, workflow_id: &str) -> bool {
        self.runs.forget(workflow_id)
    }

    fn transition(&self, guard: &RunGuard, state: RunState) {
        guard.set_state(state);
        self.events.publish(RunEvent::StateChanged {
            workflow_id: guard.workflow_id().to_string(),
            state,
        });
    }

    /// Execute a workflow end to end and return its ordered result trace.
    pub async fn execute(&self, target: RunTarget, input: &str) -> Result<WorkflowExecutionResult> {
        let workflow_id = match target {
            RunTarget::Saved(id) => id,
            RunTarget::Draft(draft) => {
                let saved = self.store.create(draft).await.map_err(|e| {
                    error!(error = %e, "Failed to persist draft workflow");
                    FlowError::PersistFailed(e.to_string())
                })?;
                info!(workflow_id = %saved.id, name = %saved.name, "Draft workflow persisted");
                saved.id
            }
        };

        let guard = self.runs.acquire(&workflow_id)?;
        self.transition(&guard, RunState::Preparing);

        let result = self.run_guarded(&guard, input).await;
        match &result {
            Ok(r) => {
                info!(
                    workflow_id = %workflow_id,
                    steps = r.results.len(),
                    execution_time = r.execution_time,
                    "Workflow run completed"
                );
                self.transition(&guard, RunState::Completed);
            }
            Err(e) => {
                error!(workflow_id = %workflow_id, error = %e, "Workflow run failed");
                self.transition(&guard, RunState::Failed);
            }
        }
        drop(guard);
        if matches!(&result, Err(e) if e.is_not_found()) {
            self.runs.forget(&workflow_id);
        }
        result
    }

    async fn run_guarded(&self, guard: &RunGuard, input: &str) -> Result<WorkflowExecutionResult> {
        let workflow = self.store.get(guard.workflow_id()).await?;
        let plan = build_plan(&workflow.graph)?;
        debug!(
            workflow_id = %workflow.id,
            steps = plan.steps.len(),
            unreachable = plan.unreachable.len(),
            "Execution plan built"
        );

        let run_secs = self.config.run_timeout_secs;
        let run = async {
            if self.config.sync_agents {
                self.sync_agents(&plan).await;
            }
            self.transition(guard, RunState::Running);
            match self.config.mode {
                ExecutionMode::Stepwise => self.run_stepwise(&workflow, &plan, input).await,
                ExecutionMode::Remote => self.run_remote(&workflow, input).await,
            }
        };

        tokio::select! {
            _ = guard.token().cancelled() => {
                warn!(workflow_id = %workflow.id, "Run cancelled");
                Err(FlowError::Cancelled)
            }
            outcome = tokio::time::timeout(Duration::from_secs(run_secs), run) => {
                outcome.unwrap_or(Err(FlowError::Timeout {
                    scope: "workflow run".into(),
                    secs: run_secs,
                }))
            }
        }
    }

    /// Make sure every agent the plan uses exists on the backend. Failures
    /// are reported and never abort the run.
    async fn sync_agents(&self, plan: &ExecutionPlan) {
        let wanted = plan.agent_ids();
        if wanted.is_empty() {
            return;
        }

        let existing: HashSet<String> = match self.backend.list_agents().await {
            Ok(agents) => agents.into_iter().map(|a| a.id).collect(),
            Err(e) => {
                for agent_id in &wanted {
                    self.report_sync_failure(agent_id, format!("listing agents failed: {}", e));
                }
                return;
            }
        };

        for agent_id in wanted {
            if existing.contains(agent_id) {
                continue;
            }
            let Some(mut definition) = self.catalog.definition(agent_id) else {
                self.report_sync_failure(agent_id, "no local definition".to_string());
                continue;
            };
            definition.id = Some(agent_id.to_string());
            match self.backend.create_agent(definition).await {
                Ok(created) => info!(agent_id = %created.id, "Synced agent to backend"),
                Err(e) => self.report_sync_failure(agent_id, e.to_string()),
            }
        }
    }

    fn report_sync_failure(&self, agent_id: &str, message: String) {
        let err = FlowError::AgentSyncFailed {
            agent_id: agent_id.to_string(),
            message: message.clone(),
        };
        warn!(error = %err, "Agent sync failed, continuing");
        self.events.publish(RunEvent::AgentSyncFailed {
            agent_id: agent_id.to_string(),
            message,
        });
    }

    async fn run_stepwise(
        &self,
        workflow: &SavedWorkflow,
        plan: &ExecutionPlan,
        input: &str,
    ) -> Result<WorkflowExecutionResult> {
        let started = Instant::now();
        let step_secs = self.config.step_timeout_secs;
        let mut results = Vec::with_capacity(plan.steps.len());
        let mut text = input.to_string();

        for (index, step) in plan.steps.iter().enumerate() {
            let agent_name = step.target.name().to_string();
            info!(
                workflow_id = %workflow.id,
                index,
                node_id = %step.node_id,
                agent = %agent_name,
                "Executing step"
            );
            self.events.publish(RunEvent::StepStarted {
                workflow_id: workflow.id.clone(),
                index,
                node_id: step.node_id.clone(),
                agent_name: agent_name.clone(),
            });

            let step_start = Instant::now();
            let invoked = tokio::time::timeout(
                Duration::from_secs(step_secs),
                self.backend.invoke(step.target.id(), &text),
            )
            .await;
            let output = match invoked {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => {
                    return Err(FlowError::StepExecutionFailed {
                        index,
                        node_id: step.node_id.clone(),
                        agent_name,
                        message: e.to_string(),
                    })
                }
                Err(_) => {
                    return Err(FlowError::Timeout {
                        scope: format!("step {} ({})", index, agent_name),
                        secs: step_secs,
                    })
                }
            };
            let elapsed_ms = step_start.elapsed().as_millis() as u64;

            self.events.publish(RunEvent::StepCompleted {
                workflow_id: workflow.id.clone(),
                index,
                node_id: step.node_id.clone(),
                elapsed_ms,
            });
            debug!(node_id = %step.node_id, elapsed_ms, "Step complete");

            results.push(StepResult {
                node_id: step.node_id.clone(),
                agent_name,
                processed_text: std::mem::replace(&mut text, output.clone()),
                output,
                elapsed_ms,
            });
        }

        Ok(WorkflowExecutionResult {
            workflow_id: workflow.id.clone(),
            results,
            execution_time: started.elapsed().as_secs_f64(),
            status: RunStatus::Success,
        })
    }

    async fn within_step_timeout<T>(
        &self,
        scope: &str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let secs = self.config.step_timeout_secs;
        tokio::time::timeout(Duration::from_secs(secs), call)
            .await
            .unwrap_or_else(|_| {
                Err(FlowError::Timeout {
                    scope: scope.to_string(),
                    secs,
                })
            })
    }

    /// Hand the whole workflow to the backend and normalise its trace.
    async fn run_remote(
        &self,
        workflow: &SavedWorkflow,
        input: &str,
    ) -> Result<WorkflowExecutionResult> {
        let remote_id = self
            .within_step_timeout(
                "remote register",
                self.backend.register_workflow(to_backend_workflow(workflow)),
            )
            .await?;
        debug!(workflow_id = %workflow.id, remote_id = %remote_id, "Executing on backend");
        let mut result = self
            .within_step_timeout(
                "remote execution",
                self.backend.execute_workflow(&remote_id, input),
            )
            .await?;

        let terminal: HashSet<&str> = workflow
            .graph
            .nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Start | NodeKind::End))
            .map(|n| n.id.as_str())
            .collect();
        result.results.retain(|r| {
            !terminal.contains(r.node_id.as_str()) && r.agent_name != "START" && r.agent_name != "END"
        });

        if result.status == RunStatus::Failed {
            let index = result.results.len().saturating_sub(1);
            return Err(match result.results.pop() {
                Some(failed) => FlowError::StepExecutionFailed {
                    index,
                    node_id: failed.node_id,
                    agent_name: failed.agent_name,
                    message: failed.output,
                },
                None => FlowError::StepExecutionFailed {
                    index: 0,
                    node_id: String::new(),
                    agent_name: String::new(),
                    message: "backend reported a failed run".into(),
                },
            });
        }

        result.workflow_id = workflow.id.clone();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentflow_test_utils::*;

    fn orchestrator(
        backend: Arc<EchoBackend>,
        catalog: FixedCatalog,
        config: ExecutionConfig,
    ) -> Orchestrator {
        Orchestrator::new(
            memory_store(),
            backend,
            Arc::new(catalog),
            Arc::new(EventBus::default()),
            config,
        )
    }

    fn remote_config() -> ExecutionConfig {
        ExecutionConfig {
            mode: ExecutionMode::Remote,
            ..fast_config()
        }
    }

    fn fast_config() -> ExecutionConfig {
        ExecutionConfig {
            mode: ExecutionMode::Stepwise,
            step_timeout_secs: 5,
            run_timeout_secs: 10,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_linear_run_threads_output() {
        let backend = EchoBackend::new().with_agents(&["a", "b"]).into_arc();
        let orch = orchestrator(backend.clone(), FixedCatalog::default(), fast_config());
        let result = orch
            .execute(RunTarget::Draft(new_workflow("Two steps", &["a", "b"])), "hello")
            .await
            .unwrap();

        assert_eq!(result.status, RunStatus::Success);
        assert_eq!(result.results.len(), 2);
        assert_eq!(result.results[0].processed_text, "hello");
        assert_eq!(result.results[0].output, "HELLO [a]");
        assert_eq!(result.results[1].processed_text, "HELLO [a]");
        assert_eq!(result.final_output(), Some("HELLO [A] [b]"));
        assert_eq!(result.results[1].agent_name, "Agent b");
        assert_eq!(orch.state(&result.workflow_id), RunState::Completed);
        assert_eq!(
            backend.invocations(),
            vec![
                ("a".to_string(), "hello".to_string()),
                ("b".to_string(), "HELLO [a]".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_saved_run_on_disk_store() {
        let (store, _dir) = temp_store();
        let saved = store.create(new_workflow("On disk", &["a"])).await.unwrap();
        let orch = Orchestrator::new(
            store,
            EchoBackend::new().with_agents(&["a"]).into_arc(),
            Arc::new(FixedCatalog::default()),
            Arc::new(EventBus::default()),
            fast_config(),
        );
        let result = orch
            .execute(RunTarget::Saved(saved.id.clone()), "disk")
            .await
            .unwrap();
        assert_eq!(result.workflow_id, saved.id);
        assert_eq!(result.final_output(), Some("DISK [a]"));
    }

    #[tokio::test]
    async fn test_empty_pipeline_succeeds() {
        let backend = EchoBackend::new().into_arc();
        let orch = orchestrator(backend.clone(), FixedCatalog::default(), fast_config());
        let result = orch
            .execute(RunTarget::Draft(new_workflow("Nothing", &[])), "x")
            .await
            .unwrap();
        assert!(result.results.is_empty());
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_step_failure_reports_step() {
        let backend = EchoBackend::new().with_agents(&["a", "b"]).fail_on("b").into_arc();
        let orch = orchestrator(backend, FixedCatalog::default(), fast_config());
        let err = orch
            .execute(RunTarget::Draft(new_workflow("Breaks", &["a", "b"])), "x")
            .await
            .unwrap_err();
        match err {
            FlowError::StepExecutionFailed {
                index,
                node_id,
                agent_name,
                ..
            } => {
                assert_eq!(index, 1);
                assert_eq!(node_id, "node-b");
                assert_eq!(agent_name, "Agent b");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_draft_is_persist_failed() {
        let backend = EchoBackend::new().into_arc();
        let orch = orchestrator(backend.clone(), FixedCatalog::default(), fast_config());
        let err = orch
            .execute(RunTarget::Draft(new_workflow("x", &["a"])), "in")
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::PersistFailed(_)));
        assert_eq!(backend.call_count(), 0);
        assert!(orch.store().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_saved_id() {
        let orch = orchestrator(EchoBackend::new().into_arc(), FixedCatalog::default(), fast_config());
        let err = orch
            .execute(RunTarget::Saved("missing".into()), "in")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(orch.state("missing"), RunState::Idle);
        assert!(orch.runs.is_empty());
    }

    #[tokio::test]
    async fn test_forget_drops_finished_run() {
        let orch = orchestrator(
            EchoBackend::new().with_agents(&["a"]).into_arc(),
            FixedCatalog::default(),
            fast_config(),
        );
        let result = orch
            .execute(RunTarget::Draft(new_workflow("Short lived", &["a"])), "x")
            .await
            .unwrap();
        assert_eq!(orch.state(&result.workflow_id), RunState::Completed);
        assert_eq!(orch.runs.len(), 1);

        assert!(orch.forget(&result.workflow_id));
        assert_eq!(orch.state(&result.workflow_id), RunState::Idle);
        assert!(orch.runs.is_empty());
    }

    #[tokio::test]
    async fn test_branching_rejected() {
        let backend = EchoBackend::new().into_arc();
        let orch = orchestrator(backend.clone(), FixedCatalog::default(), fast_config());
        let draft = NewWorkflow::new("Branches", branching_graph());
        let err = orch.execute(RunTarget::Draft(draft), "in").await.unwrap_err();
        assert!(matches!(err, FlowError::Validation(_)));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_sync_creates_missing_agents() {
        let backend = EchoBackend::new().with_agents(&["a"]).into_arc();
        let orch = orchestrator(backend.clone(), FixedCatalog::for_ids(&["b"]), fast_config());
        orch.execute(RunTarget::Draft(new_workflow("Sync", &["a", "b"])), "x")
            .await
            .unwrap();
        let created = backend.created_agents();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].id.as_deref(), Some("b"));
        assert_eq!(created[0].prompt, "You are agent b.");
    }

    #[tokio::test]
    async fn test_sync_failure_is_not_fatal() {
        let backend = EchoBackend::new().fail_listing().into_arc();
        let orch = orchestrator(backend.clone(), FixedCatalog::default(), fast_config());
        let mut events = orch.events().subscribe();
        let result = orch
            .execute(RunTarget::Draft(new_workflow("Unsynced", &["a"])), "x")
            .await
            .unwrap();
        assert_eq!(result.results.len(), 1);

        let mut saw_sync_failure = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, RunEvent::AgentSyncFailed { ref agent_id, .. } if agent_id == "a") {
                saw_sync_failure = true;
            }
        }
        assert!(saw_sync_failure);
    }

    #[tokio::test]
    async fn test_missing_definition_still_runs() {
        let backend = EchoBackend::new().into_arc();
        let orch = orchestrator(backend.clone(), FixedCatalog::default(), fast_config());
        let result = orch
            .execute(RunTarget::Draft(new_workflow("No defs", &["ghost"])), "x")
            .await
            .unwrap();
        assert_eq!(result.results.len(), 1);
        assert!(backend.created_agents().is_empty());
    }

    #[tokio::test]
    async fn test_step_timeout() {
        let backend = EchoBackend::new()
            .with_agents(&["slow"])
            .delay("slow", Duration::from_secs(3))
            .into_arc();
        let config = ExecutionConfig {
            step_timeout_secs: 1,
            ..fast_config()
        };
        let orch = orchestrator(backend, FixedCatalog::default(), config);
        let err = orch
            .execute(RunTarget::Draft(new_workflow("Slowpoke", &["slow"])), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Timeout { secs: 1, .. }));
    }

    #[tokio::test]
    async fn test_run_timeout_across_steps() {
        // Each step fits the step budget, the three together do not fit the run budget
        let step = Duration::from_millis(1200);
        let backend = EchoBackend::new()
            .with_agents(&["a", "b", "c"])
            .delay("a", step)
            .delay("b", step)
            .delay("c", step)
            .into_arc();
        let config = ExecutionConfig {
            step_timeout_secs: 2,
            run_timeout_secs: 3,
            ..fast_config()
        };
        let orch = orchestrator(backend.clone(), FixedCatalog::default(), config);
        let err = orch
            .execute(RunTarget::Draft(new_workflow("Marathon", &["a", "b", "c"])), "x")
            .await
            .unwrap_err();
        match err {
            FlowError::Timeout { scope, secs } => {
                assert_eq!(scope, "workflow run");
                assert_eq!(secs, 3);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        // The third step was in flight when the run budget ran out
        assert_eq!(backend.invocations().len(), 3);
    }

    #[tokio::test]
    async fn test_remote_execution_has_step_timeout() {
        let backend = EchoBackend::new()
            .with_agents(&["slow"])
            .delay("slow", Duration::from_secs(3))
            .into_arc();
        let config = ExecutionConfig {
            step_timeout_secs: 1,
            ..remote_config()
        };
        let orch = orchestrator(backend.clone(), FixedCatalog::default(), config);
        let err = orch
            .execute(RunTarget::Draft(new_workflow("Slow remote", &["slow"])), "x")
            .await
            .unwrap_err();
        match err {
            FlowError::Timeout { scope, secs } => {
                assert_eq!(scope, "remote execution");
                assert_eq!(secs, 1);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(backend.registered_ids().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_run_rejected_and_cancel() {
        let backend = EchoBackend::new()
            .with_agents(&["slow"])
            .delay("slow", Duration::from_secs(5))
            .into_arc();
        let orch = Arc::new(orchestrator(backend, FixedCatalog::default(), fast_config()));
        let saved = orch
            .store()
            .create(new_workflow("Long run", &["slow"]))
            .await
            .unwrap();

        let first = {
            let orch = orch.clone();
            let id = saved.id.clone();
            tokio::spawn(async move { orch.execute(RunTarget::Saved(id), "x").await })
        };

        // Wait until the first run is in flight
        for _ in 0..100 {
            if orch.state(&saved.id) == RunState::Running {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(orch.state(&saved.id), RunState::Running);

        let second = orch.execute(RunTarget::Saved(saved.id.clone()), "x").await;
        assert!(matches!(second, Err(FlowError::RunInProgress(_))));

        assert!(orch.cancel(&saved.id));
        let outcome = first.await.unwrap();
        assert!(matches!(outcome, Err(FlowError::Cancelled)));
        assert_eq!(orch.state(&saved.id), RunState::Failed);
        assert!(!orch.cancel(&saved.id));
    }

    #[tokio::test]
    async fn test_remote_mode_drops_terminal_entries() {
        let backend = EchoBackend::new().with_agents(&["a", "b"]).into_arc();
        let orch = orchestrator(backend.clone(), FixedCatalog::default(), remote_config());
        let result = orch
            .execute(RunTarget::Draft(new_workflow("Remote", &["a", "b"])), "hi")
            .await
            .unwrap();
        let names: Vec<&str> = result.results.iter().map(|r| r.agent_name.as_str()).collect();
        assert_eq!(names, vec!["Agent a", "Agent b"]);
        assert_eq!(result.final_output(), Some("HI [A] [b]"));
        let registered = backend.registered_workflows();
        assert_eq!(registered.len(), 1);
        assert!(registered[0].nodes.iter().any(|n| n.data.agent_id == "START"));
    }

    #[tokio::test]
    async fn test_remote_runs_under_backend_assigned_id() {
        let backend = EchoBackend::new().with_agents(&["a"]).into_arc();
        let orch = orchestrator(backend.clone(), FixedCatalog::default(), remote_config());
        let saved = orch
            .store()
            .create(new_workflow("Rerun", &["a"]))
            .await
            .unwrap();

        for input in ["one", "two"] {
            let result = orch
                .execute(RunTarget::Saved(saved.id.clone()), input)
                .await
                .unwrap();
            assert_eq!(result.workflow_id, saved.id);
        }
        assert!(backend.registered_workflows().iter().all(|w| w.id.is_none()));
        assert_eq!(backend.registered_ids(), vec!["remote-1", "remote-2"]);
    }

    #[tokio::test]
    async fn test_remote_failure_maps_to_step_failure() {
        let backend = EchoBackend::new().with_agents(&["a", "b"]).fail_on("b").into_arc();
        let orch = orchestrator(backend, FixedCatalog::default(), remote_config());
        let err = orch
            .execute(RunTarget::Draft(new_workflow("Remote fail", &["a", "b"])), "hi")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FlowError::StepExecutionFailed { index: 1, ref node_id, .. } if node_id == "node-b"
        ));
    }

    #[tokio::test]
    async fn test_state_events_published() {
        let backend = EchoBackend::new().with_agents(&["a"]).into_arc();
        let orch = orchestrator(backend, FixedCatalog::default(), fast_config());
        let mut events = orch.events().subscribe();
        orch.execute(RunTarget::Draft(new_workflow("Events", &["a"])), "x")
            .await
            .unwrap();

        let mut states = Vec::new();
        let mut steps = 0;
        while let Ok(event) = events.try_recv() {
            match event {
                RunEvent::StateChanged { state, .. } => states.push(state),
                RunEvent::StepCompleted { .. } => steps += 1,
                _ => {}
            }
        }
        assert_eq!(
            states,
            vec![RunState::Preparing, RunState::Running, RunState::Completed]
        );
        assert_eq!(steps, 1);
    }
}
