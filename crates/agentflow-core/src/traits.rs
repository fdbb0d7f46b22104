use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::*;

/// Workflow persistence. Implemented by the SQLite store and the HTTP client
/// for a remote persistence gateway.
pub trait WorkflowStore: Send + Sync + 'static {
    /// Validate, derive counts, and persist a new record.
    fn create(&self, workflow: NewWorkflow) -> BoxFuture<'_, Result<SavedWorkflow>>;

    /// All records, newest first.
    fn list(&self) -> BoxFuture<'_, Result<Vec<SavedWorkflow>>>;

    fn get(&self, id: &str) -> BoxFuture<'_, Result<SavedWorkflow>>;

    /// Exact name match, used by migration for idempotency.
    fn find_by_name(&self, name: &str) -> BoxFuture<'_, Result<Option<SavedWorkflow>>>;

    /// Partial update. Always refreshes `updated_at`.
    fn update(&self, id: &str, patch: WorkflowPatch) -> BoxFuture<'_, Result<SavedWorkflow>>;

    fn delete(&self, id: &str) -> BoxFuture<'_, Result<()>>;
}

/// Remote agent execution service.
pub trait AgentBackend: Send + Sync + 'static {
    fn list_agents(&self) -> BoxFuture<'_, Result<Vec<BackendAgent>>>;

    fn create_agent(&self, agent: AgentDefinition) -> BoxFuture<'_, Result<BackendAgent>>;

    /// Run one agent (or tool) on `input` and return its text output.
    fn invoke(&self, target_id: &str, input: &str) -> BoxFuture<'_, Result<String>>;

    /// Register a workflow and return the backend's id for it.
    fn register_workflow(&self, workflow: BackendWorkflow) -> BoxFuture<'_, Result<String>>;

    fn execute_workflow(
        &self,
        workflow_id: &str,
        input: &str,
    ) -> BoxFuture<'_, Result<WorkflowExecutionResult>>;
}

/// Source of local agent definitions for agent sync.
pub trait AgentCatalog: Send + Sync + 'static {
    fn definition(&self, agent_id: &str) -> Option<AgentDefinition>;
}
