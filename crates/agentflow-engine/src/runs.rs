use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use agentflow_core::error::{FlowError, Result};
use agentflow_core::types::RunState;

#[derive(Default)]
struct RunEntry {
    state: Option<RunState>,
    cancel: Option<CancellationToken>,
}

/// Per-workflow run bookkeeping: at most one active run per workflow id,
/// plus the last known state of every workflow that has run. Entries live
/// until `forget` drops them.
#[derive(Default)]
pub struct RunRegistry {
    entries: Mutex<HashMap<String, RunEntry>>,
}

impl RunRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claim the run slot for `workflow_id`. Fails if a run is active.
    pub fn acquire(self: &Arc<Self>, workflow_id: &str) -> Result<RunGuard> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| FlowError::Internal(format!("run registry poisoned: {}", e)))?;
        let entry = entries.entry(workflow_id.to_string()).or_default();
        if entry.cancel.is_some() {
            return Err(FlowError::RunInProgress(workflow_id.to_string()));
        }
        let token = CancellationToken::new();
        entry.cancel = Some(token.clone());
        entry.state = Some(RunState::Preparing);
        Ok(RunGuard {
            registry: Arc::clone(self),
            workflow_id: workflow_id.to_string(),
            token,
        })
    }

    pub fn state(&self, workflow_id: &str) -> RunState {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(workflow_id).and_then(|e| e.state))
            .unwrap_or(RunState::Idle)
    }

    pub fn is_active(&self, workflow_id: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| {
                entries
                    .get(workflow_id)
                    .is_some_and(|e| e.cancel.is_some())
            })
            .unwrap_or(false)
    }

    /// Trigger cancellation of the active run. Returns false if none is active.
    pub fn cancel(&self, workflow_id: &str) -> bool {
        let Ok(entries) = self.entries.lock() else {
            return false;
        };
        match entries.get(workflow_id).and_then(|e| e.cancel.as_ref()) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Drop the entry for an idle workflow. An active run is left alone.
    pub fn forget(&self, workflow_id: &str) -> bool {
        let Ok(mut entries) = self.entries.lock() else {
            return false;
        };
        match entries.get(workflow_id) {
            Some(entry) if entry.cancel.is_none() => entries.remove(workflow_id).is_some(),
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn set_state(&self, workflow_id: &str, state: RunState) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.entry(workflow_id.to_string()).or_default().state = Some(state);
        }
    }

    fn release(&self, workflow_id: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            if let Some(entry) = entries.get_mut(workflow_id) {
                entry.cancel = None;
            }
        }
    }
}

/// Holds the run slot for one workflow; released on drop.
pub struct RunGuard {
    registry: Arc<RunRegistry>,
    workflow_id: String,
    token: CancellationToken,
}

impl RunGuard {
    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn set_state(&self, state: RunState) {
        self.registry.set_state(&self.workflow_id, state);
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.registry.release(&self.workflow_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_active_run() {
        let registry = RunRegistry::new();
        let guard = registry.acquire("wf").unwrap();
        assert!(matches!(
            registry.acquire("wf"),
            Err(FlowError::RunInProgress(_))
        ));
        assert!(registry.acquire("other").is_ok());
        drop(guard);
        assert!(registry.acquire("wf").is_ok());
    }

    #[test]
    fn test_state_survives_release() {
        let registry = RunRegistry::new();
        assert_eq!(registry.state("wf"), RunState::Idle);
        {
            let guard = registry.acquire("wf").unwrap();
            assert_eq!(registry.state("wf"), RunState::Preparing);
            guard.set_state(RunState::Completed);
        }
        assert_eq!(registry.state("wf"), RunState::Completed);
        assert!(!registry.is_active("wf"));
    }

    #[test]
    fn test_cancel_triggers_token() {
        let registry = RunRegistry::new();
        assert!(!registry.cancel("wf"));
        let guard = registry.acquire("wf").unwrap();
        assert!(registry.cancel("wf"));
        assert!(guard.token().is_cancelled());
    }

    #[test]
    fn test_forget_skips_active_runs() {
        let registry = RunRegistry::new();
        assert!(!registry.forget("wf"));

        let guard = registry.acquire("wf").unwrap();
        assert!(!registry.forget("wf"));
        assert_eq!(registry.state("wf"), RunState::Preparing);

        guard.set_state(RunState::Failed);
        drop(guard);
        assert_eq!(registry.len(), 1);
        assert!(registry.forget("wf"));
        assert!(registry.is_empty());
        assert_eq!(registry.state("wf"), RunState::Idle);
    }
}
