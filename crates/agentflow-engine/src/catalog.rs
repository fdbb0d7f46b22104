use std::collections::HashMap;

use agentflow_core::traits::AgentCatalog;
use agentflow_core::types::AgentDefinition;

/// Agent definitions taken from the `[[agents]]` config section.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    by_id: HashMap<String, AgentDefinition>,
}

impl StaticCatalog {
    /// Definitions without an id cannot be matched to graph nodes and are skipped.
    pub fn new(definitions: &[AgentDefinition]) -> Self {
        let by_id = definitions
            .iter()
            .filter_map(|d| d.id.clone().map(|id| (id, d.clone())))
            .collect();
        Self { by_id }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl AgentCatalog for StaticCatalog {
    fn definition(&self, agent_id: &str) -> Option<AgentDefinition> {
        self.by_id.get(agent_id).cloned()
    }
}
