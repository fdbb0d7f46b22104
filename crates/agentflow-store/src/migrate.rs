use tracing::{info, warn};

use agentflow_core::error::Result;
use agentflow_core::traits::WorkflowStore;
use agentflow_core::types::SavedWorkflow;
use agentflow_graph::document::LegacyWorkflow;

/// Outcome of importing legacy client-side records.
#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    /// Records newly created by this run.
    pub migrated_count: usize,
    /// Records skipped because a workflow with the same name exists.
    pub already_existed: usize,
    /// Records that could not be parsed or stored.
    pub failed: usize,
    pub total_attempted: usize,
    /// Created and pre-existing workflows, in input order.
    pub workflows: Vec<SavedWorkflow>,
}

/// Import legacy records one at a time. Idempotent by name; a bad record
/// is counted and skipped, never aborting the batch.
pub async fn migrate_legacy_store(
    store: &dyn WorkflowStore,
    records: Vec<serde_json::Value>,
) -> MigrationReport {
    let mut report = MigrationReport {
        total_attempted: records.len(),
        ..Default::default()
    };

    for (index, raw) in records.into_iter().enumerate() {
        match migrate_one(store, raw).await {
            Ok((workflow, created)) => {
                if created {
                    report.migrated_count += 1;
                } else {
                    report.already_existed += 1;
                }
                report.workflows.push(workflow);
            }
            Err(e) => {
                warn!(index, error = %e, "Skipping legacy workflow");
                report.failed += 1;
            }
        }
    }

    info!(
        migrated = report.migrated_count,
        existing = report.already_existed,
        failed = report.failed,
        total = report.total_attempted,
        "Legacy migration finished"
    );
    report
}

async fn migrate_one(
    store: &dyn WorkflowStore,
    raw: serde_json::Value,
) -> Result<(SavedWorkflow, bool)> {
    let legacy: LegacyWorkflow = serde_json::from_value(raw)?;
    if let Some(existing) = store.find_by_name(legacy.name.trim()).await? {
        info!(name = %existing.name, "Workflow already exists, skipping");
        return Ok((existing, false));
    }
    let created = store.create(legacy.into_new()?).await?;
    Ok((created, true))
}
