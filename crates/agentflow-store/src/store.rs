use chrono::{DateTime, SecondsFormat, Utc};
use futures::future::BoxFuture;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use agentflow_core::error::{FlowError, Result};
use agentflow_core::traits::WorkflowStore;
use agentflow_core::types::{NewWorkflow, SavedWorkflow, WorkflowPatch};
use agentflow_graph::storable::{self, StorableEdge, StorableNode};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS workflows (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT,
        nodes TEXT NOT NULL,
        edges TEXT NOT NULL,
        node_count INTEGER NOT NULL,
        agent_count INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_workflows_name ON workflows(name);
    CREATE INDEX IF NOT EXISTS idx_workflows_created ON workflows(created_at);";

const SELECT_COLUMNS: &str =
    "SELECT id, name, description, nodes, edges, created_at, updated_at FROM workflows";

/// SQLite-backed workflow store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn db_err(e: impl std::fmt::Display) -> FlowError {
    FlowError::Database(e.to_string())
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| FlowError::Database(format!("bad timestamp '{}': {}", raw, e)))
}

/// Column values of one `workflows` row, before decoding.
struct RawRow {
    id: String,
    name: String,
    description: Option<String>,
    nodes: String,
    edges: String,
    created_at: String,
    updated_at: String,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            nodes: row.get(3)?,
            edges: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn decode(self) -> Result<SavedWorkflow> {
        let nodes: Vec<StorableNode> = serde_json::from_str(&self.nodes)?;
        let edges: Vec<StorableEdge> = serde_json::from_str(&self.edges)?;
        let graph = storable::deserialize_parts(nodes, edges)?;
        Ok(SavedWorkflow {
            id: self.id,
            name: self.name,
            description: self.description,
            node_count: graph.node_count(),
            agent_count: graph.agent_count(),
            graph,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                FlowError::Database(format!("Failed to create db directory: {}", e))
            })?;
        }

        let conn = Connection::open(path).map_err(db_err)?;

        // WAL for concurrent readers
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;

        debug!(path = %path.display(), "Workflow store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn insert(conn: &Connection, wf: &SavedWorkflow) -> Result<()> {
        let stored = storable::serialize(&wf.graph);
        let nodes = serde_json::to_string(&stored.nodes)?;
        let edges = serde_json::to_string(&stored.edges)?;
        conn.execute(
            "INSERT INTO workflows
                (id, name, description, nodes, edges, node_count, agent_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                wf.id,
                wf.name,
                wf.description,
                nodes,
                edges,
                wf.node_count as i64,
                wf.agent_count as i64,
                format_ts(&wf.created_at),
                format_ts(&wf.updated_at),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn fetch(conn: &Connection, id: &str) -> Result<Option<SavedWorkflow>> {
        let raw = conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                params![id],
                RawRow::from_row,
            )
            .optional()
            .map_err(db_err)?;
        raw.map(RawRow::decode).transpose()
    }
}

impl WorkflowStore for SqliteStore {
    fn create(&self, workflow: NewWorkflow) -> BoxFuture<'_, Result<SavedWorkflow>> {
        Box::pin(async move {
            let workflow = workflow.validated()?;
            let now = Utc::now();
            let created_at = workflow.created_at.unwrap_or(now);
            let saved = SavedWorkflow {
                id: uuid::Uuid::new_v4().to_string(),
                name: workflow.name,
                description: workflow.description,
                node_count: workflow.graph.node_count(),
                agent_count: workflow.graph.agent_count(),
                graph: workflow.graph,
                created_at,
                updated_at: workflow.updated_at.unwrap_or(now),
            };

            let conn = self.conn.lock().map_err(db_err)?;
            Self::insert(&conn, &saved)?;
            info!(id = %saved.id, name = %saved.name, nodes = saved.node_count, "Workflow created");
            Ok(saved)
        })
    }

    fn list(&self) -> BoxFuture<'_, Result<Vec<SavedWorkflow>>> {
        Box::pin(async move {
            let conn = self.conn.lock().map_err(db_err)?;
            let mut stmt = conn
                .prepare(&format!(
                    "{} ORDER BY created_at DESC, rowid DESC",
                    SELECT_COLUMNS
                ))
                .map_err(db_err)?;
            let rows = stmt
                .query_map([], RawRow::from_row)
                .map_err(db_err)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_err)?;
            rows.into_iter().map(RawRow::decode).collect()
        })
    }

    fn get(&self, id: &str) -> BoxFuture<'_, Result<SavedWorkflow>> {
        let id = id.to_string();
        Box::pin(async move {
            let conn = self.conn.lock().map_err(db_err)?;
            Self::fetch(&conn, &id)?.ok_or_else(|| FlowError::not_found("workflow", id))
        })
    }

    fn find_by_name(&self, name: &str) -> BoxFuture<'_, Result<Option<SavedWorkflow>>> {
        let name = name.trim().to_string();
        Box::pin(async move {
            let conn = self.conn.lock().map_err(db_err)?;
            let raw = conn
                .query_row(
                    &format!("{} WHERE name = ?1 ORDER BY rowid ASC LIMIT 1", SELECT_COLUMNS),
                    params![name],
                    RawRow::from_row,
                )
                .optional()
                .map_err(db_err)?;
            raw.map(RawRow::decode).transpose()
        })
    }

    fn update(&self, id: &str, patch: WorkflowPatch) -> BoxFuture<'_, Result<SavedWorkflow>> {
        let id = id.to_string();
        Box::pin(async move {
            let conn = self.conn.lock().map_err(db_err)?;
            let current = Self::fetch(&conn, &id)?
                .ok_or_else(|| FlowError::not_found("workflow", id.clone()))?;
            let next = patch.apply_to(&current, Utc::now())?;

            let stored = storable::serialize(&next.graph);
            conn.execute(
                "UPDATE workflows
                 SET name = ?2, description = ?3, nodes = ?4, edges = ?5,
                     node_count = ?6, agent_count = ?7, updated_at = ?8
                 WHERE id = ?1",
                params![
                    id,
                    next.name,
                    next.description,
                    serde_json::to_string(&stored.nodes)?,
                    serde_json::to_string(&stored.edges)?,
                    next.node_count as i64,
                    next.agent_count as i64,
                    format_ts(&next.updated_at),
                ],
            )
            .map_err(db_err)?;
            debug!(id = %id, "Workflow updated");
            Ok(next)
        })
    }

    fn delete(&self, id: &str) -> BoxFuture<'_, Result<()>> {
        let id = id.to_string();
        Box::pin(async move {
            let conn = self.conn.lock().map_err(db_err)?;
            let affected = conn
                .execute("DELETE FROM workflows WHERE id = ?1", params![id])
                .map_err(db_err)?;
            if affected == 0 {
                return Err(FlowError::not_found("workflow", id));
            }
            info!(id = %id, "Workflow deleted");
            Ok(())
        })
    }
}
