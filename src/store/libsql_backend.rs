//! libSQL backend implementing `ChatStore` and `WorkflowStore`.
//!
//! Supports local file and in-memory databases. Session messages and
//! collected fields are stored as JSON text columns.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{ChatStore, WorkflowStore};
use crate::workflow_chat::model::{ChatMessage, ChatSession, ChatUpdate, Workflow};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.init_schema().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(&self.conn).await
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(column: &str, raw: &str) -> Result<T, DatabaseError> {
    serde_json::from_str(raw)
        .map_err(|e| DatabaseError::Serialization(format!("{column}: {e}")))
}

/// Convert `Option<String>` to libsql Value.
fn opt_text_owned(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

const CHAT_COLUMNS: &str = "id, workflow_id, messages, collected_info, completed, snapshot, \
     version, created_at, updated_at";

/// Map a libsql Row to a ChatSession. Column order matches CHAT_COLUMNS.
fn row_to_chat(row: &libsql::Row) -> Result<ChatSession, DatabaseError> {
    let get_err = |e: libsql::Error| DatabaseError::Query(format!("chat row parse: {e}"));

    let messages_str: String = row.get(2).map_err(get_err)?;
    let collected_str: String = row.get(3).map_err(get_err)?;
    let completed: i64 = row.get(4).map_err(get_err)?;
    let created_str: String = row.get(7).map_err(get_err)?;
    let updated_str: String = row.get(8).map_err(get_err)?;

    let messages: Vec<ChatMessage> = from_json("messages", &messages_str)?;
    let collected_info: BTreeMap<String, String> = from_json("collected_info", &collected_str)?;

    Ok(ChatSession {
        id: row.get(0).map_err(get_err)?,
        workflow_id: row.get(1).map_err(get_err)?,
        messages,
        collected_info,
        completed: completed != 0,
        snapshot: row.get(5).ok(),
        version: row.get(6).map_err(get_err)?,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

fn row_to_workflow(row: &libsql::Row) -> Result<Workflow, DatabaseError> {
    let get_err = |e: libsql::Error| DatabaseError::Query(format!("workflow row parse: {e}"));

    let data_str: String = row.get(2).map_err(get_err)?;
    let created_str: String = row.get(3).map_err(get_err)?;

    Ok(Workflow {
        id: row.get(0).map_err(get_err)?,
        name: row.get(1).map_err(get_err)?,
        data: from_json("data", &data_str)?,
        created_at: parse_datetime(&created_str),
    })
}

// ── Trait implementations ───────────────────────────────────────────

#[async_trait]
impl ChatStore for LibSqlBackend {
    async fn insert_chat(
        &self,
        workflow_id: &str,
        messages: &[ChatMessage],
    ) -> Result<Option<String>, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let messages_json = to_json(&messages)?;

        let inserted = self
            .conn()
            .execute(
                "INSERT INTO workflow_chats (id, workflow_id, messages, collected_info, completed,
                    version, created_at, updated_at)
                 VALUES (?1, ?2, ?3, '{}', 0, 0, ?4, ?4)",
                params![id.clone(), workflow_id, messages_json, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_chat: {e}")))?;

        if inserted == 0 {
            return Ok(None);
        }
        debug!(chat_id = %id, workflow_id, "Workflow chat inserted into DB");
        Ok(Some(id))
    }

    async fn get_chat(&self, id: &str) -> Result<Option<ChatSession>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {CHAT_COLUMNS} FROM workflow_chats WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_chat: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_chat(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_chat: {e}"))),
        }
    }

    async fn update_chat(
        &self,
        id: &str,
        expected_version: i64,
        update: &ChatUpdate,
    ) -> Result<u64, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let messages_json = to_json(&update.messages)?;
        let collected_json = to_json(&update.collected_info)?;

        let modified = self
            .conn()
            .execute(
                "UPDATE workflow_chats
                 SET messages = ?1, collected_info = ?2, completed = ?3, snapshot = ?4,
                     version = version + 1, updated_at = ?5
                 WHERE id = ?6 AND version = ?7",
                params![
                    messages_json,
                    collected_json,
                    update.completed as i64,
                    opt_text_owned(update.snapshot.clone()),
                    now,
                    id,
                    expected_version,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_chat: {e}")))?;

        debug!(chat_id = id, expected_version, modified, "Workflow chat update");
        Ok(modified)
    }
}

#[async_trait]
impl WorkflowStore for LibSqlBackend {
    async fn get_workflow(&self, id: &str) -> Result<Option<Workflow>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, name, data, created_at FROM workflows WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_workflow: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_workflow(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_workflow: {e}"))),
        }
    }

    async fn insert_workflow(
        &self,
        name: &str,
        data: &serde_json::Value,
    ) -> Result<Workflow, DatabaseError> {
        let workflow = Workflow {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            data: data.clone(),
            created_at: Utc::now(),
        };

        self.conn()
            .execute(
                "INSERT INTO workflows (id, name, data, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    workflow.id.clone(),
                    workflow.name.clone(),
                    to_json(&workflow.data)?,
                    workflow.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_workflow: {e}")))?;

        debug!(workflow_id = %workflow.id, "Workflow inserted into DB");
        Ok(workflow)
    }
}
