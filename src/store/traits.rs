//! Repository traits for chat sessions and workflows.
//!
//! The chat manager only sees these traits, so it can run against any
//! backend. `LibSqlBackend` implements both.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::workflow_chat::model::{ChatMessage, ChatSession, ChatUpdate, Workflow};

/// Storage for chat sessions.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Insert a new session. Returns the generated id, or `None` if no row
    /// was written.
    async fn insert_chat(
        &self,
        workflow_id: &str,
        messages: &[ChatMessage],
    ) -> Result<Option<String>, DatabaseError>;

    /// Get a session by id.
    async fn get_chat(&self, id: &str) -> Result<Option<ChatSession>, DatabaseError>;

    /// Apply `update` if the stored version still equals `expected_version`,
    /// bumping the version. Returns the number of modified rows.
    async fn update_chat(
        &self,
        id: &str,
        expected_version: i64,
        update: &ChatUpdate,
    ) -> Result<u64, DatabaseError>;
}

/// Storage for workflow records.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Get a workflow by id.
    async fn get_workflow(&self, id: &str) -> Result<Option<Workflow>, DatabaseError>;

    /// Insert a workflow with a generated id.
    async fn insert_workflow(
        &self,
        name: &str,
        data: &serde_json::Value,
    ) -> Result<Workflow, DatabaseError>;
}
