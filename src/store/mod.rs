//! libSQL-backed storage for chat sessions and workflows.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{ChatStore, WorkflowStore};
