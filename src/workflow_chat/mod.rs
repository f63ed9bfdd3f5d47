//! Conversational collection of lead-targeting criteria.
//!
//! A chat is started for a workflow and asks one question at a time. Each
//! answer goes to the field extractor together with the transcript so far;
//! accepted values are merged into the chat's `collected_info` under the
//! lead taxonomy, rejected answers are dropped and the same question stays
//! open. When the user is done the owning workflow record is returned.

pub mod extractor;
pub mod manager;
pub mod model;
pub mod prompts;
pub mod routes;
pub mod snapshot;
pub mod taxonomy;

pub use extractor::{ExtractionResult, FieldExtractor, FieldUpdate, LlmFieldExtractor};
pub use manager::{ChatTurn, ContinueOutcome, WorkflowChatManager};
pub use model::{ChatMessage, ChatSession, ChatUpdate, Workflow};
pub use routes::{SessionPrincipal, WorkflowChatRouteState, workflow_chat_routes};
pub use snapshot::SnapshotExporter;
pub use taxonomy::LeadField;
