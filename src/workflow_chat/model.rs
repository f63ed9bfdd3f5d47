//! Chat session and workflow data models.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm;

/// One question put to the user, and their answer once given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

impl ChatMessage {
    pub fn question(text: impl Into<String>) -> Self {
        Self {
            question: text.into(),
            response: None,
        }
    }
}

/// A lead-collection conversation tied to a workflow.
///
/// Stored in the `workflow_chats` table; `messages` and `collected_info`
/// are JSON columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub workflow_id: String,
    /// Conversation order. Only the last entry may lack a response.
    pub messages: Vec<ChatMessage>,
    /// Field name → normalized value. Last write wins.
    pub collected_info: BTreeMap<String, String>,
    pub completed: bool,
    /// Location of the exported `collected_info` snapshot, once completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<String>,
    /// Bumped on every update; writes are conditional on it.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    /// The question currently waiting for an answer.
    pub fn outstanding_question(&self) -> Option<&str> {
        self.messages
            .last()
            .filter(|m| m.response.is_none())
            .map(|m| m.question.as_str())
    }

    /// Pair every question with its answer as assistant/user turns.
    pub fn transcript(&self) -> Vec<llm::ChatMessage> {
        let mut turns = Vec::with_capacity(self.messages.len() * 2);
        for message in &self.messages {
            turns.push(llm::ChatMessage::assistant(&message.question));
            if let Some(ref response) = message.response {
                turns.push(llm::ChatMessage::user(response));
            }
        }
        turns
    }

    /// Attach the user's answer to the last question. Returns `false` if the
    /// session has no messages.
    pub fn answer_last(&mut self, response: &str) -> bool {
        match self.messages.last_mut() {
            Some(last) => {
                last.response = Some(response.to_string());
                true
            }
            None => false,
        }
    }
}

/// Fields written by one successful continue call.
#[derive(Debug, Clone)]
pub struct ChatUpdate {
    pub messages: Vec<ChatMessage>,
    pub collected_info: BTreeMap<String, String>,
    pub completed: bool,
    pub snapshot: Option<String>,
}

/// A workflow record, returned verbatim when a chat completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
