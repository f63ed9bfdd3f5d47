//! Chat session manager: drives a lead-collection chat one turn at a time.
//!
//! Holds no per-chat state: every call loads the session, asks the
//! extractor for a decision and writes the result back in one conditional
//! update.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::{ChatError, ExtractionError};
use crate::store::{ChatStore, WorkflowStore};

use super::extractor::{ExtractionResult, FieldExtractor, FieldUpdate};
use super::model::{ChatMessage, ChatSession, ChatUpdate, Workflow};
use super::prompts::INITIAL_QUESTION;
use super::snapshot::SnapshotExporter;

/// The next question for a chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    #[serde(rename = "workFlowChatId")]
    pub chat_id: String,
    pub question: String,
}

/// Result of a successful continue call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ContinueOutcome {
    /// The chat goes on with another question.
    Question(ChatTurn),
    /// The user is done; the owning workflow is returned as-is.
    Completed(Workflow),
}

/// Coordinates chat sessions, field extraction and persistence.
pub struct WorkflowChatManager {
    chats: Arc<dyn ChatStore>,
    workflows: Arc<dyn WorkflowStore>,
    extractor: Arc<dyn FieldExtractor>,
    exporter: Option<SnapshotExporter>,
    extractor_timeout: Duration,
}

impl WorkflowChatManager {
    pub fn new(
        chats: Arc<dyn ChatStore>,
        workflows: Arc<dyn WorkflowStore>,
        extractor: Arc<dyn FieldExtractor>,
    ) -> Self {
        Self {
            chats,
            workflows,
            extractor,
            exporter: None,
            extractor_timeout: AppConfig::DEFAULT_EXTRACTOR_TIMEOUT,
        }
    }

    /// Export `collected_info` through `exporter` when a chat completes.
    pub fn with_exporter(mut self, exporter: SnapshotExporter) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn with_extractor_timeout(mut self, timeout: Duration) -> Self {
        self.extractor_timeout = timeout;
        self
    }

    /// Start a new chat for `workflow_id` and return its first question.
    ///
    /// The workflow is not looked up here; it only has to exist once the
    /// chat completes.
    pub async fn trigger(&self, workflow_id: &str) -> Result<ChatTurn, ChatError> {
        let workflow_id = workflow_id.trim();
        if workflow_id.is_empty() {
            return Err(ChatError::Validation(
                "Workflow id must not be empty".to_string(),
            ));
        }

        let messages = vec![ChatMessage::question(INITIAL_QUESTION)];
        let chat_id = self
            .chats
            .insert_chat(workflow_id, &messages)
            .await?
            .ok_or_else(|| {
                ChatError::Persistence("Chat insert did not report a generated id".to_string())
            })?;

        info!(chat_id = %chat_id, workflow_id, "Workflow chat created");
        Ok(ChatTurn {
            chat_id,
            question: INITIAL_QUESTION.to_string(),
        })
    }

    /// Record `user_response` against the outstanding question and advance.
    ///
    /// Nothing is written unless the extractor accepts the answer and the
    /// conditional update succeeds.
    pub async fn continue_chat(
        &self,
        chat_id: &str,
        user_response: &str,
    ) -> Result<ContinueOutcome, ChatError> {
        let mut session = self
            .chats
            .get_chat(chat_id)
            .await?
            .ok_or_else(|| ChatError::chat_not_found(chat_id))?;

        if session.completed {
            return Err(ChatError::SessionCompleted {
                id: session.id.clone(),
            });
        }

        if !session.answer_last(user_response) {
            return Err(ChatError::Persistence(format!(
                "Chat {chat_id} has no messages"
            )));
        }

        let transcript = session.transcript();
        let extraction = self.extractor.extract(&transcript);
        let result = tokio::time::timeout(self.extractor_timeout, extraction)
            .await
            .map_err(|_| ExtractionError::Timeout(self.extractor_timeout))??;

        let (update, next_question, finished) = match result {
            ExtractionResult::Invalid { message } => {
                warn!(chat_id, hint = %message, "Answer rejected; question stays open");
                return Err(ChatError::Validation(message));
            }
            ExtractionResult::Valid {
                update,
                next_question,
                finished,
            } => (update, next_question, finished),
        };

        if let Some(FieldUpdate { field, value }) = update {
            info!(chat_id, field = %field, value = %value, "Lead field collected");
            session.collected_info.insert(field.to_string(), value);
        }
        session.messages.push(ChatMessage::question(&next_question));

        // Resolve the workflow before writing so a missing record leaves the
        // chat untouched.
        let workflow = if finished {
            let workflow = self
                .workflows
                .get_workflow(&session.workflow_id)
                .await?
                .ok_or_else(|| ChatError::workflow_not_found(&session.workflow_id))?;
            Some(workflow)
        } else {
            None
        };

        // The snapshot is only published once the chat row is saved.
        let staged = match (&workflow, &self.exporter) {
            (Some(_), Some(exporter)) => Some(
                exporter
                    .stage(&session.id, &session.collected_info)
                    .await
                    .map_err(|e| ChatError::Persistence(format!("Snapshot export failed: {e}")))?,
            ),
            _ => None,
        };
        let snapshot = match &staged {
            Some(staged) => Some(staged.path().display().to_string()),
            None => session.snapshot.clone(),
        };

        let update = ChatUpdate {
            messages: session.messages,
            collected_info: session.collected_info,
            completed: finished,
            snapshot,
        };
        let saved = match self
            .chats
            .update_chat(&session.id, session.version, &update)
            .await
        {
            Ok(0) => {
                warn!(
                    chat_id,
                    version = session.version,
                    "Chat update modified nothing (deleted or concurrently updated)"
                );
                Err(ChatError::chat_not_found(chat_id))
            }
            Ok(_) => Ok(()),
            Err(e) => Err(ChatError::from(e)),
        };
        if let Err(e) = saved {
            if let Some(staged) = staged {
                staged.discard().await;
            }
            return Err(e);
        }

        if let Some(staged) = staged {
            if let Err(e) = staged.commit().await {
                error!(chat_id, error = %e, "Chat completed but snapshot could not be published");
            }
        }

        match workflow {
            Some(workflow) => {
                info!(
                    chat_id,
                    workflow_id = %workflow.id,
                    fields = update.collected_info.len(),
                    "Workflow chat completed"
                );
                Ok(ContinueOutcome::Completed(workflow))
            }
            None => Ok(ContinueOutcome::Question(ChatTurn {
                chat_id: session.id,
                question: next_question,
            })),
        }
    }

    /// Load a chat session.
    pub async fn get_chat(&self, chat_id: &str) -> Result<ChatSession, ChatError> {
        self.chats
            .get_chat(chat_id)
            .await?
            .ok_or_else(|| ChatError::chat_not_found(chat_id))
    }
}
