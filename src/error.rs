//! Error types for the workflow chat service.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of the field extractor. Always local to one continue call.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Reasoning service failed: {0}")]
    Upstream(#[from] LlmError),

    #[error("Reasoning service timed out after {0:?}")]
    Timeout(Duration),

    #[error("Reasoning service returned no {tool} call")]
    MissingToolCall { tool: String },

    #[error("Malformed extraction: {0}")]
    Malformed(String),

    #[error("Cannot extract from an empty transcript")]
    EmptyTranscript,
}

/// Errors surfaced by the chat session manager.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: String },

    #[error("{0}")]
    Validation(String),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Chat {id} is already completed")]
    SessionCompleted { id: String },
}

impl ChatError {
    pub fn chat_not_found(id: &str) -> Self {
        Self::NotFound {
            entity: "Workflow chat".to_string(),
            id: id.to_string(),
        }
    }

    pub fn workflow_not_found(id: &str) -> Self {
        Self::NotFound {
            entity: "Workflow".to_string(),
            id: id.to_string(),
        }
    }
}

impl From<DatabaseError> for ChatError {
    fn from(e: DatabaseError) -> Self {
        Self::Persistence(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_error_maps_to_persistence() {
        let err: ChatError = DatabaseError::Query("disk full".to_string()).into();
        assert!(matches!(err, ChatError::Persistence(ref m) if m.contains("disk full")));
    }

    #[test]
    fn validation_error_displays_hint_verbatim() {
        let err = ChatError::Validation("Please specify an industry.".to_string());
        assert_eq!(err.to_string(), "Please specify an industry.");
    }

    #[test]
    fn not_found_names_the_entity() {
        assert_eq!(
            ChatError::chat_not_found("abc").to_string(),
            "Workflow chat abc not found"
        );
        assert_eq!(
            ChatError::workflow_not_found("wf1").to_string(),
            "Workflow wf1 not found"
        );
    }
}
