//! Field extraction: turn the running transcript into one structured decision.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ExtractionError;
use crate::llm::{ChatMessage, LlmProvider, ToolCompletionRequest};

use super::prompts::{EXTRACTION_TOOL, extraction_system_prompt, extraction_tool};
use super::taxonomy::LeadField;

/// Raw arguments of the `update_lead_info` tool call. Every field is required.
#[derive(Debug, Clone, Deserialize)]
pub struct LeadInfoUpdate {
    pub parameter: String,
    pub value: String,
    pub valid: bool,
    pub message: String,
    pub next_question: String,
    pub finished: bool,
}

/// A single field to merge into `collected_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldUpdate {
    pub field: LeadField,
    /// Canonical value from the taxonomy.
    pub value: String,
}

/// Outcome of one extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionResult {
    /// The answer was rejected; `message` tells the user what is expected.
    Invalid { message: String },
    /// The answer was accepted.
    Valid {
        /// `None` when the user finished without supplying a new value.
        update: Option<FieldUpdate>,
        next_question: String,
        finished: bool,
    },
}

impl ExtractionResult {
    /// Validate a raw payload against the taxonomy.
    ///
    /// A value outside the allowed set downgrades the payload to `Invalid`.
    /// An unknown parameter on an unfinished turn is a malformed response.
    pub fn from_payload(payload: LeadInfoUpdate) -> Result<Self, ExtractionError> {
        if !payload.valid {
            let message = if payload.message.trim().is_empty() {
                payload.next_question
            } else {
                payload.message
            };
            return Ok(Self::Invalid { message });
        }

        if !payload.finished && payload.next_question.trim().is_empty() {
            return Err(ExtractionError::Malformed(
                "next_question is empty on an unfinished turn".to_string(),
            ));
        }

        let parameter = payload.parameter.trim();
        let update = if parameter.is_empty() && payload.value.trim().is_empty() {
            if !payload.finished {
                return Err(ExtractionError::Malformed(
                    "valid answer without a parameter".to_string(),
                ));
            }
            None
        } else {
            match parameter.parse::<LeadField>() {
                Ok(field) => match field.normalize(&payload.value) {
                    Some(value) => Some(FieldUpdate {
                        field,
                        value: value.to_string(),
                    }),
                    None if payload.finished => {
                        warn!(
                            field = %field,
                            value = %payload.value,
                            "Dropping unmapped value on final turn"
                        );
                        None
                    }
                    None => {
                        return Ok(Self::Invalid {
                            message: rejection_hint(field),
                        });
                    }
                },
                Err(e) if payload.finished => {
                    warn!(error = %e, "Dropping unknown parameter on final turn");
                    None
                }
                Err(e) => return Err(ExtractionError::Malformed(e)),
            }
        };

        Ok(Self::Valid {
            update,
            next_question: payload.next_question,
            finished: payload.finished,
        })
    }
}

fn rejection_hint(field: LeadField) -> String {
    let examples: Vec<&str> = field.allowed_values().iter().take(3).copied().collect();
    format!(
        "Please specify a {} such as {}.",
        field,
        examples.join(", ")
    )
}

/// Produces an [`ExtractionResult`] from a transcript.
///
/// Implementations need not be deterministic, but must always return a
/// fully-populated result or an error.
#[async_trait]
pub trait FieldExtractor: Send + Sync {
    async fn extract(
        &self,
        transcript: &[ChatMessage],
    ) -> Result<ExtractionResult, ExtractionError>;
}

/// Extractor backed by a tool-constrained LLM call.
pub struct LlmFieldExtractor {
    llm: Arc<dyn LlmProvider>,
    system_prompt: String,
}

impl LlmFieldExtractor {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            system_prompt: extraction_system_prompt(),
        }
    }
}

#[async_trait]
impl FieldExtractor for LlmFieldExtractor {
    async fn extract(
        &self,
        transcript: &[ChatMessage],
    ) -> Result<ExtractionResult, ExtractionError> {
        if transcript.is_empty() {
            return Err(ExtractionError::EmptyTranscript);
        }

        let mut messages = Vec::with_capacity(transcript.len() + 1);
        messages.push(ChatMessage::system(&self.system_prompt));
        messages.extend_from_slice(transcript);

        let request = ToolCompletionRequest::new(messages, vec![extraction_tool()])
            .with_tool_choice(EXTRACTION_TOOL)
            .with_max_tokens(512)
            .with_temperature(0.0);

        let response = self.llm.complete_with_tools(request).await?;
        debug!(
            model = self.llm.model_name(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Extraction call finished"
        );

        let call = response
            .tool_calls
            .into_iter()
            .find(|c| c.name == EXTRACTION_TOOL)
            .ok_or_else(|| ExtractionError::MissingToolCall {
                tool: EXTRACTION_TOOL.to_string(),
            })?;

        let payload: LeadInfoUpdate = serde_json::from_value(call.arguments)
            .map_err(|e| ExtractionError::Malformed(format!("{EXTRACTION_TOOL} arguments: {e}")))?;

        ExtractionResult::from_payload(payload)
    }
}
