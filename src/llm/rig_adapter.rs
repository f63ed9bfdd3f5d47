//! Bridges rig-core's `CompletionModel` to our `LlmProvider` trait.
//!
//! System messages become the rig preamble, the last conversational
//! message becomes the prompt and everything before it is chat history.

use async_trait::async_trait;
use rig::completion::{CompletionError, CompletionModel, ToolDefinition as RigToolDefinition};
use rig::message::{AssistantContent, Message, ToolChoice};
use tracing::debug;

use crate::error::LlmError;

use super::provider::{
    ChatMessage, FinishReason, LlmProvider, Role, ToolCall, ToolCompletionRequest,
    ToolCompletionResponse,
};

/// Wraps a rig completion model.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }

    fn request_failed(&self, reason: impl Into<String>) -> LlmError {
        LlmError::RequestFailed {
            provider: self.model_name.clone(),
            reason: reason.into(),
        }
    }

    fn map_error(&self, error: CompletionError) -> LlmError {
        match error {
            CompletionError::JsonError(e) => LlmError::Json(e),
            CompletionError::ResponseError(reason) => LlmError::InvalidResponse {
                provider: self.model_name.clone(),
                reason,
            },
            other => self.request_failed(other.to_string()),
        }
    }
}

/// Split the non-system messages into (history, prompt).
fn split_conversation(messages: &[ChatMessage]) -> Option<(Vec<Message>, Message)> {
    let mut turns: Vec<Message> = messages
        .iter()
        .filter_map(|m| match m.role {
            Role::System => None,
            Role::User => Some(Message::user(m.content.clone())),
            Role::Assistant => Some(Message::assistant(m.content.clone())),
        })
        .collect();
    let prompt = turns.pop()?;
    Some((turns, prompt))
}

/// Collect text and tool calls from a rig response.
fn into_response(
    choice: impl IntoIterator<Item = AssistantContent>,
    input_tokens: u64,
    output_tokens: u64,
) -> ToolCompletionResponse {
    let mut text = Vec::new();
    let mut tool_calls = Vec::new();
    for content in choice {
        match content {
            AssistantContent::Text(t) => text.push(t.text),
            AssistantContent::ToolCall(call) => tool_calls.push(ToolCall {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            }),
            _ => {}
        }
    }

    let finish_reason = if tool_calls.is_empty() {
        FinishReason::Stop
    } else {
        FinishReason::ToolUse
    };

    ToolCompletionResponse {
        content: (!text.is_empty()).then(|| text.join("\n")),
        tool_calls,
        input_tokens: u32::try_from(input_tokens).unwrap_or(u32::MAX),
        output_tokens: u32::try_from(output_tokens).unwrap_or(u32::MAX),
        finish_reason,
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete_with_tools(
        &self,
        request: ToolCompletionRequest,
    ) -> Result<ToolCompletionResponse, LlmError> {
        let (history, prompt) = split_conversation(&request.messages)
            .ok_or_else(|| self.request_failed("request has no user or assistant messages"))?;

        let tools: Vec<RigToolDefinition> = request
            .tools
            .iter()
            .map(|t| RigToolDefinition {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            })
            .collect();

        let mut builder = self
            .model
            .completion_request(prompt)
            .messages(history)
            .tools(tools);
        if let Some(preamble) = request.system_prompt() {
            builder = builder.preamble(preamble);
        }
        if let Some(name) = &request.tool_choice {
            builder = builder.tool_choice(ToolChoice::Specific {
                function_names: vec![name.clone()],
            });
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }

        let response = self
            .model
            .completion(builder.build())
            .await
            .map_err(|e| self.map_error(e))?;

        debug!(
            model = %self.model_name,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Completion received"
        );

        Ok(into_response(
            response.choice,
            response.usage.input_tokens,
            response.usage.output_tokens,
        ))
    }
}
