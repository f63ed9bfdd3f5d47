//! Fixed prompts and the extraction tool schema.

use crate::llm::ToolDefinition;

use super::taxonomy;

/// First question of every chat.
pub const INITIAL_QUESTION: &str = "Hello! I'm excited to help you generate leads using \
LinkedIn Sales Navigator. To get started, could you tell me what industry or sector you're \
targeting for your lead generation? For example, are you looking for leads in Technology, \
Finance, Healthcare, or another field?";

/// Name of the tool the model must call.
pub const EXTRACTION_TOOL: &str = "update_lead_info";

/// System instruction for the extractor.
pub fn extraction_system_prompt() -> String {
    format!(
        "\
You are a lead-generation assistant helping a user configure a LinkedIn Sales Navigator search.
You ask one question at a time and record each answer as a structured parameter.

After every user reply, call `{EXTRACTION_TOOL}` exactly once:
- `parameter`: the parameter the latest answer refers to, spelled exactly as in the list below.
- `value`: the answer mapped onto ONE allowed value for that parameter. Normalize loose answers \
(e.g. \"close to 500 employees\" becomes \"201-500 employees\", \"software companies\" becomes \
\"Technology\").
- `valid`: false when the answer cannot be mapped to an allowed value or is off-topic.
- `message`: when invalid, a short hint telling the user what kind of answer is expected, \
mentioning a few allowed values. Empty otherwise.
- `next_question`: the next question to ask. Cover parameters not yet collected; acknowledge \
the previous answer briefly. When invalid, restate the current question.
- `finished`: true when the user says they are done or every parameter has been collected. \
`parameter` and `value` may then be empty if the last reply carried no new information, and \
`next_question` should be a short closing line.

Allowed values per parameter:
{}",
        taxonomy::describe()
    )
}

/// Tool definition whose arguments are the extraction result.
pub fn extraction_tool() -> ToolDefinition {
    ToolDefinition {
        name: EXTRACTION_TOOL.to_string(),
        description: "Update or add lead generation parameters based on user input.".to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "parameter": {"type": "string", "description": "The parameter to update or add"},
                "value": {"type": "string", "description": "The mapped value for the parameter"},
                "valid": {"type": "boolean", "description": "Whether the input is valid"},
                "message": {"type": "string", "description": "Message to display to the user"},
                "next_question": {"type": "string", "description": "Next question to ask the user"},
                "finished": {"type": "boolean", "description": "Whether the user wants to stop"}
            },
            "required": ["parameter", "value", "valid", "message", "next_question", "finished"]
        }),
    }
}
