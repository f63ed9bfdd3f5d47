//! Integration tests for the workflow chat REST surface.
//!
//! Each test spins up an Axum server on a random port backed by an
//! in-memory database and a scripted LLM, then drives it over HTTP.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use workflow_chat::error::LlmError;
use workflow_chat::llm::{
    FinishReason, LlmProvider, ToolCall, ToolCompletionRequest, ToolCompletionResponse,
};
use workflow_chat::store::{LibSqlBackend, WorkflowStore};
use workflow_chat::workflow_chat::prompts::{EXTRACTION_TOOL, INITIAL_QUESTION};
use workflow_chat::workflow_chat::{
    LlmFieldExtractor, WorkflowChatManager, WorkflowChatRouteState, workflow_chat_routes,
};

/// Stub LLM that answers every request with the next scripted tool call.
#[derive(Default)]
struct ScriptedLlm {
    calls: Mutex<VecDeque<Value>>,
}

impl ScriptedLlm {
    fn push(
        &self,
        parameter: &str,
        value: &str,
        valid: bool,
        message: &str,
        next: &str,
        finished: bool,
    ) {
        self.calls.lock().unwrap().push_back(json!({
            "parameter": parameter,
            "value": value,
            "valid": valid,
            "message": message,
            "next_question": next,
            "finished": finished,
        }));
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete_with_tools(
        &self,
        _request: ToolCompletionRequest,
    ) -> Result<ToolCompletionResponse, LlmError> {
        let arguments = self
            .calls
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted tool call left");
        Ok(ToolCompletionResponse {
            content: None,
            tool_calls: vec![ToolCall {
                id: "call_1".to_string(),
                name: EXTRACTION_TOOL.to_string(),
                arguments,
            }],
            input_tokens: 0,
            output_tokens: 0,
            finish_reason: FinishReason::ToolUse,
        })
    }
}

struct TestServer {
    base: String,
    db: Arc<LibSqlBackend>,
    llm: Arc<ScriptedLlm>,
    client: reqwest::Client,
}

/// Start an Axum server on a random port.
async fn start_server(api_token: Option<&str>) -> TestServer {
    let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let llm = Arc::new(ScriptedLlm::default());
    let extractor = Arc::new(LlmFieldExtractor::new(llm.clone()));
    let manager = WorkflowChatManager::new(db.clone(), db.clone(), extractor);
    let app = workflow_chat_routes(WorkflowChatRouteState {
        manager: Arc::new(manager),
        api_token: api_token.map(|t| SecretString::from(t.to_string())),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer {
        base: format!("http://127.0.0.1:{port}"),
        db,
        llm,
        client: reqwest::Client::new(),
    }
}

impl TestServer {
    async fn trigger(&self, workflow_id: &str) -> (reqwest::StatusCode, Value) {
        let resp = self
            .client
            .post(format!("{}/workflowchat/trigger/{workflow_id}", self.base))
            .send()
            .await
            .unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }

    async fn answer(&self, chat_id: &str, text: &str) -> (reqwest::StatusCode, Value) {
        let resp = self
            .client
            .post(format!("{}/workflowchat/continuechat", self.base))
            .json(&json!({"chatId": chat_id, "user_response": text}))
            .send()
            .await
            .unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }

    async fn chat(&self, chat_id: &str) -> Value {
        self.client
            .get(format!("{}/workflowchat/{chat_id}", self.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn health_check() {
    let server = start_server(None).await;
    let resp = server
        .client
        .get(format!("{}/health", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn full_conversation_returns_workflow() {
    let server = start_server(None).await;
    let workflow = server
        .db
        .insert_workflow("Q3 outreach", &json!({"owner": "sales"}))
        .await
        .unwrap();

    let (status, body) = server.trigger(&workflow.id).await;
    assert_eq!(status, 201);
    assert_eq!(body["question"], INITIAL_QUESTION);
    let chat_id = body["workFlowChatId"].as_str().unwrap().to_string();

    server.llm.push("Industry", "technology", true, "", "Which location?", false);
    let (status, body) = server.answer(&chat_id, "software companies").await;
    assert_eq!(status, 200);
    assert_eq!(body["workFlowChatId"], chat_id.as_str());
    assert_eq!(body["question"], "Which location?");

    server.llm.push("Location", "Europe", true, "", "Thanks!", true);
    let (status, body) = server.answer(&chat_id, "Europe, and that's all").await;
    assert_eq!(status, 200);
    assert_eq!(body["id"], workflow.id.as_str());
    assert_eq!(body["name"], "Q3 outreach");
    assert_eq!(body["data"]["owner"], "sales");

    let chat = server.chat(&chat_id).await;
    assert_eq!(chat["completed"], true);
    assert_eq!(chat["collected_info"]["Industry"], "Technology");
    assert_eq!(chat["collected_info"]["Location"], "Europe");
    assert_eq!(chat["messages"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn rejected_answer_returns_hint_and_open_question() {
    let server = start_server(None).await;
    let (_, body) = server.trigger("wf1").await;
    let chat_id = body["workFlowChatId"].as_str().unwrap().to_string();

    server.llm.push(
        "",
        "",
        false,
        "Please specify an industry such as Technology or Finance.",
        "",
        false,
    );
    let (status, body) = server.answer(&chat_id, "blue").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(
        body["error"]["message"],
        "Please specify an industry such as Technology or Finance."
    );
    assert_eq!(body["question"], INITIAL_QUESTION);

    let chat = server.chat(&chat_id).await;
    assert_eq!(chat["messages"].as_array().unwrap().len(), 1);
    assert!(chat["messages"][0].get("response").is_none());
}

#[tokio::test]
async fn out_of_taxonomy_value_is_rejected() {
    let server = start_server(None).await;
    let (_, body) = server.trigger("wf1").await;
    let chat_id = body["workFlowChatId"].as_str().unwrap().to_string();

    server.llm.push("CompanySize", "a few", true, "", "Next?", false);
    let (status, body) = server.answer(&chat_id, "a few people").await;
    assert_eq!(status, 400);
    assert!(
        body["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("Please specify a CompanySize such as")
    );
}

#[tokio::test]
async fn malformed_continue_body_gets_json_error() {
    let server = start_server(None).await;
    let resp = server
        .client
        .post(format!("{}/workflowchat/continuechat", server.base))
        .json(&json!({"chatId": "x"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);
    let content_type = resp.headers()[reqwest::header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("application/json"));

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(
        body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("user_response")
    );

    let resp = server
        .client
        .post(format!("{}/workflowchat/continuechat", server.base))
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 415);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn unknown_chat_is_404() {
    let server = start_server(None).await;
    let (status, body) = server.answer("does-not-exist", "hello").await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn answering_completed_chat_is_409() {
    let server = start_server(None).await;
    let workflow = server.db.insert_workflow("wf", &json!({})).await.unwrap();
    let (_, body) = server.trigger(&workflow.id).await;
    let chat_id = body["workFlowChatId"].as_str().unwrap().to_string();

    server.llm.push("", "", true, "", "Done.", true);
    let (status, _) = server.answer(&chat_id, "nothing else").await;
    assert_eq!(status, 200);

    let (status, body) = server.answer(&chat_id, "wait").await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["code"], "CHAT_COMPLETED");
}

#[tokio::test]
async fn finishing_against_missing_workflow_is_404() {
    let server = start_server(None).await;
    let (_, body) = server.trigger("ghost").await;
    let chat_id = body["workFlowChatId"].as_str().unwrap().to_string();

    server.llm.push("", "", true, "", "Done.", true);
    let (status, body) = server.answer(&chat_id, "that's it").await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["message"], "Workflow ghost not found");

    let chat = server.chat(&chat_id).await;
    assert_eq!(chat["completed"], false);
}

#[tokio::test]
async fn token_is_required_when_configured() {
    let server = start_server(Some("s3cret")).await;
    let url = format!("{}/workflowchat/trigger/wf1", server.base);

    let resp = server.client.post(&url).send().await.unwrap();
    assert_eq!(resp.status(), 401);

    let resp = server
        .client
        .post(&url)
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = server
        .client
        .post(&url)
        .bearer_auth("s3cret")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let resp = server
        .client
        .post(&url)
        .header("X-API-Key", "s3cret")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    // Health stays open.
    let resp = server
        .client
        .get(format!("{}/health", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}
