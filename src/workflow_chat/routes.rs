//! REST endpoints for workflow chats.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::{ChatError, ExtractionError};

use super::manager::WorkflowChatManager;

/// Shared state for workflow chat routes.
#[derive(Clone)]
pub struct WorkflowChatRouteState {
    pub manager: Arc<WorkflowChatManager>,
    /// When set, every chat request must present this token.
    pub api_token: Option<SecretString>,
}

/// Body of `POST /workflowchat/continuechat`.
#[derive(Debug, Deserialize)]
pub struct ContinueChatRequest {
    #[serde(rename = "chatId")]
    pub chat_id: String,
    pub user_response: String,
}

/// Caller identity established by token verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPrincipal {
    /// No token is configured; requests are not verified.
    Anonymous,
    /// The request carried the configured token.
    Token,
}

impl FromRequestParts<WorkflowChatRouteState> for SessionPrincipal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &WorkflowChatRouteState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = &state.api_token else {
            return Ok(SessionPrincipal::Anonymous);
        };

        let presented = extract_token(parts)?;
        if !token_matches(expected.expose_secret(), presented) {
            tracing::warn!(path = %parts.uri.path(), "Rejected request with invalid token");
            return Err(AppError::Unauthorized("Invalid API token".to_string()));
        }
        Ok(SessionPrincipal::Token)
    }
}

/// Compare SHA-256 digests of both tokens in constant time.
fn token_matches(expected: &str, presented: &str) -> bool {
    let expected = Sha256::digest(expected.as_bytes());
    let presented = Sha256::digest(presented.as_bytes());
    constant_time_eq(&expected, &presented)
}

/// Byte comparison whose duration does not depend on where the inputs differ.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Read the token from `Authorization: Bearer` or `X-API-Key`.
fn extract_token(parts: &Parts) -> Result<&str, AppError> {
    if let Some(auth) = parts.headers.get(header::AUTHORIZATION) {
        let auth = auth.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid Authorization header encoding".to_string())
        })?;
        if let Some(token) = auth.strip_prefix("Bearer ") {
            return Ok(token.trim());
        }
    }

    if let Some(key) = parts.headers.get("x-api-key") {
        let key = key
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid X-API-Key header encoding".to_string()))?;
        return Ok(key.trim());
    }

    Err(AppError::Unauthorized(
        "Missing API token. Send 'Authorization: Bearer <token>' or 'X-API-Key: <token>'."
            .to_string(),
    ))
}

/// Error response for the chat routes.
#[derive(Debug)]
pub enum AppError {
    Chat(ChatError),
    /// A rejected answer together with the question that is still open.
    Rejected {
        message: String,
        question: Option<String>,
    },
    Unauthorized(String),
    /// The request body could not be read as the expected JSON.
    InvalidBody(JsonRejection),
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        AppError::Chat(e)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidBody(rejection)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, question) = match self {
            AppError::Rejected { message, question } => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message, question)
            }
            AppError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message, None)
            }
            AppError::InvalidBody(rejection) => (
                rejection.status(),
                "VALIDATION_ERROR",
                rejection.body_text(),
                None,
            ),
            AppError::Chat(e) => {
                let (status, code) = match &e {
                    ChatError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                    ChatError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                    ChatError::Extraction(ExtractionError::Timeout(_)) => {
                        (StatusCode::GATEWAY_TIMEOUT, "EXTRACTION_TIMEOUT")
                    }
                    ChatError::Extraction(_) => (StatusCode::BAD_GATEWAY, "EXTRACTION_ERROR"),
                    ChatError::Persistence(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_ERROR")
                    }
                    ChatError::SessionCompleted { .. } => (StatusCode::CONFLICT, "CHAT_COMPLETED"),
                };
                if status.is_server_error() {
                    tracing::error!(error = %e, "Workflow chat request failed");
                }
                (status, code, e.to_string(), None)
            }
        };

        let mut body = json!({
            "error": {
                "code": code,
                "message": message,
            }
        });
        if let Some(question) = question {
            body["question"] = json!(question);
        }

        (status, Json(body)).into_response()
    }
}

/// POST /workflowchat/trigger/{workflowId}
///
/// Starts a chat and returns 201 with its id and first question.
async fn trigger_chat(
    State(state): State<WorkflowChatRouteState>,
    _principal: SessionPrincipal,
    Path(workflow_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let turn = state.manager.trigger(&workflow_id).await?;
    Ok((StatusCode::CREATED, Json(turn)))
}

/// POST /workflowchat/continuechat
///
/// Answers the outstanding question. Returns the next question, or the
/// workflow record once the user is done. A rejected answer comes back as
/// 400 carrying the hint and the question that is still open.
async fn continue_chat(
    State(state): State<WorkflowChatRouteState>,
    _principal: SessionPrincipal,
    body: Result<Json<ContinueChatRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = body?;
    match state
        .manager
        .continue_chat(&request.chat_id, &request.user_response)
        .await
    {
        Ok(outcome) => Ok(Json(outcome)),
        Err(ChatError::Validation(message)) => {
            let question = state
                .manager
                .get_chat(&request.chat_id)
                .await
                .ok()
                .and_then(|chat| chat.outstanding_question().map(str::to_string));
            Err(AppError::Rejected { message, question })
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /workflowchat/{chatId}
async fn get_chat(
    State(state): State<WorkflowChatRouteState>,
    _principal: SessionPrincipal,
    Path(chat_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let chat = state.manager.get_chat(&chat_id).await?;
    Ok(Json(chat))
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Build the workflow chat REST routes with CORS and request tracing.
pub fn workflow_chat_routes(state: WorkflowChatRouteState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/workflowchat/trigger/{workflow_id}", post(trigger_chat))
        .route("/workflowchat/continuechat", post(continue_chat))
        .route("/workflowchat/{chat_id}", get(get_chat))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_matching() {
        assert!(token_matches("s3cret", "s3cret"));
        assert!(!token_matches("s3cret", "s3creT"));
        assert!(!token_matches("s3cret", "s3cret-and-more"));
        assert!(!token_matches("s3cret", ""));
    }

    #[test]
    fn constant_time_eq_rejects_length_mismatch() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
