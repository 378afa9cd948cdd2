//! HTTP request handlers

use super::types::{ChatRequest, ChatResponse, ErrorResponse, SuggestedAction, UsageInfo};
use super::AppState;
use crate::llm::{LlmMessage, LlmRequest};
use crate::system_prompt::{pinned_context_prompt, stub_reply, BASE_PROMPT, EMPTY_COMPLETION_REPLY};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

const REPLY_TEMPERATURE: f32 = 0.3;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(send_chat))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Chat
// ============================================================

async fn send_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(req) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected chat request body");
        AppError::BadRequest("Invalid message".to_string())
    })?;

    if req.message.trim().is_empty() {
        return Err(AppError::BadRequest("Invalid message".to_string()));
    }

    let (assistant_message, usage) = match &state.llm {
        None => (stub_reply(&req.message, &req.pinned_context), None),
        Some(llm) => {
            let mut system = vec![BASE_PROMPT.to_string()];
            system.extend(pinned_context_prompt(&req.pinned_context));

            let request = LlmRequest {
                system,
                messages: vec![LlmMessage::user(req.message.clone())],
                temperature: Some(REPLY_TEMPERATURE),
                max_tokens: None,
            };

            let response = llm.complete(&request).await.map_err(|e| {
                tracing::error!(error = %e, "Chat completion failed");
                AppError::Internal("Internal Server Error".to_string())
            })?;

            let text = if response.text.is_empty() {
                EMPTY_COMPLETION_REPLY.to_string()
            } else {
                response.text
            };
            let usage = UsageInfo {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            };
            (text, Some(usage))
        }
    };

    Ok(Json(ChatResponse {
        session_id: Uuid::new_v4().to_string(),
        message_id: Uuid::new_v4().to_string(),
        assistant_message,
        usage,
        suggested_actions: SuggestedAction::ALL.to_vec(),
    }))
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("teammate ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
