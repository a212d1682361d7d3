//! HTTP handlers
//!
//! Thin translation layer: request validation, then delegate to the chat
//! pipeline, then map domain errors onto the HTTP contract. Internal detail
//! never leaks into a response body; it is logged here instead.

use crate::chat::types::{ChatRequest, ChatResponse};
use crate::error::Error;
use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;

const MISSING_MESSAGES: &str = r#"Invalid format. "messages" array is required."#;

const RATE_LIMIT_REPLY: &str =
    "Calma! Aguarde alguns segundos antes de enviar outra mensagem.";

const INTERNAL_REPLY: &str =
    "Desculpe, ocorreu um erro ao processar sua mensagem. Tente novamente.";

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    RateLimited(u64),
    Internal(Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            AppError::RateLimited(_) => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "reply": RATE_LIMIT_REPLY, "success": false })),
            )
                .into_response(),
            AppError::Internal(e) => {
                error!(error = %e, "chat request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "reply": INTERNAL_REPLY, "success": false })),
                )
                    .into_response()
            }
        }
    }
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        match e {
            Error::RateLimited(secs) => AppError::RateLimited(secs),
            Error::Validation(msg) => AppError::BadRequest(msg),
            other => AppError::Internal(other),
        }
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /api/chat`
///
/// The body is taken as loose JSON so shape errors answer with the
/// documented 400 payload rather than the framework's 422.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<ChatResponse>, AppError> {
    if !body.get("messages").map_or(false, Value::is_array) {
        return Err(AppError::BadRequest(MISSING_MESSAGES.into()));
    }
    let request: ChatRequest =
        serde_json::from_value(body).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let response = state.pipeline.handle(request).await?;
    Ok(Json(response))
}
