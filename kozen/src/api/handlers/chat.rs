//! Chat proxy and health check handlers.

use axum::{Json, extract::State};
use chrono::Utc;
use serde_json::Value;

use crate::{
    AppState,
    api::models::chat::{ChatResponse, HealthResponse},
    auth::current_user::CurrentUser,
    errors::Result,
    limits::ClientAddr,
    validation,
};

/// `POST /api/chat` - forward one sanitized message to the upstream
/// generative-language API and relay the sanitized reply.
///
/// The caller must hold a live session and pass the per-address rate limit
/// before the message is even validated; nothing is sent upstream unless all
/// three gates pass.
#[tracing::instrument(skip_all, fields(user = %user.username))]
pub async fn chat(
    State(state): State<AppState>,
    user: CurrentUser,
    ClientAddr(client): ClientAddr,
    Json(body): Json<Value>,
) -> Result<Json<ChatResponse>> {
    state.limiters.chat.check(&client)?;

    let message = validation::validate_chat_message(&body)?;

    let response = state.upstream.generate_reply(&message).await?;

    tracing::info!("Chat request processed for user: {}", user.username);

    Ok(Json(ChatResponse {
        response,
        timestamp: Utc::now(),
    }))
}

/// `GET /api/health`
#[tracing::instrument(skip_all)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        environment: state.config.environment.to_string(),
    })
}
