//! Chat turn and conversation history handlers. Thin wrappers over the
//! conversation engine; all policy lives there.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::error::ApiError;
use crate::auth::CurrentUser;
use crate::chatlog::History;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub persona_id: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub user_message_id: String,
    pub reply_message_id: String,
}

/// `POST /chat` - run one turn against the configured AI provider.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let outcome = state
        .engine
        .run_turn(&user, request.persona_id.as_deref(), &request.message)
        .await?;

    Ok(Json(ChatResponse {
        reply: outcome.reply,
        user_message_id: outcome.user_message_id,
        reply_message_id: outcome.reply_message_id,
    }))
}

const DEFAULT_LIMIT: i64 = 50;

/// Non-numeric or missing pagination values fall back to the defaults
/// rather than rejecting the request.
fn pagination(params: &HashMap<String, String>) -> (i64, i64) {
    let limit = params
        .get("limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_LIMIT)
        .max(0);
    let skip = params
        .get("skip")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
        .max(0);
    (limit, skip)
}

/// `GET /conversation/:persona_id?limit=&skip=` - ascending message history
/// for one owned persona. A 200 with a warning body when the log store is
/// down.
pub async fn conversation(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(persona_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.engine.resolve_persona(&user.id, &persona_id).await?;

    let (limit, skip) = pagination(&params);
    match state.chatlog.history(&user.id, Some(&persona_id), limit, skip).await {
        History::Messages(messages) => Ok(Json(serde_json::json!(messages))),
        History::Unavailable => Ok(Json(serde_json::json!({
            "warning": "chat history store not available, no history stored"
        }))),
    }
}
