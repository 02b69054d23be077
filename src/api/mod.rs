pub mod auth;
mod chat;
pub mod error;
mod personas;
mod speech;
mod validation;

use axum::{
    extract::State,
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Auth routes (public)
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    // Everything else authenticates via the CurrentUser extractor
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth_routes)
        .route("/personas", get(personas::list_personas).post(personas::create_persona))
        .route("/personas/:id", put(personas::update_persona))
        .route("/personas/:id/voice", post(personas::set_voice))
        .route("/chat", post(chat::chat))
        .route("/conversation/:persona_id", get(chat::conversation))
        .route("/tts", post(speech::tts))
        .route("/voices", get(speech::list_voices))
        .route("/voice-samples", post(speech::upload_voice_sample))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "ai_provider": state.provider.name(),
    }))
}
