//! Persona (character) registry handlers.
//!
//! Every lookup is scoped to the authenticated owner. A persona that exists
//! under another owner and one that does not exist at all produce the same
//! 404, so nothing about other users' registries leaks.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_persona_name, validate_voice_id};
use crate::auth::CurrentUser;
use crate::db::{
    CreatePersonaRequest, DbPool, Persona, PersonaResponse, SetVoiceRequest, UpdatePersonaRequest,
};
use crate::AppState;

async fn fetch_owned(pool: &DbPool, user_id: &str, persona_id: &str) -> Result<Persona, ApiError> {
    let persona: Option<Persona> =
        sqlx::query_as("SELECT * FROM personas WHERE id = ? AND user_id = ?")
            .bind(persona_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    persona.ok_or_else(|| ApiError::not_found("character not found or unauthorized"))
}

/// `GET /personas`
pub async fn list_personas(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<PersonaResponse>>, ApiError> {
    let personas: Vec<Persona> =
        sqlx::query_as("SELECT * FROM personas WHERE user_id = ? ORDER BY created_at ASC")
            .bind(&user.id)
            .fetch_all(&state.db)
            .await?;

    Ok(Json(personas.into_iter().map(PersonaResponse::from).collect()))
}

/// `POST /personas`
pub async fn create_persona(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreatePersonaRequest>,
) -> Result<(StatusCode, Json<PersonaResponse>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_persona_name(&request.name) {
        errors.add("name", e);
    }
    errors.finish()?;

    let persona = Persona {
        id: Uuid::new_v4().to_string(),
        user_id: user.id,
        name: request.name,
        attributes: Some(serde_json::to_string(&request.attributes).unwrap_or_default()),
        voice_id: None,
        created_at: chrono::Utc::now().to_rfc3339(),
    };

    sqlx::query(
        "INSERT INTO personas (id, user_id, name, attributes, voice_id, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&persona.id)
    .bind(&persona.user_id)
    .bind(&persona.name)
    .bind(&persona.attributes)
    .bind(&persona.voice_id)
    .bind(&persona.created_at)
    .execute(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(PersonaResponse::from(persona))))
}

/// `PUT /personas/:id` - partial update; absent fields keep their value.
pub async fn update_persona(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(persona_id): Path<String>,
    Json(request): Json<UpdatePersonaRequest>,
) -> Result<Json<PersonaResponse>, ApiError> {
    let mut persona = fetch_owned(&state.db, &user.id, &persona_id).await?;

    if let Some(name) = request.name {
        validate_persona_name(&name).map_err(|e| ApiError::validation_field("name", e))?;
        persona.name = name;
    }
    if let Some(attributes) = request.attributes {
        persona.attributes = Some(serde_json::to_string(&attributes).unwrap_or_default());
    }
    if let Some(voice_id) = request.voice_id {
        validate_voice_id(&voice_id).map_err(|e| ApiError::validation_field("voice_id", e))?;
        persona.voice_id = Some(voice_id);
    }

    sqlx::query("UPDATE personas SET name = ?, attributes = ?, voice_id = ? WHERE id = ?")
        .bind(&persona.name)
        .bind(&persona.attributes)
        .bind(&persona.voice_id)
        .bind(&persona.id)
        .execute(&state.db)
        .await?;

    Ok(Json(PersonaResponse::from(persona)))
}

/// `POST /personas/:id/voice` - assign a cloned voice to a persona.
pub async fn set_voice(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(persona_id): Path<String>,
    Json(request): Json<SetVoiceRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validate_voice_id(&request.voice_id)
        .map_err(|e| ApiError::validation_field("voice_id", e))?;

    let persona = fetch_owned(&state.db, &user.id, &persona_id).await?;

    sqlx::query("UPDATE personas SET voice_id = ? WHERE id = ?")
        .bind(&request.voice_id)
        .bind(&persona.id)
        .execute(&state.db)
        .await?;

    Ok(Json(serde_json::json!({
        "message": "voice updated",
        "voice_id": request.voice_id,
    })))
}
