//! Speech endpoints: TTS rendering, voice listing, voice-sample upload.
//!
//! TTS never returns an error status for synthesis problems; the response
//! degrades to a `{text, note}` shape the client renders locally.

use axum::{
    extract::{Multipart, State},
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::error::ApiError;
use crate::auth::CurrentUser;
use crate::chatlog::Appended;
use crate::db::Persona;
use crate::speech::Synthesis;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TtsRequest {
    #[serde(default)]
    pub text: String,
    pub persona_id: Option<String>,
}

/// `POST /tts` - render text with the persona's cloned voice when possible.
///
/// Real synthesis needs a configured provider key and a caller-owned persona
/// with a voice id; anything short of that, including an upstream failure,
/// falls back to the client-side shape. An unowned persona silently falls
/// back too; synthesis is best-effort, not an ownership oracle.
pub async fn tts(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<TtsRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if request.text.is_empty() {
        return Err(ApiError::validation_field("text", "text is required"));
    }

    if let Some(persona_id) = &request.persona_id {
        if state.speech.is_configured() {
            let persona: Option<Persona> =
                sqlx::query_as("SELECT * FROM personas WHERE id = ? AND user_id = ?")
                    .bind(persona_id)
                    .bind(&user.id)
                    .fetch_optional(&state.db)
                    .await?;

            if let Some(voice_id) = persona.and_then(|p| p.voice_id) {
                if let Synthesis::Audio { bytes, format } =
                    state.speech.synthesize(&request.text, &voice_id).await
                {
                    return Ok(Json(json!({
                        "ok": true,
                        "audio": BASE64.encode(bytes),
                        "format": format,
                        "voice_id": voice_id,
                    })));
                }
            }
        }
    }

    Ok(Json(json!({
        "ok": true,
        "text": request.text,
        "note": "TTS generation is handled by the client",
    })))
}

/// `GET /voices` - proxy the synthesis provider's voice list.
pub async fn list_voices(
    State(state): State<Arc<AppState>>,
    CurrentUser(_user): CurrentUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.speech.is_configured() {
        return Err(ApiError::bad_request("speech provider key not configured"));
    }

    let voices = state
        .speech
        .list_voices()
        .await
        .map_err(|e| ApiError::external(format!("failed to fetch voices: {}", e)))?;
    Ok(Json(voices))
}

/// `POST /voice-samples` - multipart upload of a raw audio sample. The file
/// lands under `<data_dir>/uploads/<user_id>/`; only metadata goes to the
/// log store, and a down store yields a sentinel id rather than an error.
pub async fn upload_voice_sample(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = sanitize_filename(field.file_name().unwrap_or("sample"));
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("failed to read upload: {}", e)))?;

        let upload_dir = state.config.server.data_dir.join("uploads").join(&user.id);
        tokio::fs::create_dir_all(&upload_dir)
            .await
            .map_err(|e| ApiError::internal(format!("failed to create upload dir: {}", e)))?;
        let path = upload_dir.join(&filename);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| ApiError::internal(format!("failed to store upload: {}", e)))?;

        let recorded = state
            .chatlog
            .record_sample(&user.id, &filename, &path.to_string_lossy())
            .await;

        return Ok(Json(match recorded {
            Appended::Stored(sample_id) => json!({ "ok": true, "sample_id": sample_id }),
            Appended::Skipped => json!({
                "ok": true,
                "sample_id": "N/A",
                "note": "sample stored, metadata store not available",
            }),
        }));
    }

    Err(ApiError::bad_request("no file uploaded"))
}

/// Strip path components and shell-hostile characters from a client-supplied
/// filename.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "sample".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename_strips_paths() {
        assert_eq!(sanitize_filename("voice.wav"), "voice.wav");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\tmp\\voice.wav"), "voice.wav");
    }

    #[test]
    fn test_sanitize_filename_fallback() {
        assert_eq!(sanitize_filename(""), "sample");
        assert_eq!(sanitize_filename(".."), "sample");
        assert_eq!(sanitize_filename("$(rm -rf)"), "rm-rf");
    }
}
