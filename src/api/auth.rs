//! Registration and login handlers.

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use uuid::Uuid;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_email, validate_password, validate_username};
use crate::auth;
use crate::db::{AuthResponse, LoginRequest, RegisterRequest, User, UserResponse};
use crate::AppState;

/// `POST /auth/register` - create an identity and log it in.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_username(&request.username) {
        errors.add("username", e);
    }
    if let Err(e) = validate_email(&request.email) {
        errors.add("email", e);
    }
    if let Err(e) = validate_password(&request.password) {
        errors.add("password", e);
    }
    errors.finish()?;

    // Duplicates are a 400 here, not a 409; a race lost between this check
    // and the insert maps to the same response via the UNIQUE violation.
    let existing: Option<(String,)> =
        sqlx::query_as("SELECT id FROM users WHERE username = ? OR email = ?")
            .bind(&request.username)
            .bind(&request.email)
            .fetch_optional(&state.db)
            .await?;
    if existing.is_some() {
        return Err(ApiError::bad_request("username or email already exists"));
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        username: request.username,
        email: request.email,
        password_hash: auth::hash_password(&request.password)?,
        created_at: chrono::Utc::now().to_rfc3339(),
    };

    sqlx::query(
        "INSERT INTO users (id, username, email, password_hash, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&user.id)
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.created_at)
    .execute(&state.db)
    .await?;

    tracing::info!(username = %user.username, "Registered new user");

    let token = auth::issue_token(&user.id, &state.config.auth)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: UserResponse::from(user),
        }),
    ))
}

/// `POST /auth/login` - the `username` field accepts username or email.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    if request.username.is_empty() || request.password.is_empty() {
        return Err(ApiError::bad_request("username and password are required"));
    }

    let user = auth::authenticate(&state.db, &request.username, &request.password).await?;
    let token = auth::issue_token(&user.id, &state.config.auth)?;

    Ok(Json(AuthResponse {
        token,
        user: UserResponse::from(user),
    }))
}
