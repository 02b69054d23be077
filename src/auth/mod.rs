//! Identity and session handling.
//!
//! Passwords are hashed with Argon2; sessions are stateless HS256 JWTs
//! carrying `{sub, exp, iat}` with a fixed expiry. Validation needs no
//! server-side lookup beyond resolving the subject back to a user row.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::api::error::ApiError;
use crate::config::AuthConfig;
use crate::db::{DbPool, User};
use crate::AppState;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authorization header missing")]
    MissingHeader,
    #[error("Invalid auth header format")]
    MalformedHeader,
    #[error("Invalid or expired token")]
    InvalidOrExpired,
    #[error("User not found")]
    UnknownSubject,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("auth internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id
    pub sub: String,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Internal(format!("password hashing failed: {}", e)))?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Sign a session token for the given user id.
pub fn issue_token(user_id: &str, config: &AuthConfig) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (now + Duration::days(config.token_ttl_days)).timestamp(),
        iat: now.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AuthError::Internal(format!("token signing failed: {}", e)))
}

/// Decode and verify a session token. Zero leeway: an expired token fails
/// the moment it expires.
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::default();
    validation.leeway = 0;
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| AuthError::InvalidOrExpired)
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
/// The scheme comparison is case-insensitive.
pub fn parse_bearer(header: &str) -> Result<&str, AuthError> {
    let parts: Vec<&str> = header.split_whitespace().collect();
    if parts.len() != 2 || !parts[0].eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MalformedHeader);
    }
    Ok(parts[1])
}

/// Look up a user by username or email and verify the password. A missing
/// user and a wrong password are indistinguishable to the caller.
pub async fn authenticate(
    pool: &DbPool,
    identifier: &str,
    password: &str,
) -> Result<User, AuthError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = ? OR email = ?")
        .bind(identifier)
        .bind(identifier)
        .fetch_optional(pool)
        .await
        .map_err(|e| AuthError::Internal(e.to_string()))?;

    match user {
        Some(user) if verify_password(password, &user.password_hash) => Ok(user),
        _ => Err(AuthError::InvalidCredentials),
    }
}

/// Extractor for the authenticated user; gates every protected route.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .ok_or(AuthError::MissingHeader)?;
        let token = parse_bearer(header)?;
        let claims = decode_token(token, &state.config.auth.jwt_secret)?;

        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(&claims.sub)
            .fetch_optional(&state.db)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        Ok(CurrentUser(user.ok_or(AuthError::UnknownSubject)?))
    }
}
