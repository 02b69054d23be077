//! Input validation for API requests.
//!
//! Validators return `Result<(), String>` so handlers can collect several
//! failures into one response with the `ValidationErrorBuilder` from the
//! `error` module.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for validating usernames (word characters plus dots and dashes)
    static ref USERNAME_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9_][a-zA-Z0-9_.-]*$"
    ).unwrap();

    /// Regex for validating email addresses (pragmatic, not RFC-complete)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9][-a-zA-Z0-9]*(\.[a-zA-Z0-9][-a-zA-Z0-9]*)+$"
    ).unwrap();

    /// Regex for validating synthesis-provider voice ids
    static ref VOICE_ID_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9_-]+$"
    ).unwrap();
}

/// Validate a username
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("username is required".to_string());
    }

    if username.len() < 3 {
        return Err("username is too short (min 3 characters)".to_string());
    }

    if username.len() > 80 {
        return Err("username is too long (max 80 characters)".to_string());
    }

    if !USERNAME_REGEX.is_match(username) {
        return Err(
            "username may only contain letters, digits, underscores, dots and dashes".to_string(),
        );
    }

    Ok(())
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("email is required".to_string());
    }

    if email.len() > 120 {
        return Err("email is too long (max 120 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("email address is not valid".to_string());
    }

    Ok(())
}

/// Validate a password. Only presence and length are checked; the hash never
/// cares about composition.
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("password is required".to_string());
    }

    if password.len() > 128 {
        return Err("password is too long (max 128 characters)".to_string());
    }

    Ok(())
}

/// Validate a persona display name
pub fn validate_persona_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("name is required".to_string());
    }

    if name.len() > 120 {
        return Err("name is too long (max 120 characters)".to_string());
    }

    Ok(())
}

/// Validate a voice id before storing it on a persona
pub fn validate_voice_id(voice_id: &str) -> Result<(), String> {
    if voice_id.is_empty() {
        return Err("voice_id is required".to_string());
    }

    if voice_id.len() > 120 {
        return Err("voice_id is too long (max 120 characters)".to_string());
    }

    if !VOICE_ID_REGEX.is_match(voice_id) {
        return Err("voice_id may only contain letters, digits, underscores and dashes".to_string());
    }

    Ok(())
}
