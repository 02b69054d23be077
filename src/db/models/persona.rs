//! Persona (character) model.
//!
//! A persona is the profile a user creates for the person the AI should
//! impersonate: a display name, free-form string attributes stored as a JSON
//! object in a TEXT column, and an optional synthesis-provider voice id.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;

/// Free-form profile attributes. A sorted map keeps prompt serialization
/// deterministic.
pub type PersonaAttributes = BTreeMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Persona {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub attributes: Option<String>,
    pub voice_id: Option<String>,
    pub created_at: String,
}

impl Persona {
    /// Parse the JSON attributes column. Malformed or absent data yields an
    /// empty map rather than an error; the profile is opaque, best-effort
    /// context for the AI call.
    pub fn attribute_map(&self) -> PersonaAttributes {
        self.attributes
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePersonaRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub attributes: PersonaAttributes,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePersonaRequest {
    pub name: Option<String>,
    pub attributes: Option<PersonaAttributes>,
    pub voice_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetVoiceRequest {
    #[serde(default)]
    pub voice_id: String,
}

#[derive(Debug, Serialize)]
pub struct PersonaResponse {
    pub id: String,
    pub name: String,
    pub attributes: PersonaAttributes,
    pub voice_id: Option<String>,
    pub created_at: String,
}

impl From<Persona> for PersonaResponse {
    fn from(persona: Persona) -> Self {
        let attributes = persona.attribute_map();
        Self {
            id: persona.id,
            name: persona.name,
            attributes,
            voice_id: persona.voice_id,
            created_at: persona.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persona_with(attributes: Option<&str>) -> Persona {
        Persona {
            id: "p1".to_string(),
            user_id: "u1".to_string(),
            name: "Coach".to_string(),
            attributes: attributes.map(|s| s.to_string()),
            voice_id: None,
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_attribute_map_parses_json() {
        let persona = persona_with(Some(r#"{"personality":"encouraging","tone":"warm"}"#));
        let map = persona.attribute_map();
        assert_eq!(map.get("personality").unwrap(), "encouraging");
        assert_eq!(map.get("tone").unwrap(), "warm");
    }

    #[test]
    fn test_attribute_map_tolerates_garbage() {
        assert!(persona_with(Some("not json")).attribute_map().is_empty());
        assert!(persona_with(None).attribute_map().is_empty());
    }
}
