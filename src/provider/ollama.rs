//! Ollama adapter (local model).
//!
//! Local inference is slow, so the timeout is 300s where the cloud adapters
//! use 30s. The prompt is a short single-line instruction and the reply
//! length is capped at a fixed `num_predict` regardless of the caller's
//! `max_tokens`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{ChatProvider, ProviderError};
use crate::db::PersonaAttributes;

const PROVIDER: &str = "ollama";
const MODEL: &str = "phi3:mini";

pub struct OllamaProvider {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(300))
                .build()
                .unwrap_or_default(),
        }
    }
}

fn build_prompt(user_prompt: &str, attributes: &PersonaAttributes) -> String {
    let name = attributes
        .get("name")
        .filter(|v| !v.is_empty())
        .map(String::as_str)
        .unwrap_or("Friend");
    let personality = attributes
        .get("personality")
        .filter(|v| !v.is_empty())
        .map(String::as_str)
        .unwrap_or("supportive");
    format!(
        "You are {}, a {} person. Respond warmly and briefly to: {}",
        name, personality, user_prompt
    )
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

fn extract_response(parsed: GenerateResponse) -> Result<String, ProviderError> {
    match parsed.response {
        Some(text) => Ok(text.trim().to_string()),
        None => Err(ProviderError::new(PROVIDER, "empty response")),
    }
}

#[async_trait]
impl ChatProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn generate_reply(
        &self,
        user_prompt: &str,
        attributes: &PersonaAttributes,
        _max_tokens: u32,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        let body = json!({
            "model": MODEL,
            "prompt": build_prompt(user_prompt, attributes),
            "stream": false,
            "options": {
                "temperature": 0.8,
                "num_predict": 100,
                "top_k": 40,
                "top_p": 0.9
            }
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::upstream(PROVIDER, status.as_u16(), &body));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;
        extract_response(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_prompt_with_attributes() {
        let mut attributes = PersonaAttributes::new();
        attributes.insert("name".to_string(), "Coach".to_string());
        attributes.insert("personality".to_string(), "encouraging".to_string());
        assert_eq!(
            build_prompt("hello", &attributes),
            "You are Coach, a encouraging person. Respond warmly and briefly to: hello"
        );
    }

    #[test]
    fn test_build_prompt_defaults() {
        assert_eq!(
            build_prompt("hello", &PersonaAttributes::new()),
            "You are Friend, a supportive person. Respond warmly and briefly to: hello"
        );
    }

    #[test]
    fn test_extract_response_trims() {
        let parsed: GenerateResponse =
            serde_json::from_str(r#"{"response":"  hi there \n"}"#).unwrap();
        assert_eq!(extract_response(parsed).unwrap(), "hi there");
    }

    #[test]
    fn test_missing_response_field_is_error() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{"done":true}"#).unwrap();
        let err = extract_response(parsed).unwrap_err();
        assert!(err.detail.contains("empty response"));
    }
}
