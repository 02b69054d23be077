//! Google Gemini adapter (cloud, single combined prompt).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{ChatProvider, ProviderError};
use crate::db::PersonaAttributes;

const PROVIDER: &str = "gemini";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const MODEL: &str = "gemini-1.5-flash";

pub struct GeminiProvider {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: Option<String>, base_url: String) -> Self {
        Self {
            api_key,
            base_url,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }
}

/// Gemini takes no separate system role, so the persona preamble, profile
/// lines, and user message are folded into one prompt text.
fn build_prompt(user_prompt: &str, attributes: &PersonaAttributes) -> String {
    let mut prompt = String::from(
        "You are a compassionate, supportive person who speaks exactly like the character described. \
         Respond naturally as if you are this person, using their personality, tone, and speaking style. ",
    );
    if !attributes.is_empty() {
        prompt.push_str("\n\nCharacter Profile:\n");
        for (key, value) in attributes {
            if !value.is_empty() {
                prompt.push_str(&format!("{}: {}\n", key, value));
            }
        }
    }
    prompt.push_str(&format!("\n\nUser: {}\n\nResponse:", user_prompt));
    prompt
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: String,
}

fn extract_text(response: GenerateContentResponse) -> Result<String, ProviderError> {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content.parts.into_iter().next())
        .map(|p| p.text)
        .ok_or_else(|| ProviderError::new(PROVIDER, "no candidates in response"))
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn generate_reply(
        &self,
        user_prompt: &str,
        attributes: &PersonaAttributes,
        max_tokens: u32,
    ) -> Result<String, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::new(PROVIDER, "GEMINI_API_KEY not set"))?;

        // The key goes in a header, never the URL: request URLs end up in
        // error strings, logs, and persisted error messages.
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, MODEL
        );
        let body = json!({
            "contents": [{
                "parts": [{ "text": build_prompt(user_prompt, attributes) }]
            }],
            "generationConfig": {
                "temperature": 0.9,
                "maxOutputTokens": max_tokens,
                "topP": 0.95,
                "topK": 40
            }
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::upstream(PROVIDER, status.as_u16(), &body));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;
        extract_text(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_prompt_includes_profile_lines() {
        let mut attributes = PersonaAttributes::new();
        attributes.insert("personality".to_string(), "encouraging".to_string());
        attributes.insert("tone".to_string(), "warm".to_string());
        let prompt = build_prompt("hello", &attributes);
        assert!(prompt.contains("Character Profile:"));
        assert!(prompt.contains("personality: encouraging"));
        assert!(prompt.contains("tone: warm"));
        assert!(prompt.ends_with("User: hello\n\nResponse:"));
    }

    #[test]
    fn test_build_prompt_skips_empty_values_and_empty_map() {
        let mut attributes = PersonaAttributes::new();
        attributes.insert("personality".to_string(), String::new());
        let prompt = build_prompt("hi", &attributes);
        assert!(!prompt.contains("personality:"));

        let prompt = build_prompt("hi", &PersonaAttributes::new());
        assert!(!prompt.contains("Character Profile:"));
    }

    #[test]
    fn test_extract_text_first_candidate() {
        let parsed: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"hi there"}]}},
                {"content":{"parts":[{"text":"second"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(parsed).unwrap(), "hi there");
    }

    #[test]
    fn test_extract_text_no_candidates_is_error() {
        let parsed: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        let err = extract_text(parsed).unwrap_err();
        assert!(err.detail.contains("no candidates"));
    }

    #[tokio::test]
    async fn test_error_detail_never_contains_api_key() {
        // A connect failure against an unroutable port; the resulting
        // detail is logged and persisted, so the key must not be in it.
        let provider = GeminiProvider::with_base_url(
            Some("sekret-api-key".to_string()),
            "http://127.0.0.1:1".to_string(),
        );
        let err = provider
            .generate_reply("hi", &PersonaAttributes::new(), 256)
            .await
            .unwrap_err();
        assert!(!err.detail.contains("sekret-api-key"));
        assert!(!err.to_string().contains("sekret-api-key"));
    }

    #[tokio::test]
    async fn test_missing_key_fails_at_call_time() {
        let provider = GeminiProvider::new(None);
        let err = provider
            .generate_reply("hi", &PersonaAttributes::new(), 256)
            .await
            .unwrap_err();
        assert!(err.detail.contains("GEMINI_API_KEY"));
    }
}
