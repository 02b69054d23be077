//! OpenAI adapter (cloud, role-based chat completion).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{ChatProvider, ProviderError};
use crate::db::PersonaAttributes;

const PROVIDER: &str = "openai";
const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const MODEL: &str = "gpt-3.5-turbo";

pub struct OpenAiProvider {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
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

/// The persona profile rides in the system message as a JSON dump; the user
/// prompt goes through untouched as the user message.
fn build_system_prompt(attributes: &PersonaAttributes) -> String {
    let mut prompt = String::from(
        "You are a compassionate, supportive assistant that speaks as the trained person would. \
         Keep answers brief and empathetic.",
    );
    if !attributes.is_empty() {
        prompt.push_str(" Use this profile information: ");
        prompt.push_str(&serde_json::to_string(attributes).unwrap_or_default());
    }
    prompt
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

fn extract_content(response: ChatCompletionResponse) -> Result<String, ProviderError> {
    response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| ProviderError::new(PROVIDER, "no choices in response"))
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
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
            .ok_or_else(|| ProviderError::new(PROVIDER, "OPENAI_API_KEY not set"))?;

        let body = json!({
            "model": MODEL,
            "messages": [
                { "role": "system", "content": build_system_prompt(attributes) },
                { "role": "user", "content": user_prompt }
            ],
            "max_tokens": max_tokens,
            "temperature": 0.7
        });

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::upstream(PROVIDER, status.as_u16(), &body));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;
        extract_content(parsed)
    }
}
