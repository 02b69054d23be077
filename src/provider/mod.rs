//! Provider adapter layer.
//!
//! Every AI backend implements the same `ChatProvider` contract; the active
//! one is picked once at startup from configuration. Each adapter owns its
//! request shaping, auth header, timeout, and response unwrapping. A failing
//! adapter surfaces its error; there is no request-time fallback between
//! providers.

mod gemini;
mod ollama;
mod openai;

pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{AiConfig, ProviderKind};
use crate::db::PersonaAttributes;

#[derive(Debug, Error)]
#[error("{provider}: {detail}")]
pub struct ProviderError {
    pub provider: &'static str,
    pub status: Option<u16>,
    pub detail: String,
}

impl ProviderError {
    pub fn new(provider: &'static str, detail: impl Into<String>) -> Self {
        Self {
            provider,
            status: None,
            detail: detail.into(),
        }
    }

    pub fn upstream(provider: &'static str, status: u16, body: &str) -> Self {
        // Keep upstream bodies short; they can carry whole HTML error pages
        let mut detail = body.trim().to_string();
        if detail.len() > 200 {
            detail.truncate(200);
        }
        Self {
            provider,
            status: Some(status),
            detail: format!("upstream returned {}: {}", status, detail),
        }
    }

    pub fn transport(provider: &'static str, err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        // reqwest includes the full request URL in its Display output, and
        // URLs can carry credentials in the query string. The detail is
        // logged and persisted, so drop the URL.
        let err = err.without_url();
        let detail = if err.is_timeout() {
            "request timed out".to_string()
        } else {
            err.to_string()
        };
        Self {
            provider,
            status,
            detail,
        }
    }
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Generate a reply to `user_prompt` while impersonating the persona
    /// described by `attributes`. At most one attempt; the bounded timeout
    /// lives inside each adapter.
    async fn generate_reply(
        &self,
        user_prompt: &str,
        attributes: &PersonaAttributes,
        max_tokens: u32,
    ) -> Result<String, ProviderError>;
}

/// Pick the configured provider. A missing API key is reported at call
/// time, not here; the process starts regardless.
pub fn select_provider(config: &AiConfig) -> Arc<dyn ChatProvider> {
    match config.provider {
        ProviderKind::Gemini => Arc::new(GeminiProvider::new(config.gemini_api_key.clone())),
        ProviderKind::Openai => Arc::new(OpenAiProvider::new(config.openai_api_key.clone())),
        ProviderKind::Ollama => Arc::new(OllamaProvider::new(config.ollama_url.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AiConfig;

    #[test]
    fn test_select_provider_follows_config() {
        let mut config = AiConfig::default();
        config.provider = ProviderKind::Gemini;
        assert_eq!(select_provider(&config).name(), "gemini");
        config.provider = ProviderKind::Openai;
        assert_eq!(select_provider(&config).name(), "openai");
        config.provider = ProviderKind::Ollama;
        assert_eq!(select_provider(&config).name(), "ollama");
    }

    #[test]
    fn test_upstream_error_truncates_body() {
        let body = "x".repeat(500);
        let err = ProviderError::upstream("gemini", 503, &body);
        assert_eq!(err.status, Some(503));
        assert!(err.detail.len() < 300);
    }
}
