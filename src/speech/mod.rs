//! Speech synthesis adapter (ElevenLabs).
//!
//! Synthesis is best-effort: any failure here resolves to
//! `Synthesis::Unavailable` and the caller falls back to client-side
//! rendering. Only `list_voices` surfaces upstream errors, since its caller
//! has nothing to fall back to.

use anyhow::{Context, Result};
use serde_json::json;
use std::time::Duration;
use tracing::warn;

use crate::config::SpeechConfig;

const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";

#[derive(Debug)]
pub enum Synthesis {
    Audio { bytes: Vec<u8>, format: &'static str },
    Unavailable,
}

pub struct Synthesizer {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl Synthesizer {
    pub fn new(config: &SpeechConfig) -> Self {
        Self::with_base_url(config.elevenlabs_api_key.clone(), DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: Option<String>, base_url: String) -> Self {
        Self {
            api_key,
            base_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// Render `text` with the cloned voice `voice_id`. Never errors.
    pub async fn synthesize(&self, text: &str, voice_id: &str) -> Synthesis {
        let api_key = match self.api_key.as_deref() {
            Some(key) if !key.is_empty() => key,
            _ => return Synthesis::Unavailable,
        };

        let url = format!("{}/v1/text-to-speech/{}", self.base_url, voice_id);
        let body = json!({
            "text": text,
            "model_id": "eleven_monolingual_v1",
            "voice_settings": {
                "stability": 0.5,
                "similarity_boost": 0.75
            }
        });

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", api_key)
            .header("Accept", "audio/mpeg")
            .json(&body)
            .timeout(Duration::from_secs(30))
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Speech synthesis request failed");
                return Synthesis::Unavailable;
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), voice_id = %voice_id, "Speech synthesis rejected upstream");
            return Synthesis::Unavailable;
        }

        match response.bytes().await {
            Ok(bytes) => Synthesis::Audio {
                bytes: bytes.to_vec(),
                format: "mp3",
            },
            Err(e) => {
                warn!(error = %e, "Failed to read synthesized audio");
                Synthesis::Unavailable
            }
        }
    }

    /// List the cloneable voices on the configured account. The caller must
    /// check `is_configured` first.
    pub async fn list_voices(&self) -> Result<serde_json::Value> {
        let api_key = self
            .api_key
            .as_deref()
            .context("speech provider key not configured")?;

        let response = self
            .client
            .get(format!("{}/v1/voices", self.base_url))
            .header("xi-api-key", api_key)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .context("voice list request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("voice list request returned {}", response.status());
        }

        response
            .json()
            .await
            .context("failed to parse voice list response")
    }
}
