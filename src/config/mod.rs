use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub chatlog: ChatLogConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Secret used to sign session tokens (HS256). Set via config file or
    /// the JWT_SECRET environment variable; the random default makes tokens
    /// invalid across restarts.
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            token_ttl_days: default_token_ttl_days(),
        }
    }
}

fn default_jwt_secret() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_token_ttl_days() -> i64 {
    7
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            gemini_api_key: None,
            openai_api_key: None,
            ollama_url: default_ollama_url(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_provider() -> ProviderKind {
    ProviderKind::Gemini
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_max_tokens() -> u32 {
    256
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    Openai,
    Ollama,
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            "openai" => Ok(ProviderKind::Openai),
            "ollama" => Ok(ProviderKind::Ollama),
            other => Err(format!("unsupported AI provider: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ChatLogConfig {
    /// SQLite URL for the conversation log store. Defaults to
    /// `<data_dir>/chatlog.db`. The process starts without history
    /// persistence when this store cannot be opened.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SpeechConfig {
    pub elevenlabs_api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&content).with_context(|| "Failed to parse configuration file")?
        } else {
            info!("No config file found, using defaults");
            Config::default()
        };
        Ok(config.with_env_overrides())
    }

    pub fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            ai: AiConfig::default(),
            chatlog: ChatLogConfig::default(),
            speech: SpeechConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Environment variables win over file values. Secrets are expected to
    /// arrive this way and are never logged.
    fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = var("PORT") {
            match v.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!("Ignoring invalid PORT value"),
            }
        }
        if let Some(v) = var("DATA_DIR") {
            self.server.data_dir = PathBuf::from(v);
        }
        if let Some(v) = var("CHATLOG_URL") {
            self.chatlog.url = Some(v);
        }
        if let Some(v) = var("AI_PROVIDER") {
            match v.parse() {
                Ok(kind) => self.ai.provider = kind,
                Err(e) => warn!("{}, keeping configured provider", e),
            }
        }
        if let Some(v) = var("GEMINI_API_KEY") {
            self.ai.gemini_api_key = Some(v);
        }
        if let Some(v) = var("OPENAI_API_KEY") {
            self.ai.openai_api_key = Some(v);
        }
        if let Some(v) = var("OLLAMA_URL") {
            self.ai.ollama_url = v;
        }
        if let Some(v) = var("ELEVENLABS_API_KEY") {
            self.speech.elevenlabs_api_key = Some(v);
        }
        if let Some(v) = var("JWT_SECRET") {
            self.auth.jwt_secret = v;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.ai.provider, ProviderKind::Gemini);
        assert_eq!(config.ai.ollama_url, "http://localhost:11434");
        assert_eq!(config.ai.max_tokens, 256);
        assert_eq!(config.auth.token_ttl_days, 7);
        assert!(config.chatlog.url.is_none());
        assert!(config.speech.elevenlabs_api_key.is_none());
    }

    #[test]
    fn test_parse_partial_file() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 8080

            [ai]
            provider = "ollama"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.ai.provider, ProviderKind::Ollama);
        // Untouched sections keep their defaults
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.ai.max_tokens, 256);
    }

    #[test]
    fn test_provider_kind_from_str() {
        assert_eq!("gemini".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::Openai);
        assert!("claude".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_env_overrides() {
        // Exercised through a lookup table instead of set_var, which is
        // process-global and races parallel tests.
        let vars: std::collections::HashMap<&str, &str> = [
            ("OLLAMA_URL", "http://ollama.internal:11434"),
            ("JWT_SECRET", "from-env"),
            ("PORT", "8080"),
        ]
        .into_iter()
        .collect();
        let config = Config::default().with_overrides(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.ai.ollama_url, "http://ollama.internal:11434");
        assert_eq!(config.auth.jwt_secret, "from-env");
        assert_eq!(config.server.port, 8080);
        // Unset variables leave the file values alone
        assert_eq!(config.ai.provider, ProviderKind::Gemini);
        assert!(config.ai.gemini_api_key.is_none());
    }

    #[test]
    fn test_invalid_override_values_keep_defaults() {
        let config = Config::default().with_overrides(|key| match key {
            "PORT" => Some("not-a-port".to_string()),
            "AI_PROVIDER" => Some("claude".to_string()),
            _ => None,
        });
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.ai.provider, ProviderKind::Gemini);
    }
}
