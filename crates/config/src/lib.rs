//! Configuration loading, validation, and management for SousChef.
//!
//! Loads configuration from `~/.souschef/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.souschef/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default log filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Language-model service
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Vector index holding the recipe library
    #[serde(default)]
    pub index: IndexConfig,

    /// Conversation thread storage
    #[serde(default)]
    pub store: StoreConfig,

    /// Turn orchestration settings
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// URL content extraction
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// HTTP gateway
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_log_level() -> String {
    "info".into()
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Per-request timeout for chat and embedding calls
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_provider_timeout() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            embedding_model: default_embedding_model(),
            temperature: None,
            timeout_secs: default_provider_timeout(),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// "pinecone" or "in_memory"
    #[serde(default = "default_index_backend")]
    pub backend: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Data-plane host of the index, e.g. `https://recipes-abc123.svc.pinecone.io`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default = "default_index_timeout")]
    pub timeout_secs: u64,
}

fn default_index_backend() -> String {
    "in_memory".into()
}
fn default_index_timeout() -> u64 {
    30
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: default_index_backend(),
            api_key: None,
            host: None,
            timeout_secs: default_index_timeout(),
        }
    }
}

impl std::fmt::Debug for IndexConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexConfig")
            .field("backend", &self.backend)
            .field("api_key", &redact(&self.api_key))
            .field("host", &self.host)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "sqlite" or "in_memory"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// SQLite URL; defaults to `souschef.db` in the config directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

fn default_store_backend() -> String {
    "sqlite".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            database_url: None,
        }
    }
}

impl StoreConfig {
    pub fn resolved_database_url(&self) -> String {
        self.database_url.clone().unwrap_or_else(|| {
            format!("sqlite://{}", AppConfig::config_dir().join("souschef.db").display())
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Model context window in tokens
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Recipes retrieved per turn
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// "o200k_base" (gpt-4o BPE) or "estimate" (4 chars per token)
    #[serde(default = "default_tokenizer")]
    pub tokenizer: String,

    /// Replace the built-in system template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_path: Option<PathBuf>,

    /// Progress events buffered per streaming turn
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
}

fn default_context_window() -> usize {
    128_000
}
fn default_top_k() -> usize {
    5
}
fn default_tokenizer() -> String {
    "o200k_base".into()
}
fn default_stream_buffer() -> usize {
    128
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            context_window: default_context_window(),
            top_k: default_top_k(),
            tokenizer: default_tokenizer(),
            system_prompt_path: None,
            stream_buffer: default_stream_buffer(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_extraction_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_extraction_timeout() -> u64 {
    10
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3".into()
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_extraction_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Maximum accepted request body (image uploads included)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Bearer token → tenant id
    #[serde(default)]
    pub tokens: HashMap<String, String>,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_max_body_bytes() -> usize {
    20 * 1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_body_bytes: default_max_body_bytes(),
            tokens: HashMap::new(),
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("port", &self.port)
            .field("host", &self.host)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("tokens", &format!("[{} REDACTED]", self.tokens.len()))
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.souschef/config.toml).
    ///
    /// Environment variables override the file:
    /// - `SOUSCHEF_API_KEY`, then `OPENAI_API_KEY`
    /// - `PINECONE_API_KEY`, `PINECONE_HOST`
    /// - `SOUSCHEF_MODEL`, `SOUSCHEF_DATABASE_URL`, `LOG_LEVEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if self.provider.api_key.is_none() {
            self.provider.api_key = var("SOUSCHEF_API_KEY").or_else(|| var("OPENAI_API_KEY"));
        }
        if self.index.api_key.is_none() {
            self.index.api_key = var("PINECONE_API_KEY");
        }
        if let Some(host) = var("PINECONE_HOST") {
            self.index.host = Some(host);
            self.index.backend = "pinecone".into();
        }
        if let Some(model) = var("SOUSCHEF_MODEL") {
            self.provider.model = model;
        }
        if let Some(url) = var("SOUSCHEF_DATABASE_URL") {
            self.store.database_url = Some(url);
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.log_level = level;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".souschef")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(t) = self.provider.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::ValidationError(
                    "provider.temperature must be between 0.0 and 2.0".into(),
                ));
            }
        }

        if self.assistant.top_k == 0 {
            return Err(ConfigError::ValidationError("assistant.top_k must be > 0".into()));
        }

        if self.assistant.context_window == 0 {
            return Err(ConfigError::ValidationError(
                "assistant.context_window must be > 0".into(),
            ));
        }

        if !matches!(self.assistant.tokenizer.as_str(), "o200k_base" | "estimate") {
            return Err(ConfigError::ValidationError(format!(
                "assistant.tokenizer must be \"o200k_base\" or \"estimate\", got \"{}\"",
                self.assistant.tokenizer
            )));
        }

        match self.index.backend.as_str() {
            "in_memory" => {}
            "pinecone" => {
                if self.index.host.is_none() {
                    return Err(ConfigError::ValidationError(
                        "index.host is required for the pinecone backend".into(),
                    ));
                }
            }
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "unknown index backend \"{other}\""
                )));
            }
        }

        if !matches!(self.store.backend.as_str(), "sqlite" | "in_memory") {
            return Err(ConfigError::ValidationError(format!(
                "unknown store backend \"{}\"",
                self.store.backend
            )));
        }

        Ok(())
    }

    /// Check if a model API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }

    /// Generate a default config TOML string (for `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            provider: ProviderConfig::default(),
            index: IndexConfig::default(),
            store: StoreConfig::default(),
            assistant: AssistantConfig::default(),
            extraction: ExtractionConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.provider.model, "gpt-4o");
        assert_eq!(config.provider.embedding_model, "text-embedding-3-small");
        assert_eq!(config.assistant.context_window, 128_000);
        assert_eq!(config.assistant.top_k, 5);
        assert_eq!(config.extraction.timeout_secs, 10);
        assert_eq!(config.gateway.port, 8000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider.model, config.provider.model);
        assert_eq!(parsed.gateway.port, config.gateway.port);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.provider.temperature = Some(5.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn pinecone_requires_host() {
        let mut config = AppConfig::default();
        config.index.backend = "pinecone".into();
        assert!(config.validate().is_err());
        config.index.host = Some("https://recipes.svc.pinecone.io".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_tokenizer_rejected() {
        let mut config = AppConfig::default();
        config.assistant.tokenizer = "cl100k".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.provider.model, "gpt-4o");
    }

    #[test]
    fn load_from_file_with_partial_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
log_level = "debug"

[assistant]
top_k = 3

[gateway.tokens]
"secret-token" = "42"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.assistant.top_k, 3);
        assert_eq!(config.assistant.context_window, 128_000);
        assert_eq!(config.gateway.tokens.get("secret-token").map(String::as_str), Some("42"));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[assistant\ntop_k = ").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-test"),
            ("PINECONE_API_KEY", "pc-test"),
            ("PINECONE_HOST", "https://idx.pinecone.io"),
            ("SOUSCHEF_MODEL", "gpt-4o-mini"),
        ]
        .into_iter()
        .collect();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.provider.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.index.api_key.as_deref(), Some("pc-test"));
        assert_eq!(config.index.backend, "pinecone");
        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("sk-very-secret".into());
        config.gateway.tokens.insert("bearer-secret".into(), "7".into());
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("sk-very-secret"));
        assert!(!dbg.contains("bearer-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o"));
        assert!(toml_str.contains("8000"));
    }
}
