use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use gptbot_core::{CompletionSettings, ModelFamily, RetryPolicy};
use tracing::debug;

/// Environment variable that replaces `openai.api_key`.
pub const API_KEY_ENV: &str = "GPTBOT_API_KEY";
/// Environment variable that replaces `model.name`.
pub const MODEL_ENV: &str = "GPTBOT_MODEL";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "OpenAiConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "OpenAiConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: Self::default_base_url(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

impl OpenAiConfig {
    fn default_base_url() -> String {
        "https://api.openai.com/v1".to_string()
    }

    const fn default_timeout_secs() -> u64 {
        300
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ModelConfig {
    #[serde(default = "ModelConfig::default_name")]
    pub name: String,
    #[serde(default = "ModelConfig::default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "ModelConfig::default_temperature")]
    pub temperature: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<ModelFamily>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            max_tokens: Self::default_max_tokens(),
            temperature: Self::default_temperature(),
            family: None,
        }
    }
}

impl ModelConfig {
    fn default_name() -> String {
        ModelFamily::CHAT_MODEL.to_string()
    }

    const fn default_max_tokens() -> u32 {
        512
    }

    const fn default_temperature() -> f64 {
        0.7
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    #[serde(default = "RetryConfig::default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "RetryConfig::default_backoff_step_ms")]
    pub backoff_step_ms: u64,
    #[serde(default)]
    pub surface_provider_errors: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            backoff_step_ms: Self::default_backoff_step_ms(),
            surface_provider_errors: false,
        }
    }
}

impl RetryConfig {
    const fn default_max_attempts() -> u32 {
        3
    }

    const fn default_backoff_step_ms() -> u64 {
        100
    }

    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff_step: Duration::from_millis(self.backoff_step_ms),
            surface_provider_errors: self.surface_provider_errors,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    #[serde(default = "HistoryConfig::default_capacity")]
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: Self::default_capacity(),
        }
    }
}

impl HistoryConfig {
    const fn default_capacity() -> usize {
        20
    }
}

const CONFIG_TEMPLATE: &str = r#"{
  "openai": {
    "api_key": "your-openai-api-key-here",
    "base_url": "https://api.openai.com/v1",
    "timeout_secs": 300
  },
  "model": {
    "name": "gpt-3.5-turbo-0301",
    "max_tokens": 512,
    "temperature": 0.7
  },
  "retry": {
    "max_attempts": 3,
    "backoff_step_ms": 100,
    "surface_provider_errors": false
  },
  "history": {
    "capacity": 20
  }
}"#;

impl Config {
    /// Directory holding `config.json`, `~/gptbot`.
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join("gptbot"))
    }

    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load `~/gptbot/config.json` and apply environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "Config file not found at: {}. Please run 'gptbot init' to create config.",
                path.display()
            );
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        let mut config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config at {}", path.display()))?;
        config.apply_overrides(|key| std::env::var(key).ok());

        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Replace file values with those returned by `lookup` for
    /// [`API_KEY_ENV`] and [`MODEL_ENV`]; empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(API_KEY_ENV).filter(|v| !v.is_empty()) {
            self.openai.api_key = key;
        }
        if let Some(model) = lookup(MODEL_ENV).filter(|v| !v.is_empty()) {
            self.model.name = model;
        }
    }

    #[must_use]
    pub fn to_settings(&self) -> CompletionSettings {
        CompletionSettings {
            api_key: self.openai.api_key.clone(),
            model: self.model.name.clone(),
            max_tokens: self.model.max_tokens,
            temperature: self.model.temperature,
            family: self.model.family,
            retry: self.retry.policy(),
        }
    }

    pub fn ensure_config_dir() -> anyhow::Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }

    pub fn create_config() -> anyhow::Result<PathBuf> {
        let config_path = Self::ensure_config_dir()?.join("config.json");
        Self::write_template(&config_path)?;
        Ok(config_path)
    }

    /// Write the default config to `path`, refusing to overwrite.
    pub fn write_template(path: &Path) -> anyhow::Result<()> {
        if path.exists() {
            anyhow::bail!(
                "Config file already exists at: {}. Please edit it directly.",
                path.display()
            );
        }

        std::fs::write(path, CONFIG_TEMPLATE)
            .with_context(|| format!("Failed to write config at {}", path.display()))?;
        Ok(())
    }
}
