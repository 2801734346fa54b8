use std::time::Duration;

use crate::{ConfigSource, ModelFamily};

/// How often and how patiently a completion is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Linear backoff step: attempt `n` waits `(n - 1) * backoff_step`.
    pub backoff_step: Duration,
    /// Return a provider error once attempts are exhausted instead of
    /// extracting from the last error-bearing response.
    pub surface_provider_errors: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_millis(100),
            surface_provider_errors: false,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait before the given 1-based attempt, saturating at
    /// [`Duration::MAX`].
    #[must_use]
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.backoff_step
            .checked_mul(attempt.saturating_sub(1))
            .unwrap_or(Duration::MAX)
    }
}

/// Settings read for a single completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSettings {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Explicit family; resolved from `model` when absent.
    pub family: Option<ModelFamily>,
    pub retry: RetryPolicy,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: ModelFamily::CHAT_MODEL.to_string(),
            max_tokens: 512,
            temperature: 0.7,
            family: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl CompletionSettings {
    #[must_use]
    pub fn family(&self) -> ModelFamily {
        self.family
            .unwrap_or_else(|| ModelFamily::from_model(&self.model))
    }

    #[must_use]
    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// Fixed settings, handed out unchanged on every load.
#[derive(Debug, Clone)]
pub struct StaticConfig(CompletionSettings);

impl StaticConfig {
    #[must_use]
    pub const fn new(settings: CompletionSettings) -> Self {
        Self(settings)
    }
}

impl ConfigSource for StaticConfig {
    fn load(&self) -> anyhow::Result<CompletionSettings> {
        Ok(self.0.clone())
    }
}
