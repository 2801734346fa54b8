#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod error;
pub mod family;
pub mod payload;
pub mod settings;

pub use error::{CompletionError, TransportStage};
pub use family::{ChatFamily, FamilyStrategy, LegacyFamily, ModelFamily, Origin};
pub use payload::{
    ChatRequest, Choice, ChoiceMessage, Completion, ErrorDetail, FinishReason, LegacyRequest,
    RequestPayload, ResponseEnvelope, SamplingParams,
};
pub use settings::{CompletionSettings, RetryPolicy, StaticConfig};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::System => write!(f, "system"),
        }
    }
}

/// One turn of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Per-user rolling conversation history.
///
/// Implementations must serialize concurrent mutation of the same user's
/// sequence; reads return a snapshot in insertion order.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append a turn, evicting the oldest turns once capacity is exceeded.
    async fn record(&self, user_id: &str, turn: ChatMessage);

    /// Current turns for `user_id`, empty for an unknown user.
    async fn read(&self, user_id: &str) -> Vec<ChatMessage>;
}

/// Sends one request payload to the completion service.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    /// A decoded envelope is returned even when the service reported an
    /// error inside it; only failures to obtain an envelope are `Err`.
    async fn send(
        &self,
        settings: &CompletionSettings,
        payload: &RequestPayload,
        attempt: u32,
    ) -> Result<ResponseEnvelope, CompletionError>;
}

/// Supplies settings; consulted once per completion call.
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> anyhow::Result<CompletionSettings>;
}
