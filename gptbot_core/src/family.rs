//! Model families and the per-family request/response strategies.
//!
//! The family is resolved once per call from settings; everything that
//! differs between chat-style and prompt-style models lives behind
//! [`FamilyStrategy`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::payload::{
    ChatRequest, Completion, LegacyRequest, RequestPayload, ResponseEnvelope, SamplingParams,
};
use crate::{ChatMessage, CompletionSettings, HistoryStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFamily {
    /// Structured multi-turn `messages`.
    Chat,
    /// Single flat `prompt`.
    Legacy,
}

impl ModelFamily {
    /// Model name that selects the chat family when no override is set.
    pub const CHAT_MODEL: &'static str = "gpt-3.5-turbo-0301";

    #[must_use]
    pub fn from_model(model: &str) -> Self {
        if model == Self::CHAT_MODEL {
            Self::Chat
        } else {
            Self::Legacy
        }
    }

    #[must_use]
    pub fn strategy(self) -> &'static dyn FamilyStrategy {
        match self {
            Self::Chat => &ChatFamily,
            Self::Legacy => &LegacyFamily,
        }
    }
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chat => write!(f, "chat"),
            Self::Legacy => write!(f, "legacy"),
        }
    }
}

impl std::str::FromStr for ModelFamily {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(Self::Chat),
            "legacy" => Ok(Self::Legacy),
            _ => Err(anyhow::anyhow!("unknown model family: {s}")),
        }
    }
}

/// Who produced the message being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Origin {
    #[default]
    User,
    Assistant,
}

#[async_trait]
pub trait FamilyStrategy: Send + Sync {
    async fn build_payload(
        &self,
        history: &dyn HistoryStore,
        user_id: &str,
        message: &str,
        origin: Origin,
        settings: &CompletionSettings,
    ) -> RequestPayload;

    fn extract_reply(&self, envelope: &ResponseEnvelope) -> Completion;
}

#[derive(Debug, Clone, Copy)]
pub struct ChatFamily;

#[async_trait]
impl FamilyStrategy for ChatFamily {
    /// User messages are recorded before the history is read back, so the
    /// outgoing `messages` equal what the store now holds. Assistant messages
    /// are appended to a copy and never recorded.
    async fn build_payload(
        &self,
        history: &dyn HistoryStore,
        user_id: &str,
        message: &str,
        origin: Origin,
        settings: &CompletionSettings,
    ) -> RequestPayload {
        let messages = match origin {
            Origin::User => {
                history.record(user_id, ChatMessage::user(message)).await;
                history.read(user_id).await
            }
            Origin::Assistant => {
                let mut messages = history.read(user_id).await;
                messages.push(ChatMessage::assistant(message));
                messages
            }
        };

        debug!(
            "Built chat request for {user_id}: {} messages ({origin:?} origin)",
            messages.len()
        );

        RequestPayload::Chat(ChatRequest {
            model: settings.model.clone(),
            messages,
            sampling: SamplingParams::new(settings.max_tokens, settings.temperature),
        })
    }

    fn extract_reply(&self, envelope: &ResponseEnvelope) -> Completion {
        envelope
            .first_choice()
            .map(|choice| Completion {
                reply: choice
                    .message
                    .as_ref()
                    .and_then(|m| m.content.clone())
                    .unwrap_or_default(),
                finish_reason: choice.finish_reason.clone(),
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LegacyFamily;

#[async_trait]
impl FamilyStrategy for LegacyFamily {
    async fn build_payload(
        &self,
        _history: &dyn HistoryStore,
        _user_id: &str,
        message: &str,
        _origin: Origin,
        settings: &CompletionSettings,
    ) -> RequestPayload {
        RequestPayload::Legacy(LegacyRequest {
            model: settings.model.clone(),
            prompt: message.to_string(),
            sampling: SamplingParams::new(settings.max_tokens, settings.temperature),
        })
    }

    fn extract_reply(&self, envelope: &ResponseEnvelope) -> Completion {
        envelope
            .first_choice()
            .map(|choice| Completion {
                reply: choice.text.clone().unwrap_or_default(),
                finish_reason: choice.finish_reason.clone(),
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{Choice, ChoiceMessage, FinishReason};
    use crate::Role;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    /// Unbounded store that also counts writes.
    #[derive(Default)]
    struct RecordingHistory {
        turns: Mutex<HashMap<String, Vec<ChatMessage>>>,
        writes: Mutex<usize>,
    }

    #[async_trait]
    impl HistoryStore for RecordingHistory {
        async fn record(&self, user_id: &str, turn: ChatMessage) {
            *self.writes.lock().await += 1;
            self.turns
                .lock()
                .await
                .entry(user_id.to_string())
                .or_default()
                .push(turn);
        }

        async fn read(&self, user_id: &str) -> Vec<ChatMessage> {
            self.turns
                .lock()
                .await
                .get(user_id)
                .cloned()
                .unwrap_or_default()
        }
    }

    fn settings(model: &str) -> CompletionSettings {
        CompletionSettings {
            api_key: "sk-test".to_string(),
            model: model.to_string(),
            max_tokens: 128,
            temperature: 0.25,
            ..CompletionSettings::default()
        }
    }

    #[test]
    fn resolves_family_from_model_name() {
        assert_eq!(
            ModelFamily::from_model("gpt-3.5-turbo-0301"),
            ModelFamily::Chat
        );
        assert_eq!(
            ModelFamily::from_model("text-davinci-003"),
            ModelFamily::Legacy
        );
        assert_eq!("legacy".parse::<ModelFamily>().unwrap(), ModelFamily::Legacy);
        assert!("gpt".parse::<ModelFamily>().is_err());
    }

    #[tokio::test]
    async fn user_origin_persists_then_sends_history() {
        let history = RecordingHistory::default();
        history.record("alice", ChatMessage::user("first")).await;
        history.record("alice", ChatMessage::assistant("reply")).await;

        let payload = ChatFamily
            .build_payload(
                &history,
                "alice",
                "second",
                Origin::User,
                &settings(ModelFamily::CHAT_MODEL),
            )
            .await;

        let stored = history.read("alice").await;
        assert_eq!(stored.len(), 3);
        assert_eq!(payload.messages(), Some(&stored));
        assert_eq!(stored[2], ChatMessage::user("second"));
        assert!(payload.prompt().is_none());
    }

    #[tokio::test]
    async fn assistant_origin_does_not_persist() {
        let history = RecordingHistory::default();
        history.record("bob", ChatMessage::user("hi")).await;

        let payload = ChatFamily
            .build_payload(
                &history,
                "bob",
                "hello back",
                Origin::Assistant,
                &settings(ModelFamily::CHAT_MODEL),
            )
            .await;

        let messages = payload.messages().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(history.read("bob").await, vec![ChatMessage::user("hi")]);
        assert_eq!(*history.writes.lock().await, 1);
    }

    #[tokio::test]
    async fn legacy_never_touches_history() {
        let history = RecordingHistory::default();

        let payload = LegacyFamily
            .build_payload(
                &history,
                "carol",
                "give me a good song",
                Origin::User,
                &settings("text-davinci-003"),
            )
            .await;

        assert_eq!(payload.prompt(), Some("give me a good song"));
        assert!(payload.messages().is_none());
        assert_eq!(payload.model(), "text-davinci-003");
        assert_eq!(*history.writes.lock().await, 0);
        assert!(history.read("carol").await.is_empty());
    }

    #[test]
    fn extracts_by_family() {
        let envelope = ResponseEnvelope {
            choices: vec![Choice {
                index: 0,
                text: Some("legacy text".to_string()),
                message: Some(ChoiceMessage {
                    role: "assistant".to_string(),
                    content: Some("chat text".to_string()),
                }),
                finish_reason: Some(FinishReason::Length),
                logprobs: None,
            }],
            ..ResponseEnvelope::default()
        };

        let chat = ModelFamily::Chat.strategy().extract_reply(&envelope);
        assert_eq!(chat.reply, "chat text");
        assert_eq!(chat.finish_reason_str(), "length");

        let legacy = ModelFamily::Legacy.strategy().extract_reply(&envelope);
        assert_eq!(legacy.reply, "legacy text");
    }

    #[test]
    fn empty_choices_yield_empty_completion() {
        let envelope = ResponseEnvelope::default();
        for family in [ModelFamily::Chat, ModelFamily::Legacy] {
            let completion = family.strategy().extract_reply(&envelope);
            assert_eq!(completion.reply, "");
            assert_eq!(completion.finish_reason_str(), "");
        }
    }
}
