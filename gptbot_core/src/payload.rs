//! Wire types for the completion endpoints.
//!
//! Requests are a closed enum so the serialized body carries either
//! `messages` or `prompt`, never both. Responses decode leniently: every
//! field is defaulted, whether it is missing or `null`, because error bodies
//! share the envelope shape but omit most of it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::ChatMessage;

/// Decode an explicit `null` as the field's default value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SamplingParams {
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
}

impl SamplingParams {
    /// `top_p`, `frequency_penalty` and `presence_penalty` are fixed.
    #[must_use]
    pub const fn new(max_tokens: u32, temperature: f64) -> Self {
        Self {
            max_tokens,
            temperature,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(flatten)]
    pub sampling: SamplingParams,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegacyRequest {
    pub model: String,
    pub prompt: String,
    #[serde(flatten)]
    pub sampling: SamplingParams,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RequestPayload {
    Chat(ChatRequest),
    Legacy(LegacyRequest),
}

impl RequestPayload {
    #[must_use]
    pub fn model(&self) -> &str {
        match self {
            Self::Chat(req) => &req.model,
            Self::Legacy(req) => &req.model,
        }
    }

    #[must_use]
    pub const fn messages(&self) -> Option<&Vec<ChatMessage>> {
        match self {
            Self::Chat(req) => Some(&req.messages),
            Self::Legacy(_) => None,
        }
    }

    #[must_use]
    pub fn prompt(&self) -> Option<&str> {
        match self {
            Self::Chat(_) => None,
            Self::Legacy(req) => Some(&req.prompt),
        }
    }

    /// Path of the endpoint this payload is posted to, relative to the API base.
    #[must_use]
    pub const fn endpoint(&self) -> &'static str {
        match self {
            Self::Chat(_) => "/chat/completions",
            Self::Legacy(_) => "/completions",
        }
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Other(String),
}

impl FinishReason {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ContentFilter => "content_filter",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for FinishReason {
    fn from(value: String) -> Self {
        match value.as_str() {
            "stop" => Self::Stop,
            "length" => Self::Length,
            "content_filter" => Self::ContentFilter,
            _ => Self::Other(value),
        }
    }
}

impl From<FinishReason> for String {
    fn from(value: FinishReason) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default)]
    pub param: serde_json::Value,
    #[serde(default)]
    pub code: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default, deserialize_with = "null_as_default")]
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ChoiceMessage>,
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub object: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub model: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub choices: Vec<Choice>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub usage: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl ResponseEnvelope {
    /// The service-reported error message, if one is present and non-empty.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error
            .as_ref()
            .map(|e| e.message.as_str())
            .filter(|m| !m.is_empty())
    }

    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created, 0)
    }

    #[must_use]
    pub fn first_choice(&self) -> Option<&Choice> {
        self.choices.first()
    }
}

/// Reply text and finish reason handed back to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub reply: String,
    pub finish_reason: Option<FinishReason>,
}

impl Completion {
    #[must_use]
    pub fn finish_reason_str(&self) -> &str {
        self.finish_reason.as_ref().map_or("", FinishReason::as_str)
    }
}
