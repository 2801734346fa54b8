use thiserror::Error;

use crate::payload::ResponseEnvelope;

/// Stage of a transport round-trip that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStage {
    Marshal,
    Request,
    Execute,
    ReadBody,
    Unmarshal,
}

impl std::fmt::Display for TransportStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Marshal => write!(f, "marshal request body"),
            Self::Request => write!(f, "build request"),
            Self::Execute => write!(f, "execute request"),
            Self::ReadBody => write!(f, "read response body"),
            Self::Unmarshal => write!(f, "unmarshal response body"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("transport error ({stage}): {message}")]
    Transport {
        stage: TransportStage,
        message: String,
    },

    #[error("provider error: {message}")]
    Provider {
        message: String,
        envelope: Box<ResponseEnvelope>,
    },
}

impl CompletionError {
    #[must_use]
    pub fn missing_api_key() -> Self {
        Self::Configuration("api key required".to_string())
    }

    pub fn transport(stage: TransportStage, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            stage,
            message: err.to_string(),
        }
    }

    /// Configuration errors are fatal to the call; everything else may
    /// succeed on another attempt.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::Configuration(_))
    }
}
