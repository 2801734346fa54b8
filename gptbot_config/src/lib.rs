//! Configuration loading for gptbot.

mod schema;
mod source;

pub use schema::{
    API_KEY_ENV, Config, HistoryConfig, MODEL_ENV, ModelConfig, OpenAiConfig, RetryConfig,
};
pub use source::FileConfigSource;
