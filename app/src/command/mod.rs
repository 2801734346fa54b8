//! Static strategy pattern for CLI commands.
//!
//! Each command is a separate strategy type with its own input, dispatched
//! statically from `main`.

use std::sync::Arc;

use gptbot_config::{Config, FileConfigSource};
use gptbot_conversation::{CompletionClient, InMemoryHistory};
use gptbot_core::{CompletionSettings, ConfigSource};
use gptbot_providers::OpenAiTransport;
use tracing::info;

mod chat;
mod info;
mod init;
mod version;

pub use chat::{ChatInput, ChatStrategy};
pub use info::InfoStrategy;
pub use init::InitStrategy;
pub use version::VersionStrategy;

/// Core trait defining the contract for all command strategies.
pub trait CommandStrategy: Send + Sync + 'static {
    /// The input type this strategy accepts.
    type Input;

    /// Execute the command with the given input.
    async fn execute(&self, input: Self::Input) -> anyhow::Result<()>;
}

/// File-backed settings with an optional model chosen on the command line.
struct ModelOverride {
    inner: FileConfigSource,
    model: Option<String>,
}

impl ConfigSource for ModelOverride {
    fn load(&self) -> anyhow::Result<CompletionSettings> {
        let mut settings = self.inner.load()?;
        if let Some(model) = &self.model {
            settings.model.clone_from(model);
        }
        Ok(settings)
    }
}

/// Wire up a client from the on-disk config.
///
/// Transport and history are sized once from the config loaded here; the
/// per-call settings are re-read from the same file on every completion.
fn build_client(model: Option<String>) -> anyhow::Result<CompletionClient> {
    let config = Config::load()?;
    info!("Loaded config from {}", Config::config_path()?.display());

    let transport = OpenAiTransport::with_timeout(config.openai.timeout())?
        .with_base_url(config.openai.base_url.clone());
    let history = InMemoryHistory::with_capacity(config.history.capacity);
    info!(
        "Completion service at {}, keeping {} turns per user",
        transport.base_url(),
        history.capacity()
    );
    let source = ModelOverride {
        inner: FileConfigSource::default_location()?,
        model,
    };

    Ok(CompletionClient::new(
        Arc::new(source),
        Arc::new(history),
        Arc::new(transport),
    ))
}
