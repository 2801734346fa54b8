use std::path::PathBuf;

use gptbot_core::{CompletionSettings, ConfigSource};

use crate::Config;

/// Re-reads the config file on every load, so edits apply to the next call.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Source for `~/gptbot/config.json`.
    pub fn default_location() -> anyhow::Result<Self> {
        Ok(Self::new(Config::config_path()?))
    }
}

impl ConfigSource for FileConfigSource {
    fn load(&self) -> anyhow::Result<CompletionSettings> {
        Ok(Config::load_from(&self.path)?.to_settings())
    }
}
