use gptbot_config::Config;

/// Strategy for initializing the configuration at `~/gptbot/config.json`.
#[derive(Debug, Clone, Copy)]
pub struct InitStrategy;

impl super::CommandStrategy for InitStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let config_path = Config::create_config()?;

        println!("✅ Created config file at: {}", config_path.display());
        println!();
        println!("📝 Next steps:");
        println!("   1. Edit the config file and add your OpenAI API key");
        println!("      (or export GPTBOT_API_KEY)");
        println!("   2. Run 'gptbot chat' to start a conversation");
        println!();
        println!("🔧 Configuration options:");
        println!("   - model.name: gpt-3.5-turbo-0301 uses chat messages, others a flat prompt");
        println!("   - retry.max_attempts / retry.backoff_step_ms: retry budget and linear step");
        println!("   - history.capacity: turns kept per user for chat models");
        println!();
        Ok(())
    }
}
