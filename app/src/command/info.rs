use gptbot_config::Config;

/// Strategy for displaying configuration information.
///
/// Prints the effective configuration (file plus environment overrides)
/// with the API key masked.
#[derive(Debug, Clone, Copy)]
pub struct InfoStrategy;

impl super::CommandStrategy for InfoStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;
        let settings = config.to_settings();

        println!("=== gptbot Configuration ===\n");

        println!("OpenAI:");
        println!("  API Key: {}", mask_api_key(&config.openai.api_key));
        println!("  Base URL: {}", config.openai.base_url);
        println!("  Timeout: {}s", config.openai.timeout_secs);
        println!();

        println!("Model:");
        println!("  Name: {}", config.model.name);
        println!("  Family: {}", settings.family());
        println!("  Max Tokens: {}", config.model.max_tokens);
        println!("  Temperature: {}", config.model.temperature);
        println!();

        println!("Retry:");
        println!("  Max Attempts: {}", config.retry.max_attempts);
        println!("  Backoff Step: {}ms", config.retry.backoff_step_ms);
        println!(
            "  Surface Provider Errors: {}",
            config.retry.surface_provider_errors
        );
        println!();

        println!("History:");
        println!("  Capacity: {} turns per user", config.history.capacity);

        Ok(())
    }
}

fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.is_empty() {
        "(not set)".to_string()
    } else if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "***".to_string()
    }
}
