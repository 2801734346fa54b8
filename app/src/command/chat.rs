//! Multi-turn chat command.
//!
//! History lives for the lifetime of the process, so context carries across
//! turns of one interactive session only.

use gptbot_core::Origin;
use tracing::{debug, info};
use uuid::Uuid;

use super::build_client;

/// Input parameters for the Chat command strategy.
#[derive(Debug, Clone)]
pub struct ChatInput {
    /// Optional single message to send (non-interactive mode)
    pub message: Option<String>,
    /// Conversation owner; a fresh id when absent
    pub user: Option<String>,
    /// Optional model override
    pub model: Option<String>,
    /// Send messages as assistant turns instead of user turns
    pub assistant: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ChatStrategy;

impl super::CommandStrategy for ChatStrategy {
    type Input = ChatInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let client = build_client(input.model)?;
        let user_id = input
            .user
            .unwrap_or_else(|| format!("cli:{}", Uuid::now_v7()));
        let origin = if input.assistant {
            Origin::Assistant
        } else {
            Origin::User
        };

        info!("Starting conversation for {user_id}");

        if let Some(msg) = input.message {
            let completion = client.completions(&user_id, &msg, origin).await?;
            println!("{}", completion.reply.trim());
            debug!("Finish reason: {}", completion.finish_reason_str());
        } else {
            client.run_interactive(&user_id, origin).await?;
        }

        Ok(())
    }
}
