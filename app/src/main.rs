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

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod command;

use command::{
    ChatInput, ChatStrategy, CommandStrategy, InfoStrategy, InitStrategy, VersionStrategy,
};

#[derive(Parser)]
#[command(name = "gptbot")]
#[command(about = "gptbot conversational completion client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the configured model
    Chat {
        /// Single message to send
        #[arg(short = 'm', long)]
        message: Option<String>,

        /// User id owning the conversation history
        #[arg(short = 'u', long)]
        user: Option<String>,

        /// Model to use
        #[arg(short = 'M', long)]
        model: Option<String>,

        /// Send messages as assistant turns
        #[arg(long)]
        assistant: bool,
    },
    /// Initialize configuration
    Init,
    /// Show configuration
    Info,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Chat {
            message,
            user,
            model,
            assistant,
        } => {
            ChatStrategy
                .execute(ChatInput {
                    message,
                    user,
                    model,
                    assistant,
                })
                .await
        }
        Commands::Init => InitStrategy.execute(()).await,
        Commands::Info => InfoStrategy.execute(()).await,
        Commands::Version => VersionStrategy.execute(()).await,
    }
}
