//! Completion client for multi-turn dialogue.
//!
//! `CompletionClient` is the entry point a front end calls once per incoming
//! message. It reads settings, builds the request for the configured model
//! family, drives the retrying transport and extracts the reply.

use std::io::Write;
use std::sync::Arc;

use gptbot_core::{
    Completion, CompletionError, CompletionSettings, CompletionTransport, ConfigSource,
    HistoryStore, Origin,
};
use gptbot_providers::send_with_retry;
use tracing::{debug, info, warn};

use crate::history::HistoryStats;

#[derive(Clone)]
pub struct CompletionClient {
    config: Arc<dyn ConfigSource>,
    history: Arc<dyn HistoryStore>,
    transport: Arc<dyn CompletionTransport>,
}

impl CompletionClient {
    pub fn new(
        config: Arc<dyn ConfigSource>,
        history: Arc<dyn HistoryStore>,
        transport: Arc<dyn CompletionTransport>,
    ) -> Self {
        Self {
            config,
            history,
            transport,
        }
    }

    /// Produce a reply for `message` from `user_id`.
    ///
    /// The request is built once, so history is recorded at most once no
    /// matter how many attempts follow. When every attempt ends in a
    /// service-side error the last envelope is still extracted and an empty
    /// completion returned, unless the retry policy asks for the error.
    pub async fn completions(
        &self,
        user_id: &str,
        message: &str,
        origin: Origin,
    ) -> Result<Completion, CompletionError> {
        let settings = self.load_settings()?;
        let family = settings.family();
        let strategy = family.strategy();

        info!(
            "Completion for {user_id} with model {} ({family} family)",
            settings.model
        );

        let payload = strategy
            .build_payload(self.history.as_ref(), user_id, message, origin, &settings)
            .await;

        let envelope = match send_with_retry(self.transport.as_ref(), &settings, &payload).await {
            Ok(envelope) => envelope,
            Err(CompletionError::Provider { message, envelope })
                if !settings.retry.surface_provider_errors =>
            {
                warn!("Attempts exhausted with provider error, returning its content: {message}");
                *envelope
            }
            Err(e) => {
                warn!("Completion for {user_id} failed: {e}");
                return Err(e);
            }
        };

        let completion = strategy.extract_reply(&envelope);
        debug!(
            "Completion for {user_id} finished ({}), {} chars",
            completion.finish_reason_str(),
            completion.reply.chars().count()
        );
        Ok(completion)
    }

    /// Run an interactive loop on stdin/stdout for a single user.
    pub async fn run_interactive(&self, user_id: &str, origin: Origin) -> anyhow::Result<()> {
        println!("=== Conversation: {user_id} ===");
        println!("Type 'exit', 'quit', or Ctrl+C to end, '/history' to show stored turns.\n");

        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let mut input = String::new();
            if std::io::stdin().read_line(&mut input)? == 0 {
                break;
            }
            let input = input.trim();

            if matches!(input, "exit" | "quit" | "q") {
                break;
            }

            if input.is_empty() {
                continue;
            }

            if input == "/history" {
                self.print_history(user_id).await;
                continue;
            }

            match self.completions(user_id, input, origin).await {
                Ok(completion) => {
                    println!("\n{}\n", completion.reply.trim());
                    debug!("Finish reason: {}", completion.finish_reason_str());
                }
                Err(e) => {
                    eprintln!("Error: {e}");
                }
            }
        }

        let stats = HistoryStats::of(&self.history.read(user_id).await);
        println!("\nSession ended. Stored turns: {}", stats.total_messages);
        Ok(())
    }

    async fn print_history(&self, user_id: &str) {
        let turns = self.history.read(user_id).await;
        for turn in &turns {
            println!("[{}] {}", turn.role, turn.content);
        }
        let stats = HistoryStats::of(&turns);
        println!(
            "({} turns, {} user, {} assistant, ~{} tokens)",
            stats.total_messages,
            stats.user_messages,
            stats.assistant_messages,
            stats.estimated_tokens
        );
    }

    /// Settings for this call; a missing API key fails before anything is
    /// recorded or sent.
    fn load_settings(&self) -> Result<CompletionSettings, CompletionError> {
        let settings = self
            .config
            .load()
            .map_err(|e| CompletionError::Configuration(format!("{e:#}")))?;
        if !settings.has_api_key() {
            return Err(CompletionError::missing_api_key());
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::InMemoryHistory;
    use async_trait::async_trait;
    use gptbot_core::{
        ChatMessage, Choice, ChoiceMessage, ErrorDetail, FinishReason, ModelFamily,
        RequestPayload, ResponseEnvelope, RetryPolicy, StaticConfig, TransportStage,
    };
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    type Outcome = Result<ResponseEnvelope, CompletionError>;

    /// Plays back a fixed list of outcomes and remembers what it was sent.
    struct ScriptedTransport {
        outcomes: Mutex<VecDeque<Outcome>>,
        calls: Mutex<Vec<(Instant, u32, RequestPayload)>>,
    }

    impl ScriptedTransport {
        fn new(outcomes: Vec<Outcome>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionTransport for ScriptedTransport {
        async fn send(
            &self,
            _settings: &CompletionSettings,
            payload: &RequestPayload,
            attempt: u32,
        ) -> Result<ResponseEnvelope, CompletionError> {
            self.calls
                .lock()
                .unwrap()
                .push((Instant::now(), attempt, payload.clone()));
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| transport_error("script exhausted"))
        }
    }

    struct BrokenConfig;

    impl ConfigSource for BrokenConfig {
        fn load(&self) -> anyhow::Result<CompletionSettings> {
            anyhow::bail!("config file not found")
        }
    }

    fn settings(model: &str) -> CompletionSettings {
        CompletionSettings {
            api_key: "sk-test".to_string(),
            model: model.to_string(),
            max_tokens: 128,
            temperature: 0.5,
            ..CompletionSettings::default()
        }
    }

    fn chat_reply(content: &str) -> Outcome {
        Ok(ResponseEnvelope {
            choices: vec![Choice {
                message: Some(ChoiceMessage {
                    role: "assistant".to_string(),
                    content: Some(content.to_string()),
                }),
                finish_reason: Some(FinishReason::Stop),
                ..Choice::default()
            }],
            ..ResponseEnvelope::default()
        })
    }

    fn provider_error(message: &str) -> Outcome {
        Ok(ResponseEnvelope {
            error: Some(ErrorDetail {
                message: message.to_string(),
                ..ErrorDetail::default()
            }),
            ..ResponseEnvelope::default()
        })
    }

    fn transport_error(message: &str) -> Outcome {
        Err(CompletionError::transport(TransportStage::Execute, message))
    }

    fn client(
        settings: CompletionSettings,
        transport: &Arc<ScriptedTransport>,
    ) -> (CompletionClient, Arc<InMemoryHistory>) {
        let history = Arc::new(InMemoryHistory::new());
        let client = CompletionClient::new(
            Arc::new(StaticConfig::new(settings)),
            history.clone(),
            transport.clone(),
        );
        (client, history)
    }

    #[tokio::test]
    async fn test_chat_reply_on_first_attempt() {
        let transport = ScriptedTransport::new(vec![chat_reply("Hello!")]);
        let (client, history) = client(settings(ModelFamily::CHAT_MODEL), &transport);

        let completion = client.completions("alice", "hi", Origin::User).await.unwrap();

        assert_eq!(completion.reply, "Hello!");
        assert_eq!(completion.finish_reason_str(), "stop");
        assert_eq!(transport.call_count(), 1);

        let stored = history.read("alice").await;
        assert_eq!(stored, vec![ChatMessage::user("hi")]);
        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls[0].2.messages(), Some(&stored));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_with_linear_backoff_then_succeeds() {
        let transport = ScriptedTransport::new(vec![
            transport_error("connection reset"),
            transport_error("connection reset"),
            chat_reply("third time lucky"),
            chat_reply("never requested"),
        ]);
        let (client, history) = client(settings(ModelFamily::CHAT_MODEL), &transport);
        let start = Instant::now();

        let completion = client.completions("bob", "ping", Origin::User).await.unwrap();

        assert_eq!(completion.reply, "third time lucky");
        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        let offsets: Vec<Duration> = calls.iter().map(|(at, _, _)| *at - start).collect();
        assert_eq!(
            offsets,
            vec![
                Duration::ZERO,
                Duration::from_millis(100),
                Duration::from_millis(300),
            ]
        );
        let attempts: Vec<u32> = calls.iter().map(|(_, attempt, _)| *attempt).collect();
        assert_eq!(attempts, vec![1, 2, 3]);
        assert!(calls.iter().all(|(_, _, payload)| payload == &calls[0].2));
        drop(calls);
        assert_eq!(history.len("bob").await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_errors_exhaust_into_empty_reply() {
        let transport = ScriptedTransport::new(vec![
            provider_error("Rate limit reached"),
            provider_error("Rate limit reached"),
            provider_error("Rate limit reached"),
        ]);
        let (client, _history) = client(settings(ModelFamily::CHAT_MODEL), &transport);

        let completion = client.completions("carol", "hello", Origin::User).await.unwrap();

        assert_eq!(completion, Completion::default());
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_errors_surface_when_configured() {
        let transport = ScriptedTransport::new(vec![
            provider_error("The model does not exist"),
            provider_error("The model does not exist"),
            provider_error("The model does not exist"),
        ]);
        let mut settings = settings(ModelFamily::CHAT_MODEL);
        settings.retry.surface_provider_errors = true;
        let (client, _history) = client(settings, &transport);

        let err = client
            .completions("dave", "hello", Origin::User)
            .await
            .unwrap_err();

        assert!(matches!(err, CompletionError::Provider { .. }));
        assert!(err.to_string().contains("The model does not exist"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_errors_exhaust_into_last_error() {
        let transport = ScriptedTransport::new(vec![
            transport_error("first"),
            transport_error("second"),
            transport_error("third"),
        ]);
        let (client, _history) = client(settings("text-davinci-003"), &transport);

        let err = client
            .completions("erin", "hello", Origin::User)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("third"));
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_attempt_decides_outcome() {
        let transport = ScriptedTransport::new(vec![
            transport_error("timed out"),
            provider_error("overloaded"),
            provider_error("overloaded"),
        ]);
        let (client, _history) = client(settings(ModelFamily::CHAT_MODEL), &transport);

        let completion = client.completions("frank", "hello", Origin::User).await;

        assert_eq!(completion.unwrap(), Completion::default());
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_without_side_effects() {
        let transport = ScriptedTransport::new(vec![chat_reply("unused")]);
        let mut settings = settings(ModelFamily::CHAT_MODEL);
        settings.api_key.clear();
        let (client, history) = client(settings, &transport);

        let err = client
            .completions("gina", "hello", Origin::User)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("api key required"));
        assert_eq!(transport.call_count(), 0);
        assert!(history.read("gina").await.is_empty());
    }

    #[tokio::test]
    async fn test_config_load_failure_is_configuration_error() {
        let transport = ScriptedTransport::new(vec![]);
        let client = CompletionClient::new(
            Arc::new(BrokenConfig),
            Arc::new(InMemoryHistory::new()),
            transport.clone(),
        );

        let err = client
            .completions("hank", "hello", Origin::User)
            .await
            .unwrap_err();

        assert!(matches!(err, CompletionError::Configuration(_)));
        assert!(err.to_string().contains("config file not found"));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_legacy_model_sends_prompt_only() {
        let transport = ScriptedTransport::new(vec![Ok(ResponseEnvelope {
            choices: vec![Choice {
                text: Some("\n\na song".to_string()),
                finish_reason: Some(FinishReason::Length),
                ..Choice::default()
            }],
            ..ResponseEnvelope::default()
        })]);
        let (client, history) = client(settings("text-davinci-003"), &transport);

        let completion = client
            .completions("ivy", "give me a good song", Origin::User)
            .await
            .unwrap();

        assert_eq!(completion.reply, "\n\na song");
        assert_eq!(completion.finish_reason, Some(FinishReason::Length));
        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls[0].2.prompt(), Some("give me a good song"));
        assert!(calls[0].2.messages().is_none());
        drop(calls);
        assert!(history.read("ivy").await.is_empty());
    }

    #[tokio::test]
    async fn test_assistant_origin_reads_without_recording() {
        let transport = ScriptedTransport::new(vec![chat_reply("ok")]);
        let (client, history) = client(settings(ModelFamily::CHAT_MODEL), &transport);
        history.record("jo", ChatMessage::user("earlier")).await;

        client
            .completions("jo", "from the bot", Origin::Assistant)
            .await
            .unwrap();

        let calls = transport.calls.lock().unwrap();
        assert_eq!(
            calls[0].2.messages(),
            Some(&vec![
                ChatMessage::user("earlier"),
                ChatMessage::assistant("from the bot"),
            ])
        );
        drop(calls);
        assert_eq!(history.read("jo").await, vec![ChatMessage::user("earlier")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_retry_policy_is_honoured() {
        let transport = ScriptedTransport::new(vec![
            transport_error("a"),
            transport_error("b"),
            transport_error("c"),
            transport_error("d"),
            chat_reply("fifth"),
        ]);
        let mut settings = settings(ModelFamily::CHAT_MODEL);
        settings.retry = RetryPolicy {
            max_attempts: 5,
            backoff_step: Duration::from_millis(10),
            surface_provider_errors: false,
        };
        let (client, _history) = client(settings, &transport);
        let start = Instant::now();

        let completion = client.completions("kim", "hi", Origin::User).await.unwrap();

        assert_eq!(completion.reply, "fifth");
        assert_eq!(transport.call_count(), 5);
        assert_eq!(start.elapsed(), Duration::from_millis(100));
    }
}
