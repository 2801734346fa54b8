use std::time::Duration;

use async_trait::async_trait;
use gptbot_core::{
    CompletionError, CompletionSettings, CompletionTransport, RequestPayload, ResponseEnvelope,
    TransportStage,
};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info, warn};

/// HTTP transport for the OpenAI completion endpoints.
///
/// The envelope is decoded whatever the status code: the service reports
/// failures such as rate limits inside the body, and those are left for the
/// caller to inspect through [`ResponseEnvelope::error_message`].
#[derive(Debug, Clone)]
pub struct OpenAiTransport {
    client: Client,
    base_url: String,
}

impl OpenAiTransport {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

    pub fn new() -> anyhow::Result<Self> {
        Self::with_timeout(Self::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> anyhow::Result<Self> {
        info!("Creating OpenAiTransport (timeout {}s)", timeout.as_secs());
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: Self::DEFAULT_BASE_URL.to_string(),
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint_url(&self, payload: &RequestPayload) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            payload.endpoint()
        )
    }
}

#[async_trait]
impl CompletionTransport for OpenAiTransport {
    async fn send(
        &self,
        settings: &CompletionSettings,
        payload: &RequestPayload,
        attempt: u32,
    ) -> Result<ResponseEnvelope, CompletionError> {
        if !settings.has_api_key() {
            return Err(CompletionError::missing_api_key());
        }

        let body = serde_json::to_vec(payload)
            .map_err(|e| CompletionError::transport(TransportStage::Marshal, e))?;
        debug!(
            "Completion request({attempt}) json: {}",
            String::from_utf8_lossy(&body)
        );

        let request = self
            .client
            .post(self.endpoint_url(payload))
            .header(CONTENT_TYPE, "application/json")
            .bearer_auth(&settings.api_key)
            .body(body)
            .build()
            .map_err(|e| CompletionError::transport(TransportStage::Request, e))?;

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| CompletionError::transport(TransportStage::Execute, e))?;
        let status = response.status();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CompletionError::transport(TransportStage::ReadBody, e))?;
        debug!(
            "Completion response({attempt}) status {status} json: {}",
            String::from_utf8_lossy(&bytes)
        );

        let envelope: ResponseEnvelope = serde_json::from_slice(&bytes)
            .map_err(|e| CompletionError::transport(TransportStage::Unmarshal, e))?;

        if let Some(created) = envelope.created_at().filter(|_| envelope.created > 0) {
            debug!("Response {} created at {created}", envelope.id);
        }

        if let Some(message) = envelope.error_message() {
            warn!("Completion service returned {status} on attempt {attempt}: {message}");
        }

        Ok(envelope)
    }
}
