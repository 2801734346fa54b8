use std::future::Future;

use gptbot_core::{
    CompletionError, CompletionSettings, CompletionTransport, RequestPayload, ResponseEnvelope,
    RetryPolicy,
};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry an async operation with linear backoff.
///
/// Attempt `n` (1-based) is preceded by a sleep of `(n - 1) * backoff_step`.
/// Non-retryable errors end the loop immediately; otherwise the error of the
/// final attempt is returned.
pub async fn retry_with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, CompletionError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, CompletionError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        if attempt > 1 {
            let delay = policy.delay_before(attempt);
            debug!("Waiting {}ms before attempt {attempt}", delay.as_millis());
            sleep(delay).await;
        }

        match operation(attempt).await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                warn!("Request failed (attempt {attempt}/{max_attempts}): {e}");
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        CompletionError::Configuration("retry policy allows no attempts".to_string())
    }))
}

/// Send `payload` until the service answers without an error message.
///
/// An envelope carrying a service-side error counts as a failed attempt and
/// comes back as [`CompletionError::Provider`] holding that envelope.
pub async fn send_with_retry(
    transport: &dyn CompletionTransport,
    settings: &CompletionSettings,
    payload: &RequestPayload,
) -> Result<ResponseEnvelope, CompletionError> {
    retry_with_backoff(&settings.retry, |attempt| async move {
        let envelope = transport.send(settings, payload, attempt).await?;
        match envelope.error_message() {
            None => Ok(envelope),
            Some(message) => Err(CompletionError::Provider {
                message: message.to_string(),
                envelope: Box::new(envelope),
            }),
        }
    })
    .await
}
