use std::future::Future;
use std::time::Duration;

use tracing::warn;

use agentflow_core::config::RetryConfig;
use agentflow_core::error::{FlowError, Result};

/// Whether a failed request is worth repeating.
pub fn is_retryable(e: &FlowError) -> bool {
    match e {
        FlowError::Backend(msg) => {
            msg.contains("HTTP 429")
                || msg.contains("HTTP 500")
                || msg.contains("HTTP 502")
                || msg.contains("HTTP 503")
                || msg.contains("HTTP 504")
                || msg.contains("timeout")
                || msg.contains("connection")
        }
        _ => false,
    }
}

pub fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let ms = config
        .initial_backoff_ms
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(config.max_backoff_ms);
    // Jitter: 0.8x to 1.2x
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((ms as f64 * jitter) as u64)
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// retry budget is spent. Only use for idempotent requests.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_retries = config.max_retries;
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if is_retryable(&e) && attempt < max_retries => {
                let backoff = calculate_backoff(attempt, config);
                warn!(
                    request = label,
                    attempt = attempt + 1,
                    max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Retrying backend request"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
