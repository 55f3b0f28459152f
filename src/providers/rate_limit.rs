use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use crate::core::errors::{AppError, AppResult};

const RATE_LIMIT_MARKERS: &[&str] = &["429", "RESOURCE_EXHAUSTED", "ResourceExhausted"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            delay: Duration::from_secs(5),
        }
    }
}

pub fn is_rate_limit_error(err: &AppError) -> bool {
    if matches!(err, AppError::ProviderRateLimited) {
        return true;
    }
    let message = err.to_string();
    RATE_LIMIT_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

/// Runs `call`, re-issuing it after `policy.delay` while it fails with a
/// rate-limit error and retries remain. `on_retry` sees the 1-based attempt
/// about to be retried.
pub async fn with_rate_limit_retry<T, F, Fut, R>(
    policy: RetryPolicy,
    mut call: F,
    mut on_retry: R,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
    R: FnMut(usize),
{
    let attempts = policy.max_retries + 1;
    for attempt in 1..=attempts {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if !is_rate_limit_error(&err) => return Err(err),
            Err(err) if attempt < attempts => {
                warn!(
                    attempt,
                    attempts,
                    delay_ms = policy.delay.as_millis() as u64,
                    "rate limited by model provider, retrying: {err}"
                );
                on_retry(attempt);
                tokio::time::sleep(policy.delay).await;
            }
            Err(err) => {
                error!(attempts, "model provider rate limit retry exhausted: {err}");
                return Err(AppError::RateLimitExhausted);
            }
        }
    }
    Err(AppError::RateLimitExhausted)
}
