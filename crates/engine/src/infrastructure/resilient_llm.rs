//! Retrying wrapper around any [`LlmPort`].
//!
//! Transient provider failures are retried with exponential backoff and
//! jitter. The default policy makes a single attempt; deployments opt in to
//! retries through `LLM_MAX_RETRIES`. The caller's overall timeout still
//! bounds the whole sequence.

use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

use crate::infrastructure::ports::{LlmError, LlmPort, LlmRequest, LlmResponse};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt. 0 means exactly one call.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay_ms: u64,
    /// Cap for exponential growth.
    pub max_delay_ms: u64,
    /// Fraction of the delay randomized in both directions (0.0-1.0).
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 500,
            max_delay_ms: 8000,
            jitter_factor: 0.2,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Backoff before retry number `attempt` (1-based): base * 2^(attempt-1), capped.
    fn delay_ms(&self, attempt: u32) -> u64 {
        let exponential = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
        let capped = exponential.min(self.max_delay_ms);

        let jitter_range = (capped as f64 * self.jitter_factor) as i64;
        if jitter_range > 0 {
            let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
            (capped as i64 + jitter).max(0) as u64
        } else {
            capped
        }
    }
}

/// Client errors (bad request, bad credentials) will fail the same way again.
fn is_retryable(error: &LlmError) -> bool {
    match error {
        LlmError::RequestFailed(msg) => !["400", "401", "403", "404"]
            .iter()
            .any(|status| msg.contains(status)),
        LlmError::InvalidResponse(_) => true,
    }
}

pub struct ResilientLlmClient {
    inner: Arc<dyn LlmPort>,
    config: RetryConfig,
}

impl ResilientLlmClient {
    pub fn new(inner: Arc<dyn LlmPort>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl LlmPort for ResilientLlmClient {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let mut attempt = 0;
        loop {
            let error = match self.inner.generate(request.clone()).await {
                Ok(response) => {
                    if attempt > 0 {
                        tracing::info!(attempt = attempt + 1, "LLM request succeeded after retry");
                    }
                    return Ok(response);
                }
                Err(e) => e,
            };

            if !is_retryable(&error) {
                tracing::warn!(error = %error, "LLM request failed with non-retryable error");
                return Err(error);
            }
            if attempt >= self.config.max_retries {
                if self.config.max_retries > 0 {
                    tracing::warn!(
                        attempts = attempt + 1,
                        error = %error,
                        "LLM request failed after all retry attempts"
                    );
                }
                return Err(error);
            }

            attempt += 1;
            let delay = self.config.delay_ms(attempt);
            tracing::debug!(
                attempt,
                max_retries = self.config.max_retries,
                delay_ms = delay,
                error = %error,
                "LLM request failed, retrying"
            );
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }
}
