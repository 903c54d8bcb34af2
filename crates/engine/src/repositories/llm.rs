//! Text generation for NPC replies.

use std::sync::Arc;
use std::time::Duration;

use crate::infrastructure::ports::{FinishReason, LlmError, LlmPort, LlmRequest};

/// Default deadline for a single reply, retries included.
pub const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error(transparent)]
    Provider(#[from] LlmError),
    #[error("generation timed out after {0:?}")]
    TimedOut(Duration),
    #[error("model returned an empty reply")]
    EmptyReply,
}

/// Wraps the LLM port with a per-call deadline and trims the reply.
pub struct LlmService {
    llm: Arc<dyn LlmPort>,
    timeout: Duration,
}

impl LlmService {
    pub fn new(llm: Arc<dyn LlmPort>) -> Self {
        Self {
            llm,
            timeout: DEFAULT_LLM_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Turn one prompt into reply text.
    ///
    /// Fails on provider error, deadline expiry, or a blank reply.
    pub async fn complete(&self, prompt: String) -> Result<String, GenerationError> {
        let request = LlmRequest::from_prompt(prompt);

        let response = tokio::time::timeout(self.timeout, self.llm.generate(request))
            .await
            .map_err(|_| GenerationError::TimedOut(self.timeout))??;

        if let Some(usage) = &response.usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "LLM usage"
            );
        }
        if response.finish_reason == FinishReason::Length {
            tracing::warn!("LLM reply was cut off at the token limit");
        }

        let text = response.content.trim();
        if text.is_empty() {
            return Err(GenerationError::EmptyReply);
        }
        Ok(text.to_string())
    }
}
