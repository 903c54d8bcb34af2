//! External service port traits (LLM).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::LlmError;

/// A single-turn generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmRequest {
    /// Full instruction text, sent as one user turn.
    pub prompt: String,
}

impl LlmRequest {
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

/// Response from the LLM
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// The generated text content
    pub content: String,
    /// Finish reason
    pub finish_reason: FinishReason,
    /// Token usage
    pub usage: Option<TokenUsage>,
}

impl LlmResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finish_reason: FinishReason::Stop,
            usage: None,
        }
    }
}

/// Reason the generation finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    #[serde(other)]
    Unknown,
}

/// Token usage information
#[derive(Debug, Clone)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Opaque text-generation capability.
///
/// One call is one attempt; adapters that retry do so internally.
#[async_trait]
pub trait LlmPort: Send + Sync {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError>;
}
