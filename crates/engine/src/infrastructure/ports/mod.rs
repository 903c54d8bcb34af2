//! Port traits for infrastructure boundaries.
//!
//! These are the ONLY abstractions in the engine. Everything else is concrete types.
//! Ports exist for:
//! - Database access (conversations, NPC profiles, the message log)
//! - LLM calls (could swap Ollama -> any OpenAI-compatible or hosted provider)
//! - Clock (for testing)

mod error;
mod external;
mod repos;
mod testing;

// =============================================================================
// Repository Ports
// =============================================================================
pub use repos::{ConversationRepo, MessageRepo, NpcRepo};

// =============================================================================
// External Service Ports
// =============================================================================
pub use external::{FinishReason, LlmPort, LlmRequest, LlmResponse, TokenUsage};

// =============================================================================
// Test-Only Mock Repositories (only available during test builds)
// =============================================================================
#[cfg(test)]
pub use repos::{MockConversationRepo, MockMessageRepo, MockNpcRepo};

// =============================================================================
// Testing Ports
// =============================================================================
pub use testing::ClockPort;

// =============================================================================
// Error Types
// =============================================================================
pub use error::{LlmError, RepoError};
