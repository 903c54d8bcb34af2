//! NPC chat engine library.
//!
//! Routes player and NPC messages inside a conversation, keeps each NPC's
//! view of the conversation private, and asks the LLM for in-character
//! replies.
//!
//! ## Structure
//!
//! - `use_cases/` - Message sending, NPC replies, context assembly, reads
//! - `repositories/` - Policy wrappers around ports (LLM deadline)
//! - `infrastructure/` - Ports plus SQLite, LLM, clock and config adapters
//! - `api/` - HTTP entry points
//! - `app` - Application composition

pub mod api;
pub mod app;
pub mod infrastructure;
pub mod repositories;
pub mod use_cases;

/// Shared fakes for unit tests.
#[cfg(test)]
pub mod test_fixtures;

pub use app::App;
