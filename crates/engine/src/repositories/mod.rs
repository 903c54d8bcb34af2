//! Service wrappers around port traits.
//!
//! Use cases talk to these instead of raw ports when a port call needs
//! policy layered on top, such as a deadline.

pub mod llm;

pub use llm::{GenerationError, LlmService};
