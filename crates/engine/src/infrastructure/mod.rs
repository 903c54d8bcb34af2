//! Infrastructure implementations.
//!
//! Contains port trait implementations for external dependencies.

pub mod clock;
pub mod config;
pub mod ollama;
pub mod ports;
pub mod resilient_llm;
pub mod sqlite;
