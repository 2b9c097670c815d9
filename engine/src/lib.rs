//! Nimbus Engine Library
//!
//! This library provides the core functionality of the Nimbus weather assistant.
//! It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Secret management module
pub mod secrets;

/// LLM provider abstraction layer
pub mod llm;

/// Weather tools offered to the model
pub mod tools;

/// Semantic store for past queries
pub mod semantic;

/// Conversation agent module
pub mod agent;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
