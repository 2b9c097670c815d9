//! Error types and handling
//!
//! This module provides the error types used throughout Nimbus.
//! All errors implement the `NimbusErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! # Security
//!
//! Error messages never carry API keys. Provider URLs embed the weather API key
//! as a query parameter, so network errors are stripped of their URL before
//! they are wrapped here.

use thiserror::Error;

/// Trait for Nimbus error extensions
///
/// This trait provides additional context for errors, including user-friendly
/// hints and recoverability information. All engine errors implement this trait.
pub trait NimbusErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and does not contain secrets
    /// or internal implementation details.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried or worked around. Non-recoverable
    /// errors typically require a configuration change and a restart.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: Invalid or missing configuration
/// - **Validation**: Rejected user input (empty message, missing city)
/// - **LLM Provider**: Completion endpoint failures and timeouts
/// - **Network**: Weather intermediary or upstream transport failures
/// - **Tool**: Unknown tools and tool execution failures
/// - **Semantic Store**: Similarity index read/write failures
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, NimbusErrorExt};
///
/// let error = EngineError::Validation("Message cannot be empty".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(error.is_recoverable());
///
/// let fatal_error = EngineError::Config("bad provider".to_string());
/// assert!(!fatal_error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Input validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    // LLM provider errors
    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    #[error("LLM call timed out")]
    LLMTimeout,

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // Tool errors
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool error: {0}")]
    ToolError(String),

    // Semantic store errors
    #[error("Semantic store error: {0}")]
    SemanticStore(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl NimbusErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",
            Self::Validation(_) => "Check your input and try again",
            Self::LLMProvider(_) => "LLM provider unavailable. Check your API key and network",
            Self::LLMTimeout => "LLM provider took too long to respond. Try again",
            Self::Network(_) => "Weather service unreachable. Check that it is running",
            Self::ToolNotFound(_) => "The requested tool is not available",
            Self::ToolError(_) => "Tool operation failed",
            Self::SemanticStore(_) => "Conversation context is unavailable right now",
            Self::Serialization(_) => "Received malformed data",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Config(_))
    }
}
