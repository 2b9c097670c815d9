//! Nimbus SDK
//!
//! Shared library providing wire types, errors, and the chat service seam.
//! This crate is used by the engine and by the core tools (chat API and
//! weather intermediary).

/// Chat service handle and context types
pub mod context;

/// Error types and handling
pub mod errors;

/// Secret string wrapper
pub mod secret;

/// Tool envelope and chat wire types
pub mod types;

// Re-export commonly used types
pub use context::{ChatHandle, ChatHandleImpl, CoreContext, MAX_MESSAGE_CHARS};
pub use errors::{EngineError, NimbusErrorExt};
pub use secret::SecretString;
pub use types::{
    ChatMessage, ChatResponse, ConversationHistory, ForecastData, ForecastItem, HealthCheck,
    HistoryEntry, Suggestion, SuggestionPriority, SuggestionRequest, SuggestionResponse,
    ToolError, ToolInput, ToolOutput, ToolResultData, VectorStoreStats, WeatherData,
};
