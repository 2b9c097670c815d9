//! Chat handle and context types
//!
//! This module defines the CoreContext handed to the chat HTTP surface and the
//! ChatHandle that gives it controlled access to the conversation engine.

use crate::errors::EngineError;
use crate::types::{ChatResponse, HealthCheck, HistoryEntry, SuggestionResponse};
use async_trait::async_trait;
use std::sync::Arc;

/// Longest accepted chat message, in characters
pub const MAX_MESSAGE_CHARS: usize = 1000;

/// Context provided to core tools for engine interaction.
///
/// CoreContext is the sole API surface for core tools to interact with the
/// engine. It exposes specific operations through handles without revealing
/// internal engine state.
#[derive(Clone)]
pub struct CoreContext {
    /// Handle for conversation operations
    pub chat: ChatHandle,
}

impl CoreContext {
    /// Create a new CoreContext
    pub fn new(chat: ChatHandle) -> Self {
        Self { chat }
    }
}

/// Handle for conversation operations
///
/// Validates inbound messages before they reach the engine.
#[derive(Clone)]
pub struct ChatHandle {
    inner: Arc<dyn ChatHandleImpl>,
}

impl ChatHandle {
    /// Create a new ChatHandle with the given implementation
    pub fn new(inner: Arc<dyn ChatHandleImpl>) -> Self {
        Self { inner }
    }

    /// Submit one user message and run a full conversation turn.
    ///
    /// Returns `EngineError::Validation` for empty or oversized messages
    /// without touching the engine.
    pub async fn submit_message(
        &self,
        message: &str,
        session_id: &str,
        use_context: bool,
    ) -> Result<ChatResponse, EngineError> {
        if message.trim().is_empty() {
            return Err(EngineError::Validation(
                "Message cannot be empty".to_string(),
            ));
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(EngineError::Validation(format!(
                "Message exceeds {} characters",
                MAX_MESSAGE_CHARS
            )));
        }
        Ok(self
            .inner
            .submit_message(message, session_id, use_context)
            .await)
    }

    /// Visible history for a session
    pub async fn history(&self, session_id: &str) -> Vec<HistoryEntry> {
        self.inner.history(session_id).await
    }

    /// Drop all history for a session
    pub async fn clear_history(&self, session_id: &str) {
        self.inner.clear_history(session_id).await
    }

    /// Probe engine dependencies
    pub async fn health(&self) -> HealthCheck {
        self.inner.health().await
    }

    /// Weather-driven suggestions for a city
    pub async fn suggestions(&self, city: &str, context: Option<&str>) -> SuggestionResponse {
        self.inner.suggestions(city, context).await
    }
}

/// Trait for chat handle implementation (to be implemented by engine)
#[async_trait]
pub trait ChatHandleImpl: Send + Sync {
    /// Run one conversation turn. Never fails; errors become apologetic text.
    async fn submit_message(
        &self,
        message: &str,
        session_id: &str,
        use_context: bool,
    ) -> ChatResponse;

    /// Session history without the system preamble
    async fn history(&self, session_id: &str) -> Vec<HistoryEntry>;

    /// Drop a session's history
    async fn clear_history(&self, session_id: &str);

    /// Dependency health
    async fn health(&self) -> HealthCheck;

    /// Weather-driven suggestions
    async fn suggestions(&self, city: &str, context: Option<&str>) -> SuggestionResponse;
}
