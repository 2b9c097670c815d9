//! LLM Provider Abstraction Layer
//!
//! This module provides a common interface for the completion endpoints the
//! assistant can talk to (Groq and OpenAI through the OpenAI-compatible
//! provider, Ollama natively). A provider receives the conversation and an
//! optional tool schema and answers with either text or tool calls, never both.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

use crate::config::LLMConfig;
use crate::secrets::SecretManager;
use crate::tools::ToolArguments;
use sdk::errors::EngineError;

pub mod ollama;
pub mod openai;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<LLMError> for EngineError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::Timeout => EngineError::LLMTimeout,
            other => EngineError::LLMProvider(other.to_string()),
        }
    }
}

/// Message in a conversation history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Role of the message sender
    pub role: MessageRole,

    /// Content of the message
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

/// Response from an LLM provider
#[derive(Debug, Clone, PartialEq)]
pub enum LLMResponse {
    /// The model answered in plain text
    FinalAnswer(String),

    /// The model asked for one or more tools (never empty)
    ToolCalls(Vec<ToolCall>),
}

/// Tool call request from the LLM
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    /// Identifier assigned by the provider (or generated for text tool calls)
    pub id: String,

    /// Name of the tool to call
    pub name: String,

    /// Arguments exactly as the provider reported them
    pub arguments: ToolArguments,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: ToolArguments) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    fn generated_id() -> String {
        format!("call_{}", uuid::Uuid::new_v4())
    }
}

/// A function the model may call, in JSON-schema form
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    /// Render in the OpenAI function-calling format (also accepted by Ollama)
    pub fn to_openai_format(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// LLM Provider trait that all providers must implement
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "groq", "openai", "ollama")
    fn name(&self) -> &str;

    /// Returns true if this is a local provider (e.g., Ollama)
    fn is_local(&self) -> bool;

    /// Generate a response from the LLM
    ///
    /// # Arguments
    /// * `messages` - Conversation history including the system preamble
    /// * `tools` - Tool schema offered to the model; `None` disables tool calls
    ///
    /// # Returns
    /// * `Ok(LLMResponse)` - Either text or a non-empty list of tool calls
    /// * `Err(LLMError)` - If the request fails
    async fn generate(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<LLMResponse>;

    /// Check if the provider is currently usable.
    /// Default implementation returns true.
    async fn check_health(&self) -> bool {
        true
    }
}

/// Build the provider selected by `config.provider`.
///
/// # Errors
/// Returns `EngineError::Config` when a cloud provider's API key is missing
pub fn create_provider(
    config: &LLMConfig,
    secrets: &SecretManager,
) -> std::result::Result<Arc<dyn LLMProvider>, EngineError> {
    let endpoint = config.active_endpoint();

    let provider: Arc<dyn LLMProvider> = match config.provider.as_str() {
        "ollama" => Arc::new(ollama::OllamaProvider::new(
            &endpoint.base_url,
            &endpoint.model,
            config.temperature,
            config.max_tokens,
        )),
        name => {
            let key_var = SecretManager::provider_key_var(name).ok_or_else(|| {
                EngineError::Config(format!("Unsupported provider '{}'", name))
            })?;
            Arc::new(openai::OpenAICompatProvider::new(
                name,
                &endpoint.base_url,
                &endpoint.model,
                secrets.get_secret(key_var)?,
                config.temperature,
                config.max_tokens,
            ))
        }
    };

    tracing::info!(
        "Using LLM provider '{}' with model '{}'",
        provider.name(),
        endpoint.model
    );
    Ok(provider)
}

/// Helper function to parse tool calls from string content.
///
/// Some models write tool calls as text instead of using the structured
/// field. Handles:
/// 1. Raw JSON: `{"name": "...", "arguments": {...}}` (`function` accepted for `name`)
/// 2. Fenced JSON (with or without trailing text)
/// 3. `<tool_call>{...}</tool_call>` or `<tool_call>name({...})</tool_call>` markers
/// 4. JSON embedded in prose
pub fn parse_tool_calls(content: &str) -> Option<ToolCall> {
    let trimmed = content.trim();

    // Pattern 1: Raw JSON
    if let Some(tc) = try_parse_function_json(trimmed) {
        return Some(tc);
    }

    // Pattern 2: Markdown code fences
    if let Some(inner) = extract_fenced_json(trimmed) {
        if let Some(tc) = try_parse_function_json(inner.trim()) {
            return Some(tc);
        }
    }

    // Pattern 3: <tool_call> markers
    if let Some(start) = trimmed.find("<tool_call>") {
        if let Some(end) = trimmed[start..].find("</tool_call>") {
            let inner = trimmed[start + 11..start + end].trim();
            if let Some(tc) = try_parse_function_json(inner) {
                return Some(tc);
            }
            if let Some(paren_pos) = inner.find('(') {
                let tool_name = inner[..paren_pos].trim();
                let args_end = inner.rfind(')').unwrap_or(inner.len());
                if !tool_name.is_empty() && args_end > paren_pos {
                    let arguments = inner[paren_pos + 1..args_end].trim();
                    return Some(ToolCall::new(
                        ToolCall::generated_id(),
                        tool_name,
                        ToolArguments::from_text(arguments),
                    ));
                }
            }
        }
    }

    // Pattern 4: JSON object embedded in prose
    for key in ["{\"name\"", "{\"function\""] {
        if let Some(pos) = trimmed.find(key) {
            if let Some(json_str) = extract_balanced_json(&trimmed[pos..]) {
                if let Some(tc) = try_parse_function_json(json_str) {
                    return Some(tc);
                }
            }
        }
    }

    None
}

/// Try to parse a string as a `{"name": "...", "arguments": {...}}` tool call.
fn try_parse_function_json(s: &str) -> Option<ToolCall> {
    let json: Value = serde_json::from_str(s).ok()?;
    let name = json
        .get("name")
        .or_else(|| json.get("function"))?
        .as_str()?;
    let arguments = json
        .get("arguments")
        .or_else(|| json.get("parameters"))
        .cloned()
        .map(ToolArguments::from)
        .unwrap_or_default();
    Some(ToolCall::new(ToolCall::generated_id(), name, arguments))
}

/// Extract the body of the first markdown code fence in the text.
fn extract_fenced_json(content: &str) -> Option<&str> {
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    // Skip the language tag line (e.g. "json\n")
    let body_start_rel = after_opening.find('\n')? + 1;
    let body_start = fence_start + 3 + body_start_rel;

    let closing = content[body_start..].find("```")?;
    let body_end = body_start + closing;

    if body_start >= body_end {
        return None;
    }

    Some(&content[body_start..body_end])
}

/// Extract a balanced JSON object starting at position 0 of `s`.
///
/// Counts `{` / `}` depth, respecting string literals.
fn extract_balanced_json(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
