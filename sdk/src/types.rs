//! Wire types
//!
//! Two families live here:
//! - the weather intermediary envelope (`ToolInput` request, `ToolOutput` response)
//! - the chat surface types returned to UI clients (`ChatResponse` and friends)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tool invocation request sent to the weather intermediary.
///
/// Serializes as `{"method": "get_weather", "params": {"city": "Dhaka"}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInput {
    pub method: String,
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
}

impl ToolInput {
    /// Create a new ToolInput
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            params: HashMap::new(),
        }
    }

    /// Add a parameter
    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Get a required, non-blank string parameter
    pub fn param_str(&self, key: &str) -> Result<String, ToolError> {
        self.param_str_opt(key)
            .ok_or_else(|| ToolError::MissingParameter(key.to_string()))
    }

    /// Get an optional string parameter; blank strings count as absent
    pub fn param_str_opt(&self, key: &str) -> Option<String> {
        self.params
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    }

    /// Get an optional integer parameter
    ///
    /// Accepts integral JSON numbers and numeric strings, since models
    /// frequently quote numbers in tool arguments.
    pub fn param_i64_opt(&self, key: &str) -> Option<i64> {
        match self.params.get(key)? {
            serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Successful payload of an intermediary response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResultData {
    pub data: serde_json::Value,
}

/// Response envelope of the weather intermediary.
///
/// Success: `{"result": {"data": {...}}}`. Failure: `{"error": "..."}`.
/// Note that a successful envelope may still carry a data mapping with its own
/// `error` key (e.g. an upstream 404), which callers must check.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolResultData>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutput {
    /// Create a successful output with JSON data
    pub fn json(data: serde_json::Value) -> Self {
        Self {
            result: Some(ToolResultData { data }),
            error: None,
        }
    }

    /// Create an error output
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(error.into()),
        }
    }

    /// Flatten the envelope into the result mapping handed to the orchestrator.
    ///
    /// A non-empty envelope error wins; otherwise the data is returned as-is.
    /// A missing result is reported as an error mapping, never a panic.
    pub fn into_data(self) -> serde_json::Value {
        match (self.error.filter(|e| !e.is_empty()), self.result) {
            (Some(error), _) => serde_json::json!({ "error": error }),
            (None, Some(result)) => result.data,
            (None, None) => serde_json::json!({ "error": "Malformed weather service response: missing result" }),
        }
    }
}

/// Tool-specific errors
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unknown method: {0}")]
    UnknownMethod(String),
}

/// Body of `POST /chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message: String,
}

/// Normalized current conditions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherData {
    pub city: String,
    pub country: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub description: String,
    pub humidity: u32,
    pub wind_speed: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    #[serde(default = "not_available")]
    pub sunrise: String,
    #[serde(default = "not_available")]
    pub sunset: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// One day of a forecast
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastItem {
    pub date: String,
    pub temp_min: f64,
    pub temp_max: f64,
    pub description: String,
    #[serde(default = "not_available")]
    pub sunrise: String,
    #[serde(default = "not_available")]
    pub sunset: String,
}

/// Normalized multi-day forecast
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastData {
    pub city: String,
    pub country: String,
    pub forecasts: Vec<ForecastItem>,
}

/// Output of one conversation turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub response: String,
    #[serde(default)]
    pub weather_data: Option<WeatherData>,
    #[serde(default)]
    pub forecast_data: Option<ForecastData>,
    #[serde(default)]
    pub tool_calls: Option<Vec<String>>,
    pub session_id: String,
}

impl ChatResponse {
    /// A text-only response carrying no tool activity
    pub fn text(response: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            weather_data: None,
            forecast_data: None,
            tool_calls: None,
            session_id: session_id.into(),
        }
    }
}

/// One visible history message (the system preamble is never exposed)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

/// Body of `GET /chat/history`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationHistory {
    pub session_id: String,
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Semantic store statistics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VectorStoreStats {
    pub enabled: bool,
    pub total_documents: usize,
    pub dimension: usize,
    pub index_type: String,
}

impl VectorStoreStats {
    /// Stats reported when no semantic store is configured
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            total_documents: 0,
            dimension: 0,
            index_type: "none".to_string(),
        }
    }
}

/// Dependency health report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: String,
    pub api: String,
    pub weather_server: String,
    pub llm_configured: bool,
    pub vector_store: VectorStoreStats,
}

/// Body of `POST /suggestions`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionRequest {
    pub city: String,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionPriority {
    Low,
    Medium,
    High,
}

/// A single weather-driven suggestion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Suggestion {
    pub category: String,
    pub suggestion: String,
    pub priority: SuggestionPriority,
    pub icon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionResponse {
    pub city: String,
    pub suggestions: Vec<Suggestion>,
    pub generated_at: DateTime<Utc>,
}

fn not_available() -> String {
    "N/A".to_string()
}
