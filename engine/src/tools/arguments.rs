//! Tool argument decoding
//!
//! Providers hand tool arguments over in different shapes: an already parsed
//! object (Ollama), a JSON string (OpenAI-compatible APIs), or nothing at all.
//! [`decode_tool_args`] turns any of them into a parameter map and never fails.

use serde_json::{Map, Value};
use tracing::warn;

/// Tool call arguments as reported by the provider
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ToolArguments {
    /// Already-parsed key/value mapping
    Map(Map<String, Value>),

    /// Serialized arguments, usually JSON
    Text(String),

    /// No arguments supplied
    #[default]
    Absent,
}

impl ToolArguments {
    /// Wrap text arguments, treating blank text as absent
    pub fn from_text(text: &str) -> Self {
        if text.trim().is_empty() {
            Self::Absent
        } else {
            Self::Text(text.to_string())
        }
    }
}

impl From<Value> for ToolArguments {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Map(map),
            Value::String(text) => Self::from_text(&text),
            // Numbers, arrays and null carry no named parameters
            _ => Self::Absent,
        }
    }
}

/// Decode tool arguments into a parameter map.
///
/// Text is parsed as JSON first. When that fails, a lenient second attempt
/// swaps `=` for `:` and single quotes for double quotes. Anything that still
/// does not decode to a JSON object yields an empty map.
pub fn decode_tool_args(args: &ToolArguments) -> Map<String, Value> {
    match args {
        ToolArguments::Absent => Map::new(),
        ToolArguments::Map(map) => map.clone(),
        ToolArguments::Text(text) => {
            if text.trim().is_empty() {
                return Map::new();
            }
            if let Some(map) = parse_object(text) {
                return map;
            }
            let repaired = text.replace('=', ":").replace('\'', "\"");
            if let Some(map) = parse_object(&repaired) {
                return map;
            }
            warn!("Failed to decode tool arguments: {}", text);
            Map::new()
        }
    }
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}
