pub mod arguments;
pub mod schema;
pub mod weather;

pub use arguments::{decode_tool_args, ToolArguments};
pub use schema::{weather_tool_definitions, GET_FORECAST, GET_WEATHER, WEATHER_TOOLS};
pub use weather::{McpWeatherClient, WeatherCapability};

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::llm::ToolDefinition;

/// Registry of the tools the model may call.
///
/// Dispatch never fails: unknown tools and capability failures come back as
/// `{"error": ...}` mappings so the turn can report them.
pub struct ToolRegistry {
    weather: Arc<dyn WeatherCapability>,
    definitions: Vec<ToolDefinition>,
}

impl ToolRegistry {
    pub fn new(weather: Arc<dyn WeatherCapability>) -> Self {
        Self {
            weather,
            definitions: weather_tool_definitions(),
        }
    }

    /// Tool schema offered to the model
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// The weather capability behind the tools
    pub fn weather(&self) -> Arc<dyn WeatherCapability> {
        Arc::clone(&self.weather)
    }

    /// Dispatch a tool call by name with already-decoded arguments.
    pub async fn dispatch(&self, name: &str, args: &Map<String, Value>) -> Value {
        debug!("Dispatching tool '{}' with args: {:?}", name, args);

        if WEATHER_TOOLS.contains(&name) {
            return self.weather.invoke(name, args).await;
        }

        warn!("Unknown tool requested: {}", name);
        weather::error_result(format!(
            "Unknown tool '{}'. Available tools: {}",
            name,
            WEATHER_TOOLS.join(", ")
        ))
    }
}
