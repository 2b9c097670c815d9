//! Function schemas advertised to the model

use serde_json::json;

use crate::llm::ToolDefinition;

pub const GET_WEATHER: &str = "get_weather";
pub const GET_FORECAST: &str = "get_forecast";

/// Names of every weather tool
pub const WEATHER_TOOLS: [&str; 2] = [GET_WEATHER, GET_FORECAST];

fn city_parameters() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "city": {
                "type": "string",
                "description": "The city name"
            },
            "country_code": {
                "type": "string",
                "description": "Optional 2-letter country code"
            }
        },
        "required": ["city"]
    })
}

/// The two weather functions, in the order they are offered
pub fn weather_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: GET_WEATHER.to_string(),
            description: "Get the current weather for a specified city".to_string(),
            parameters: city_parameters(),
        },
        ToolDefinition {
            name: GET_FORECAST.to_string(),
            description: "Get the weather forecast for a specified city".to_string(),
            parameters: city_parameters(),
        },
    ]
}
