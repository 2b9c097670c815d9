//! Prompt text

use serde_json::Value;

/// Behavioral preamble at index 0 of every conversation
pub const SYSTEM_PROMPT: &str = "You are a friendly and helpful weather assistant.

CRITICAL RULES:
- ONLY call get_weather or get_forecast when the user clearly mentions a city AND asks for weather.
- If the user says hello, hi, hey, good morning, etc. → DO NOT call any tool. Just greet back warmly.
- If no city is mentioned → ask for one. Never guess.
- Always be conversational and use emojis.
- Don't give backend status messages to the user.

Examples that MUST NOT trigger tools:
- \"hello\"
- \"hi there\"
- \"good morning\"

Be warm, helpful, and human-like.";

const TOOL_RESPONSE_TEMPLATE: &str = "Based on the weather data received, provide a natural, conversational response to the user.

Weather Data: {weather_data}

User's Original Question: {user_message}

Provide a friendly response that:
1. Directly answers their question
2. Includes relevant weather details
3. Uses appropriate emojis
4. Is conversational and easy to read

Format the temperature, conditions, and other details in a clear way.";

/// Prompt asking the model to turn a raw tool result into prose
pub fn tool_response_prompt(weather_data: &Value, user_message: &str) -> String {
    let pretty = serde_json::to_string_pretty(weather_data).unwrap_or_else(|_| weather_data.to_string());
    TOOL_RESPONSE_TEMPLATE
        .replace("{weather_data}", &pretty)
        .replace("{user_message}", user_message)
}

/// Ephemeral system message listing similar past queries
pub fn context_prompt(similar: &[String]) -> String {
    format!("Similar past queries: {}", similar.join(", "))
}
