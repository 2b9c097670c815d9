//! Weather capability adapter
//!
//! Talks to the weather intermediary over `POST /mcp/invoke`. Every failure is
//! folded into an `{"error": ...}` mapping, so callers only ever inspect the
//! returned value.

use async_trait::async_trait;
use reqwest::Client;
use sdk::errors::EngineError;
use sdk::{ToolInput, ToolOutput};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::WeatherConfig;

/// Returned without a network call when the city argument is missing or blank
pub const CITY_REQUIRED: &str = "City name is required.";

/// Source of weather results
#[async_trait]
pub trait WeatherCapability: Send + Sync {
    /// Invoke `get_weather` or `get_forecast`.
    ///
    /// Returns the normalized result mapping, or `{"error": text}`.
    async fn invoke(&self, method: &str, params: &Map<String, Value>) -> Value;

    /// Whether the backing service answers its health probe
    async fn check_health(&self) -> bool;
}

/// Builds an error result mapping
pub fn error_result(message: impl Into<String>) -> Value {
    json!({ "error": message.into() })
}

/// Returns the error text of a result mapping, if it carries one
pub fn result_error(result: &Value) -> Option<String> {
    match result.get("error")? {
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// HTTP client for the weather intermediary
pub struct McpWeatherClient {
    base_url: String,
    client: Client,
    health_timeout: Duration,
}

impl McpWeatherClient {
    /// # Errors
    /// Returns `EngineError::Config` if the HTTP client cannot be built
    pub fn new(config: &WeatherConfig) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| EngineError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            health_timeout: Duration::from_secs(config.health_timeout_secs),
        })
    }

    async fn post_invoke(&self, input: &ToolInput) -> Value {
        let url = format!("{}/mcp/invoke", self.base_url);

        let response = match self.client.post(&url).json(input).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Weather service request failed: {}", e);
                return error_result(e.without_url().to_string());
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Weather service returned {}: {}", status, body);
            return error_result(format!("Weather service returned HTTP {}", status));
        }

        match response.json::<ToolOutput>().await {
            Ok(output) => match output.into_data() {
                data @ Value::Object(_) => data,
                other => error_result(format!("Malformed weather service response: {}", other)),
            },
            Err(e) => error_result(format!(
                "Malformed weather service response: {}",
                e.without_url()
            )),
        }
    }
}

#[async_trait]
impl WeatherCapability for McpWeatherClient {
    async fn invoke(&self, method: &str, params: &Map<String, Value>) -> Value {
        let has_city = params
            .get("city")
            .and_then(Value::as_str)
            .is_some_and(|city| !city.trim().is_empty());
        if !has_city {
            return error_result(CITY_REQUIRED);
        }

        debug!("Invoking weather method '{}' with {:?}", method, params);

        let mut input = ToolInput::new(method);
        for (key, value) in params {
            input = input.with_param(key.clone(), value.clone());
        }

        self.post_invoke(&input).await
    }

    async fn check_health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(self.health_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Weather service health probe failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> McpWeatherClient {
        let config = WeatherConfig {
            base_url: server.uri(),
            request_timeout_secs: 2,
            health_timeout_secs: 1,
        };
        McpWeatherClient::new(&config).unwrap()
    }

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[tokio::test]
    async fn test_missing_city_short_circuits() {
        let server = MockServer::start().await;
        let client = client_for(&server);

        let result = client.invoke("get_weather", &Map::new()).await;
        assert_eq!(result, json!({"error": CITY_REQUIRED}));

        let result = client.invoke("get_weather", &params(json!({"city": "  "}))).await;
        assert_eq!(result, json!({"error": CITY_REQUIRED}));

        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_envelope_is_flattened() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mcp/invoke"))
            .and(body_json(json!({"method": "get_weather", "params": {"city": "Dhaka"}})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"result": {"data": {"city": "Dhaka", "temperature": 30.1}}})),
            )
            .mount(&server)
            .await;

        let result = client_for(&server)
            .invoke("get_weather", &params(json!({"city": "Dhaka"})))
            .await;
        assert_eq!(result["city"], "Dhaka");
        assert!(result_error(&result).is_none());
    }

    #[tokio::test]
    async fn test_envelope_error_becomes_error_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mcp/invoke"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"error": "Unknown method: get_tide"})),
            )
            .mount(&server)
            .await;

        let result = client_for(&server)
            .invoke("get_tide", &params(json!({"city": "Oslo"})))
            .await;
        assert_eq!(result_error(&result).as_deref(), Some("Unknown method: get_tide"));
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mcp/invoke"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .invoke("get_weather", &params(json!({"city": "Oslo"})))
            .await;
        assert!(result_error(&result).unwrap().contains("500"));
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mcp/invoke"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .invoke("get_weather", &params(json!({"city": "Oslo"})))
            .await;
        assert!(result_error(&result)
            .unwrap()
            .starts_with("Malformed weather service response"));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_error_mapping() {
        let config = WeatherConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            request_timeout_secs: 1,
            health_timeout_secs: 1,
        };
        let client = McpWeatherClient::new(&config).unwrap();

        let result = client.invoke("get_weather", &params(json!({"city": "Oslo"}))).await;
        assert!(result_error(&result).is_some());
        assert!(!client.check_health().await);
    }

    #[tokio::test]
    async fn test_health_probe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})))
            .mount(&server)
            .await;

        assert!(client_for(&server).check_health().await);
    }
}
