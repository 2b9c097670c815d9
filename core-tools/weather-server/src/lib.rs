//! Weather intermediary
//!
//! A small HTTP service that sits between the chat engine and OpenWeather.
//! The engine invokes it with a `{"method", "params"}` envelope and gets back
//! normalized current conditions or a per-day forecast.
//!
//! # Endpoints
//!
//! - POST /mcp/invoke - Invoke `get_weather` or `get_forecast`
//! - GET /health - Liveness probe

pub mod openweather;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use sdk::{EngineError, SecretString, ToolError, ToolInput, ToolOutput};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;

pub use openweather::OpenWeatherService;

/// Runtime settings for the intermediary
#[derive(Debug, Clone)]
pub struct WeatherServerConfig {
    pub host: String,
    pub port: u16,
    pub openweather_base_url: String,
    pub api_key: SecretString,
    pub upstream_timeout_secs: u64,
    pub default_forecast_days: u32,
    pub max_forecast_days: u32,
}

impl Default for WeatherServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8001,
            openweather_base_url: "https://api.openweathermap.org/data/2.5".to_string(),
            api_key: SecretString::new(""),
            upstream_timeout_secs: 20,
            default_forecast_days: 3,
            max_forecast_days: 5,
        }
    }
}

/// State shared across handlers
#[derive(Clone)]
struct ServerState {
    service: Arc<OpenWeatherService>,
    default_forecast_days: u32,
    max_forecast_days: u32,
}

impl ServerState {
    async fn dispatch(&self, input: ToolInput) -> ToolOutput {
        tracing::debug!("Weather invoke: method={}", input.method);

        let result = match input.method.as_str() {
            "get_weather" => self.get_weather(&input).await,
            "get_forecast" => self.get_forecast(&input).await,
            other => Err(ToolError::UnknownMethod(other.to_string())),
        };

        match result {
            Ok(data) => ToolOutput::json(data),
            Err(ToolError::MissingParameter(_)) => {
                ToolOutput::json(json!({ "error": "City name is required." }))
            }
            Err(e) => ToolOutput::error(e.to_string()),
        }
    }

    async fn get_weather(&self, input: &ToolInput) -> Result<Value, ToolError> {
        let city = input.param_str("city")?;
        let country_code = input.param_str_opt("country_code");
        Ok(self
            .service
            .get_weather(&city, country_code.as_deref())
            .await)
    }

    async fn get_forecast(&self, input: &ToolInput) -> Result<Value, ToolError> {
        let city = input.param_str("city")?;
        let country_code = input.param_str_opt("country_code");
        let days = self.forecast_days(input.param_i64_opt("days"));
        Ok(self
            .service
            .get_forecast(&city, country_code.as_deref(), days)
            .await)
    }

    /// Requested day count, defaulted and clamped to `1..=max_forecast_days`
    fn forecast_days(&self, requested: Option<i64>) -> usize {
        let max = i64::from(self.max_forecast_days.max(1));
        requested
            .unwrap_or_else(|| i64::from(self.default_forecast_days))
            .clamp(1, max) as usize
    }
}

/// Weather intermediary server
pub struct WeatherServer {
    config: WeatherServerConfig,
    state: ServerState,
    addr: Option<SocketAddr>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl WeatherServer {
    /// Create a new server. Fails when no OpenWeather API key is configured.
    pub fn new(config: WeatherServerConfig) -> Result<Self, EngineError> {
        if config.api_key.is_empty() {
            return Err(EngineError::Config(
                "OPENWEATHER_API_KEY is not set".to_string(),
            ));
        }

        let service = OpenWeatherService::new(
            config.openweather_base_url.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.upstream_timeout_secs),
        )?;

        let state = ServerState {
            service: Arc::new(service),
            default_forecast_days: config.default_forecast_days,
            max_forecast_days: config.max_forecast_days,
        };

        Ok(Self {
            config,
            state,
            addr: None,
            shutdown_tx: None,
        })
    }

    /// Build the router without binding a socket
    pub fn router(&self) -> Router {
        Router::new()
            .route("/mcp/invoke", post(invoke_handler))
            .route("/health", get(health_handler))
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Bind and serve in the background. Returns the bound address.
    pub async fn start(&mut self) -> Result<SocketAddr, EngineError> {
        let bind = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&bind)
            .await
            .map_err(|e| EngineError::Network(format!("Failed to bind to {}: {}", bind, e)))?;

        let addr = listener
            .local_addr()
            .map_err(|e| EngineError::Network(format!("Failed to get local address: {}", e)))?;

        let app = self.router();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            tracing::info!("Weather server listening on http://{}", addr);

            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_rx.await.ok();
                    tracing::info!("Weather server shutting down gracefully");
                })
                .await
                .unwrap_or_else(|e| {
                    tracing::error!("Weather server error: {}", e);
                });
        });

        self.addr = Some(addr);
        self.shutdown_tx = Some(shutdown_tx);
        Ok(addr)
    }

    /// Signal the background server to stop
    pub fn stop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            shutdown_tx.send(()).ok();
            tracing::info!("Weather server stopped");
        }
    }

    /// Address the server is bound to, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.addr
    }
}

impl Drop for WeatherServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn invoke_handler(
    State(state): State<ServerState>,
    Json(input): Json<ToolInput>,
) -> Json<ToolOutput> {
    Json(state.dispatch(input).await)
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(default_days: u32, max_days: u32) -> ServerState {
        let service = OpenWeatherService::new(
            "http://127.0.0.1:9",
            SecretString::new("test-key"),
            Duration::from_secs(1),
        )
        .unwrap();
        ServerState {
            service: Arc::new(service),
            default_forecast_days: default_days,
            max_forecast_days: max_days,
        }
    }

    #[test]
    fn test_forecast_days_defaults_and_clamps() {
        let state = state(3, 5);
        assert_eq!(state.forecast_days(None), 3);
        assert_eq!(state.forecast_days(Some(4)), 4);
        assert_eq!(state.forecast_days(Some(0)), 1);
        assert_eq!(state.forecast_days(Some(-2)), 1);
        assert_eq!(state.forecast_days(Some(12)), 5);
    }

    #[tokio::test]
    async fn test_unknown_method_is_envelope_error() {
        let output = state(3, 5).dispatch(ToolInput::new("get_tides")).await;
        assert_eq!(output, ToolOutput::error("Unknown method: get_tides"));
    }

    #[tokio::test]
    async fn test_missing_city_never_reaches_upstream() {
        let output = state(3, 5)
            .dispatch(ToolInput::new("get_weather").with_param("city", json!("  ")))
            .await;
        assert_eq!(output.into_data(), json!({ "error": "City name is required." }));
    }

    #[test]
    fn test_new_requires_api_key() {
        let err = WeatherServer::new(WeatherServerConfig::default()).err().unwrap();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
