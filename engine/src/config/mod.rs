//! Configuration management
//!
//! This module handles loading, validation, and management of the Nimbus configuration.
//! Configuration is stored in TOML format at ~/.nimbus/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, data directory
//! - **llm**: Provider selection, sampling settings and per-provider endpoints
//! - **weather**: How the engine reaches the weather intermediary
//! - **weather_server**: How the intermediary reaches OpenWeather
//! - **api**: Chat API bind address
//! - **memory**: Conversation cap and context retrieval
//! - **vectordb**: Semantic store (disabled by default)
//!
//! API keys are never read from this file. They come from the environment
//! (see [`crate::secrets`]).
//!
//! # Examples
//!
//! ```no_run
//! use nimbus_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Provider: {}", config.llm.provider);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use sdk::SecretString;
use serde::{Deserialize, Serialize};
use weather_server::WeatherServerConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// Supported LLM providers
pub const PROVIDERS: [&str; 3] = ["groq", "openai", "ollama"];

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub core: CoreConfig,

    #[serde(default)]
    pub llm: LLMConfig,

    #[serde(default)]
    pub weather: WeatherConfig,

    #[serde(default)]
    pub weather_server: WeatherServerSection,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub vectordb: VectorDbConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Active provider (groq, openai, ollama)
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Upper bound for a single completion call
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_groq_endpoint")]
    pub groq: ProviderEndpoint,

    #[serde(default = "default_openai_endpoint")]
    pub openai: ProviderEndpoint,

    #[serde(default = "default_ollama_endpoint")]
    pub ollama: ProviderEndpoint,
}

/// Base URL and model for one provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEndpoint {
    pub base_url: String,
    pub model: String,
    // Note: API key comes from the environment, not from config
}

impl LLMConfig {
    /// Endpoint of the active provider
    pub fn active_endpoint(&self) -> &ProviderEndpoint {
        match self.provider.as_str() {
            "openai" => &self.openai,
            "ollama" => &self.ollama,
            _ => &self.groq,
        }
    }
}

/// Weather intermediary client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Base URL of the intermediary
    #[serde(default = "default_weather_base_url")]
    pub base_url: String,

    /// Timeout for `/mcp/invoke` calls
    #[serde(default = "default_weather_request_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout for `/health` probes
    #[serde(default = "default_health_timeout")]
    pub health_timeout_secs: u64,
}

/// Weather intermediary server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherServerSection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_weather_server_port")]
    pub port: u16,

    #[serde(default = "default_openweather_base_url")]
    pub openweather_base_url: String,

    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_secs: u64,

    /// Days returned by `get_forecast` when the caller does not ask
    #[serde(default = "default_forecast_days")]
    pub default_forecast_days: u32,

    #[serde(default = "default_max_forecast_days")]
    pub max_forecast_days: u32,
}

impl WeatherServerSection {
    /// Runtime settings for the intermediary, with the key supplied by the caller
    pub fn to_server_config(&self, api_key: SecretString) -> WeatherServerConfig {
        WeatherServerConfig {
            host: self.host.clone(),
            port: self.port,
            openweather_base_url: self.openweather_base_url.clone(),
            api_key,
            upstream_timeout_secs: self.upstream_timeout_secs,
            default_forecast_days: self.default_forecast_days,
            max_forecast_days: self.max_forecast_days,
        }
    }
}

/// Chat API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_api_port")]
    pub port: u16,
}

/// Conversation memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Turn messages kept after the system preamble
    #[serde(default = "default_max_turn_messages")]
    pub max_turn_messages: usize,

    /// Similar past queries injected per turn
    #[serde(default = "default_context_results")]
    pub context_results: usize,

    /// Squared L2 distance below which a past query counts as similar
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
}

/// Semantic store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorDbConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Directory holding the index files (supports ~ expansion)
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.nimbus")
}

fn default_provider() -> String {
    "groq".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    800
}

fn default_llm_timeout() -> u64 {
    60
}

fn default_groq_endpoint() -> ProviderEndpoint {
    ProviderEndpoint {
        base_url: "https://api.groq.com/openai/v1".to_string(),
        model: "llama3-groq-70b-8192-tool-use-preview".to_string(),
    }
}

fn default_openai_endpoint() -> ProviderEndpoint {
    ProviderEndpoint {
        base_url: "https://api.openai.com/v1".to_string(),
        model: "gpt-4o-mini".to_string(),
    }
}

fn default_ollama_endpoint() -> ProviderEndpoint {
    ProviderEndpoint {
        base_url: "http://localhost:11434".to_string(),
        model: "llama3.1:8b".to_string(),
    }
}

fn default_weather_base_url() -> String {
    "http://localhost:8001".to_string()
}

fn default_weather_request_timeout() -> u64 {
    10
}

fn default_health_timeout() -> u64 {
    5
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_weather_server_port() -> u16 {
    8001
}

fn default_openweather_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_upstream_timeout() -> u64 {
    20
}

fn default_forecast_days() -> u32 {
    3
}

fn default_max_forecast_days() -> u32 {
    5
}

fn default_api_port() -> u16 {
    8000
}

fn default_max_turn_messages() -> usize {
    10
}

fn default_context_results() -> usize {
    2
}

fn default_similarity_threshold() -> f32 {
    1.5
}

fn default_index_path() -> PathBuf {
    PathBuf::from("~/.nimbus/vectordb")
}

fn default_dimension() -> usize {
    384
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout(),
            groq: default_groq_endpoint(),
            openai: default_openai_endpoint(),
            ollama: default_ollama_endpoint(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_weather_base_url(),
            request_timeout_secs: default_weather_request_timeout(),
            health_timeout_secs: default_health_timeout(),
        }
    }
}

impl Default for WeatherServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_weather_server_port(),
            openweather_base_url: default_openweather_base_url(),
            upstream_timeout_secs: default_upstream_timeout(),
            default_forecast_days: default_forecast_days(),
            max_forecast_days: default_max_forecast_days(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_api_port(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_turn_messages: default_max_turn_messages(),
            context_results: default_context_results(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            index_path: default_index_path(),
            dimension: default_dimension(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.nimbus/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        // Serialize before processing so the file keeps `~` paths
        let config = Self::default();
        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Created default configuration at {}", path.display());

        let mut config = config;
        config.validate_and_process()?;
        Ok(config)
    }

    /// Get the default configuration file path (~/.nimbus/config.toml)
    pub fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".nimbus").join("config.toml"))
    }

    /// Validate and process configuration
    ///
    /// Checks value ranges, expands `~` in paths and creates the data
    /// directory if it doesn't exist.
    pub fn validate_and_process(&mut self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if !PROVIDERS.contains(&self.llm.provider.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid provider '{}'. Must be one of: {}",
                self.llm.provider,
                PROVIDERS.join(", ")
            )));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(EngineError::Config(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.llm.max_tokens == 0 {
            return Err(EngineError::Config(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        let timeouts = [
            ("llm.timeout_secs", self.llm.timeout_secs),
            ("weather.request_timeout_secs", self.weather.request_timeout_secs),
            ("weather.health_timeout_secs", self.weather.health_timeout_secs),
            (
                "weather_server.upstream_timeout_secs",
                self.weather_server.upstream_timeout_secs,
            ),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(EngineError::Config(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        let max_days = self.weather_server.max_forecast_days;
        if !(1..=5).contains(&max_days) {
            return Err(EngineError::Config(
                "max_forecast_days must be between 1 and 5".to_string(),
            ));
        }
        if !(1..=max_days).contains(&self.weather_server.default_forecast_days) {
            return Err(EngineError::Config(format!(
                "default_forecast_days must be between 1 and {}",
                max_days
            )));
        }

        if self.memory.max_turn_messages == 0 {
            return Err(EngineError::Config(
                "max_turn_messages must be greater than 0".to_string(),
            ));
        }

        if !self.memory.similarity_threshold.is_finite() || self.memory.similarity_threshold < 0.0 {
            return Err(EngineError::Config(
                "similarity_threshold must be a non-negative number".to_string(),
            ));
        }

        if self.vectordb.dimension == 0 {
            return Err(EngineError::Config(
                "vectordb dimension must be greater than 0".to_string(),
            ));
        }

        self.core.data_dir = expand_path(&self.core.data_dir)?;
        self.vectordb.index_path = expand_path(&self.vectordb.index_path)?;

        if !self.core.data_dir.exists() {
            fs::create_dir_all(&self.core.data_dir).map_err(|e| {
                EngineError::Config(format!("Failed to create data directory: {}", e))
            })?;
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}
