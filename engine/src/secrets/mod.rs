//! Secret management
//!
//! API keys are read from the process environment and handed out as
//! [`SecretString`]s so they never end up in logs. The manager also scrubs
//! key-shaped substrings from text that may reach a user, such as provider
//! error bodies echoed back in an apology.

use regex::Regex;
use sdk::errors::EngineError;
use sdk::SecretString;
use std::sync::OnceLock;

/// Environment variable holding the Groq API key
pub const GROQ_API_KEY: &str = "GROQ_API_KEY";

/// Environment variable holding the OpenAI API key
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

/// Environment variable holding the OpenWeather API key
pub const OPENWEATHER_API_KEY: &str = "OPENWEATHER_API_KEY";

/// SecretManager resolves secrets from the environment.
#[derive(Debug, Default, Clone)]
pub struct SecretManager;

/// Regex patterns for detecting common secret formats.
static SECRET_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

/// Patterns match:
/// - OpenAI API keys: sk-...
/// - Groq API keys: gsk_...
/// - OpenWeather keys in query strings: appid=...
/// - Bearer tokens: Bearer ...
fn get_secret_patterns() -> &'static Vec<Regex> {
    SECRET_PATTERNS.get_or_init(|| {
        [
            r"gsk_[a-zA-Z0-9]{20,}",
            r"sk-[a-zA-Z0-9\-_]{20,}",
            r"appid=[^&\s]+",
            r"Bearer\s+[^\s]{20,}",
        ]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
    })
}

impl SecretManager {
    pub fn new() -> Self {
        Self
    }

    /// Environment variable holding the API key for an LLM provider.
    ///
    /// Returns `None` for providers that need no key.
    pub fn provider_key_var(provider: &str) -> Option<&'static str> {
        match provider {
            "groq" => Some(GROQ_API_KEY),
            "openai" => Some(OPENAI_API_KEY),
            _ => None,
        }
    }

    /// Retrieves a required secret.
    ///
    /// # Errors
    /// Returns `EngineError::Config` when the variable is unset or blank
    pub fn get_secret(&self, key: &str) -> Result<SecretString, EngineError> {
        self.get_optional(key).ok_or_else(|| {
            EngineError::Config(format!("Environment variable {} is not set", key))
        })
    }

    /// Retrieves a secret if it is set and non-blank
    pub fn get_optional(&self, key: &str) -> Option<SecretString> {
        let value = std::env::var(key).ok()?;
        let secret = SecretString::new(value.trim());
        if secret.is_empty() {
            None
        } else {
            tracing::debug!("Resolved secret '{}' from environment", key);
            Some(secret)
        }
    }

    /// Checks if a secret is available without returning it
    pub fn has_secret(&self, key: &str) -> bool {
        self.get_optional(key).is_some()
    }

    /// Scrubs secrets from text by replacing them with [REDACTED].
    ///
    /// # Examples
    /// ```
    /// use nimbus_engine::secrets::SecretManager;
    ///
    /// let manager = SecretManager::new();
    /// let scrubbed = manager.scrub("Incorrect API key provided: sk-1234567890abcdefghij");
    /// assert_eq!(scrubbed, "Incorrect API key provided: [REDACTED]");
    /// ```
    pub fn scrub(&self, text: &str) -> String {
        let mut result = text.to_string();

        for pattern in get_secret_patterns() {
            result = pattern.replace_all(&result, "[REDACTED]").to_string();
        }

        result
    }
}
