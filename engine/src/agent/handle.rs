//! Engine side of the chat handle
//!
//! Binds the orchestrator, session registry and suggestion service to the
//! `ChatHandleImpl` seam consumed by the HTTP layer and the terminal chat.

use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::{ChatHandle, ChatHandleImpl, ChatResponse, HealthCheck, HistoryEntry, SuggestionResponse};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::context::ContextRetriever;
use super::core::{AgentSettings, ChatAgent};
use super::prompts::SYSTEM_PROMPT;
use super::sessions::SessionRegistry;
use super::suggestions::SuggestionService;
use crate::config::Config;
use crate::llm::{self, LLMProvider};
use crate::secrets::SecretManager;
use crate::semantic::{self, SemanticStore};
use crate::tools::{McpWeatherClient, ToolRegistry, WeatherCapability};

/// Fully wired engine
pub struct EngineChat {
    agent: ChatAgent,
    suggestions: SuggestionService,
    weather: Arc<dyn WeatherCapability>,
    store: Arc<dyn SemanticStore>,
}

impl EngineChat {
    /// Assemble the engine from its collaborators
    pub fn new(
        llm: Arc<dyn LLMProvider>,
        weather: Arc<dyn WeatherCapability>,
        store: Arc<dyn SemanticStore>,
        config: &Config,
    ) -> Self {
        let sessions = Arc::new(SessionRegistry::new(
            SYSTEM_PROMPT,
            config.memory.max_turn_messages,
            Arc::clone(&store),
        ));
        let agent = ChatAgent::new(
            llm,
            Arc::new(ToolRegistry::new(Arc::clone(&weather))),
            sessions,
            ContextRetriever::new(Arc::clone(&store), config.memory.similarity_threshold),
            AgentSettings {
                llm_timeout: Duration::from_secs(config.llm.timeout_secs),
                context_results: config.memory.context_results,
            },
        );

        Self {
            agent,
            suggestions: SuggestionService::new(Arc::clone(&weather)),
            weather,
            store,
        }
    }

    /// Build the engine described by `config`.
    ///
    /// # Errors
    /// Fails on a missing provider API key or an unreadable semantic index
    pub async fn from_config(config: &Config, secrets: &SecretManager) -> Result<Self, EngineError> {
        let llm = llm::create_provider(&config.llm, secrets)?;
        let weather: Arc<dyn WeatherCapability> = Arc::new(McpWeatherClient::new(&config.weather)?);
        let store = semantic::open_store(&config.vectordb).await?;

        info!(
            "Engine ready (weather service {}, semantic store {})",
            config.weather.base_url,
            if store.is_enabled() { "enabled" } else { "disabled" }
        );

        Ok(Self::new(llm, weather, store, config))
    }

    /// Wrap in a [`ChatHandle`]
    pub fn into_handle(self) -> ChatHandle {
        ChatHandle::new(Arc::new(self))
    }
}

#[async_trait]
impl ChatHandleImpl for EngineChat {
    async fn submit_message(
        &self,
        message: &str,
        session_id: &str,
        use_context: bool,
    ) -> ChatResponse {
        self.agent
            .process_message(message, session_id, use_context)
            .await
    }

    async fn history(&self, session_id: &str) -> Vec<HistoryEntry> {
        self.agent.history(session_id).await
    }

    async fn clear_history(&self, session_id: &str) {
        self.agent.clear_history(session_id).await
    }

    async fn health(&self) -> HealthCheck {
        let llm = self.agent.llm();
        let (weather_ok, llm_ok, vector_store) = tokio::join!(
            self.weather.check_health(),
            llm.check_health(),
            self.store.stats()
        );

        HealthCheck {
            status: if weather_ok && llm_ok { "healthy" } else { "degraded" }.to_string(),
            api: "healthy".to_string(),
            weather_server: if weather_ok { "healthy" } else { "unreachable" }.to_string(),
            llm_configured: llm_ok,
            vector_store,
        }
    }

    async fn suggestions(&self, city: &str, context: Option<&str>) -> SuggestionResponse {
        self.suggestions.generate(city, context).await
    }
}
