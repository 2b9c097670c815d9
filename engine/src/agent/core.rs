//! Conversation Turn Controller
//!
//! One call to [`ChatAgent::process_message`] runs a whole turn:
//! 1. Gather similar past queries (optional)
//! 2. Record the user message
//! 3. Call the model with the weather tool schema
//! 4. Either persist the text answer, or run the first tool call and ask the
//!    model to phrase its result
//!
//! The turn never fails outward: any error becomes an apologetic reply bound
//! to the same session.

use anyhow::{anyhow, Result};
use chrono::Utc;
use sdk::{ChatResponse, ForecastData, HistoryEntry, WeatherData};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::context::ContextRetriever;
use super::prompts::{tool_response_prompt, SYSTEM_PROMPT};
use super::sessions::SessionRegistry;
use crate::llm::{LLMError, LLMProvider, LLMResponse, Message, MessageRole, ToolCall, ToolDefinition};
use crate::secrets::SecretManager;
use crate::tools::weather::result_error;
use crate::tools::{decode_tool_args, ToolRegistry, GET_FORECAST, GET_WEATHER};
use sdk::errors::EngineError;

/// Reply when a forecast result cannot be turned into structured data
pub const FORECAST_DISPLAY_FAILED: &str =
    "I received the forecast but had trouble displaying it properly.";

/// Reply when a forecast result carries no forecast entries
pub const FORECAST_UNAVAILABLE: &str = "Sorry, I couldn't retrieve the weather forecast right now.";

/// Per-turn tuning
#[derive(Debug, Clone, Copy)]
pub struct AgentSettings {
    /// Upper bound for each model call
    pub llm_timeout: Duration,

    /// Similar past queries to fetch when context is requested
    pub context_results: usize,
}

/// Orchestrates chat turns across sessions
pub struct ChatAgent {
    /// Completion provider
    llm: Arc<dyn LLMProvider>,

    /// Weather tools offered to the model
    tools: Arc<ToolRegistry>,

    /// Per-session conversation memory
    sessions: Arc<SessionRegistry>,

    retriever: ContextRetriever,

    secrets: SecretManager,

    settings: AgentSettings,
}

impl ChatAgent {
    pub fn new(
        llm: Arc<dyn LLMProvider>,
        tools: Arc<ToolRegistry>,
        sessions: Arc<SessionRegistry>,
        retriever: ContextRetriever,
        settings: AgentSettings,
    ) -> Self {
        Self {
            llm,
            tools,
            sessions,
            retriever,
            secrets: SecretManager::new(),
            settings,
        }
    }

    /// Run one conversation turn. Always returns a response.
    pub async fn process_message(
        &self,
        message: &str,
        session_id: &str,
        use_context: bool,
    ) -> ChatResponse {
        let start = Instant::now();
        info!("Processing message for session '{}'", session_id);

        match self.run_turn(message, session_id, use_context).await {
            Ok(response) => {
                info!(
                    "Turn for session '{}' completed in {}ms",
                    session_id,
                    start.elapsed().as_millis()
                );
                response
            }
            Err(e) => {
                error!("Turn for session '{}' failed: {:#}", session_id, e);
                ChatResponse::text(
                    format!(
                        "I apologize, but I encountered an error: {}. Please try again.",
                        self.secrets.scrub(&e.to_string())
                    ),
                    session_id,
                )
            }
        }
    }

    /// Turn history of a session, system prompt excluded
    pub async fn history(&self, session_id: &str) -> Vec<HistoryEntry> {
        self.sessions.history(session_id).await
    }

    pub async fn clear_history(&self, session_id: &str) {
        self.sessions.clear(session_id).await;
    }

    pub fn llm(&self) -> Arc<dyn LLMProvider> {
        Arc::clone(&self.llm)
    }

    async fn run_turn(
        &self,
        message: &str,
        session_id: &str,
        use_context: bool,
    ) -> Result<ChatResponse> {
        // Context is looked up before the message itself is indexed
        let similar = if use_context {
            self.retriever
                .retrieve(message, self.settings.context_results)
                .await
        } else {
            Vec::new()
        };
        let context_message = ContextRetriever::context_message(&similar);

        self.sessions
            .append(session_id, MessageRole::User, message)
            .await;

        let mut messages = self.sessions.get(session_id).await;
        if let Some(context) = context_message {
            messages.insert(1, context);
        }

        debug!(
            "Calling model with {} messages for session '{}'",
            messages.len(),
            session_id
        );
        let response = self
            .complete(&messages, Some(self.tools.definitions()))
            .await?;

        match response {
            LLMResponse::FinalAnswer(text) => {
                self.sessions
                    .append(session_id, MessageRole::Assistant, &text)
                    .await;
                Ok(ChatResponse::text(text, session_id))
            }
            LLMResponse::ToolCalls(calls) => self.run_tool_call(calls, message, session_id).await,
        }
    }

    async fn run_tool_call(
        &self,
        calls: Vec<ToolCall>,
        message: &str,
        session_id: &str,
    ) -> Result<ChatResponse> {
        let mut calls = calls.into_iter();
        let call = calls
            .next()
            .ok_or_else(|| anyhow!("Model returned an empty tool call list"))?;

        let dropped: Vec<String> = calls.map(|c| c.name).collect();
        if !dropped.is_empty() {
            warn!(
                "Only the first tool call is executed; ignoring {}",
                dropped.join(", ")
            );
        }

        let args = decode_tool_args(&call.arguments);
        debug!("Tool call: {} ({})", call.name, call.id);
        let result = self.tools.dispatch(&call.name, &args).await;
        let tool_calls = Some(vec![call.name.clone()]);

        if let Some(tool_error) = result_error(&result) {
            warn!("Tool '{}' returned an error: {}", call.name, tool_error);
            let text = format!(
                "I'm sorry, I couldn't fetch the weather data: {}. Please check the city name and try again.",
                self.secrets.scrub(&tool_error)
            );
            self.sessions
                .append(session_id, MessageRole::Assistant, &text)
                .await;
            return Ok(ChatResponse {
                tool_calls,
                ..ChatResponse::text(text, session_id)
            });
        }

        let mut text = self.format_result(&result, message).await?;
        self.sessions
            .append(session_id, MessageRole::Assistant, &text)
            .await;

        let mut weather_data = None;
        let mut forecast_data = None;
        match call.name.as_str() {
            GET_WEATHER => match serde_json::from_value::<WeatherData>(result) {
                Ok(mut data) => {
                    data.timestamp = Some(Utc::now());
                    weather_data = Some(data);
                }
                Err(e) => warn!("Weather result did not match the expected shape: {}", e),
            },
            GET_FORECAST => {
                if result.get("forecasts").is_some() {
                    match serde_json::from_value::<ForecastData>(result) {
                        Ok(data) => forecast_data = Some(data),
                        Err(e) => {
                            warn!("Forecast result did not match the expected shape: {}", e);
                            text = FORECAST_DISPLAY_FAILED.to_string();
                        }
                    }
                } else {
                    text = FORECAST_UNAVAILABLE.to_string();
                }
            }
            _ => {}
        }

        Ok(ChatResponse {
            response: text,
            weather_data,
            forecast_data,
            tool_calls,
            session_id: session_id.to_string(),
        })
    }

    /// Second model call: phrase a raw tool result for the user, tools off
    async fn format_result(&self, result: &Value, user_message: &str) -> Result<String> {
        let messages = [
            Message::system(SYSTEM_PROMPT),
            Message::user(tool_response_prompt(result, user_message)),
        ];

        match self.complete(&messages, None).await? {
            LLMResponse::FinalAnswer(text) => Ok(text),
            LLMResponse::ToolCalls(_) => Err(anyhow!(
                "model requested another tool while formatting the weather data"
            )),
        }
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> std::result::Result<LLMResponse, EngineError> {
        match timeout(self.settings.llm_timeout, self.llm.generate(messages, tools)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                error!("LLM call to '{}' failed: {}", self.llm.name(), e);
                Err(e.into())
            }
            Err(_) => {
                error!(
                    "LLM call timed out after {}s",
                    self.settings.llm_timeout.as_secs_f64()
                );
                Err(LLMError::Timeout.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::{DocumentMetadata, NullStore, SearchHit, SemanticStore};
    use crate::tools::{ToolArguments, WeatherCapability};
    use async_trait::async_trait;
    use sdk::VectorStoreStats;
    use serde_json::{json, Map};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records every request
    #[derive(Default)]
    struct ScriptedProvider {
        responses: Mutex<VecDeque<crate::llm::Result<LLMResponse>>>,
        requests: Mutex<Vec<(Vec<Message>, bool)>>,
        delay: Option<Duration>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<crate::llm::Result<LLMResponse>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn is_local(&self) -> bool {
            true
        }

        async fn generate(
            &self,
            messages: &[Message],
            tools: Option<&[ToolDefinition]>,
        ) -> crate::llm::Result<LLMResponse> {
            self.requests
                .lock()
                .unwrap()
                .push((messages.to_vec(), tools.is_some()));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LLMError::InvalidRequest("script exhausted".to_string())))
        }
    }

    /// Returns one fixed result for every method
    struct FixedWeather {
        result: Value,
        calls: Mutex<Vec<String>>,
    }

    impl FixedWeather {
        fn new(result: Value) -> Self {
            Self {
                result,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl WeatherCapability for FixedWeather {
        async fn invoke(&self, method: &str, _params: &Map<String, Value>) -> Value {
            self.calls.lock().unwrap().push(method.to_string());
            self.result.clone()
        }

        async fn check_health(&self) -> bool {
            true
        }
    }

    /// Enabled store that always returns the same hits and records writes
    struct RecallStore {
        hits: Vec<(&'static str, f32)>,
        added: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SemanticStore for RecallStore {
        fn is_enabled(&self) -> bool {
            true
        }

        async fn add_documents(
            &self,
            texts: &[String],
            _metadata: &[DocumentMetadata],
        ) -> std::result::Result<(), EngineError> {
            self.added.lock().unwrap().extend_from_slice(texts);
            Ok(())
        }

        async fn search(
            &self,
            _query: &str,
            k: usize,
        ) -> std::result::Result<Vec<SearchHit>, EngineError> {
            Ok(self
                .hits
                .iter()
                .take(k)
                .map(|(text, distance)| SearchHit {
                    text: text.to_string(),
                    distance: *distance,
                    metadata: None,
                })
                .collect())
        }

        async fn stats(&self) -> VectorStoreStats {
            VectorStoreStats::disabled()
        }

        async fn clear(&self) -> std::result::Result<(), EngineError> {
            Ok(())
        }
    }

    fn weather_json() -> Value {
        json!({
            "city": "Dhaka", "country": "BD", "temperature": 31.2, "feels_like": 36.4,
            "description": "Haze", "humidity": 70, "wind_speed": 3.1,
            "temp_min": 30.0, "temp_max": 32.0, "sunrise": "05:45 AM", "sunset": "06:10 PM"
        })
    }

    fn tool_call(name: &str) -> LLMResponse {
        LLMResponse::ToolCalls(vec![ToolCall::new(
            "call_1",
            name,
            ToolArguments::Text("{\"city\": \"Dhaka\"}".to_string()),
        )])
    }

    fn agent_with(
        provider: Arc<ScriptedProvider>,
        weather: Arc<FixedWeather>,
        llm_timeout: Duration,
    ) -> (ChatAgent, Arc<SessionRegistry>) {
        let sessions = Arc::new(SessionRegistry::new(SYSTEM_PROMPT, 10, Arc::new(NullStore)));
        let agent = ChatAgent::new(
            provider,
            Arc::new(ToolRegistry::new(weather)),
            sessions.clone(),
            ContextRetriever::new(Arc::new(NullStore), 1.5),
            AgentSettings {
                llm_timeout,
                context_results: 2,
            },
        );
        (agent, sessions)
    }

    fn agent(
        provider: Arc<ScriptedProvider>,
        weather: Arc<FixedWeather>,
    ) -> (ChatAgent, Arc<SessionRegistry>) {
        agent_with(provider, weather, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_text_answer_is_persisted() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(LLMResponse::FinalAnswer(
            "Hello! 👋 Which city?".to_string(),
        ))]));
        let weather = Arc::new(FixedWeather::new(weather_json()));
        let (agent, _) = agent(provider.clone(), weather.clone());

        let response = agent.process_message("hello", "s", true).await;
        assert_eq!(response.response, "Hello! 👋 Which city?");
        assert!(response.tool_calls.is_none());
        assert!(response.weather_data.is_none());
        assert!(weather.calls.lock().unwrap().is_empty());

        let history = agent.history("s").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].role, "assistant");

        let requests = provider.requests.lock().unwrap();
        assert!(requests[0].1, "first call offers tools");
    }

    #[tokio::test]
    async fn test_context_message_is_sent_but_not_persisted() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(LLMResponse::FinalAnswer("Which day in Dhaka?".to_string())),
            Ok(LLMResponse::FinalAnswer("Tomorrow looks hazy".to_string())),
        ]));
        let store = Arc::new(RecallStore {
            hits: vec![("weather in Dhaka yesterday", 0.4), ("penguin jokes", 1.9)],
            added: Mutex::new(Vec::new()),
        });
        let sessions = Arc::new(SessionRegistry::new(
            SYSTEM_PROMPT,
            10,
            Arc::clone(&store) as Arc<dyn SemanticStore>,
        ));
        let agent = ChatAgent::new(
            Arc::clone(&provider) as Arc<dyn LLMProvider>,
            Arc::new(ToolRegistry::new(Arc::new(FixedWeather::new(weather_json())))),
            Arc::clone(&sessions),
            ContextRetriever::new(Arc::clone(&store) as Arc<dyn SemanticStore>, 1.5),
            AgentSettings {
                llm_timeout: Duration::from_secs(5),
                context_results: 2,
            },
        );

        agent.process_message("weather in Dhaka", "s", true).await;
        agent.process_message("and tomorrow?", "s", false).await;

        let requests = provider.requests.lock().unwrap();

        // With context: preamble, context, user message
        let first = &requests[0].0;
        assert_eq!(first.len(), 3);
        assert_eq!(first[0], Message::system(SYSTEM_PROMPT));
        assert_eq!(
            first[1],
            Message::system("Similar past queries: weather in Dhaka yesterday")
        );
        assert_eq!(first[2], Message::user("weather in Dhaka"));

        // Without context nothing is spliced in
        let second = &requests[1].0;
        assert_eq!(second.len(), 4);
        assert_eq!(second[1], Message::user("weather in Dhaka"));
        assert!(second
            .iter()
            .all(|m| !m.content.starts_with("Similar past queries")));
        drop(requests);

        let stored = sessions.get("s").await;
        assert_eq!(stored.len(), 5);
        assert!(stored
            .iter()
            .all(|m| !m.content.starts_with("Similar past queries")));
        assert!(agent
            .history("s")
            .await
            .iter()
            .all(|entry| !entry.content.starts_with("Similar past queries")));

        assert_eq!(
            *store.added.lock().unwrap(),
            vec!["weather in Dhaka", "and tomorrow?"]
        );
    }

    #[tokio::test]
    async fn test_weather_tool_populates_payload() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(tool_call("get_weather")),
            Ok(LLMResponse::FinalAnswer("It's 31.2°C and hazy in Dhaka 🌫️".to_string())),
        ]));
        let weather = Arc::new(FixedWeather::new(weather_json()));
        let (agent, _) = agent(provider.clone(), weather);

        let response = agent.process_message("weather in Dhaka", "s", false).await;
        assert_eq!(response.tool_calls, Some(vec!["get_weather".to_string()]));
        let data = response.weather_data.unwrap();
        assert_eq!(data.temperature, 31.2);
        assert!(data.timestamp.is_some());

        let requests = provider.requests.lock().unwrap();
        let (format_messages, tools_offered) = &requests[1];
        assert!(!tools_offered);
        assert_eq!(format_messages.len(), 2);
        assert!(format_messages[1].content.contains("weather in Dhaka"));
    }

    #[tokio::test]
    async fn test_only_first_tool_call_runs() {
        let calls = vec![
            ToolCall::new("a", "get_forecast", ToolArguments::Absent),
            ToolCall::new("b", "get_weather", ToolArguments::Absent),
        ];
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(LLMResponse::ToolCalls(calls)),
            Ok(LLMResponse::FinalAnswer("formatted".to_string())),
        ]));
        let weather = Arc::new(FixedWeather::new(json!({"message": "Forecast not available yet."})));
        let (agent, _) = agent(provider, weather.clone());

        let response = agent.process_message("forecast for Dhaka", "s", false).await;
        assert_eq!(*weather.calls.lock().unwrap(), vec!["get_forecast"]);
        assert_eq!(response.tool_calls, Some(vec!["get_forecast".to_string()]));
        assert_eq!(response.response, FORECAST_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_forecast_parse_failure_downgrades_text() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(tool_call("get_forecast")),
            Ok(LLMResponse::FinalAnswer("Here's your forecast".to_string())),
        ]));
        let weather = Arc::new(FixedWeather::new(json!({"city": "Dhaka", "forecasts": "oops"})));
        let (agent, _) = agent(provider, weather);

        let response = agent.process_message("forecast Dhaka", "s", false).await;
        assert_eq!(response.response, FORECAST_DISPLAY_FAILED);
        assert!(response.forecast_data.is_none());
        // Memory keeps the formatted text
        assert_eq!(agent.history("s").await[1].content, "Here's your forecast");
    }

    #[tokio::test]
    async fn test_tool_error_apology() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(tool_call("get_weather"))]));
        let weather = Arc::new(FixedWeather::new(json!({"error": "HTTP error: 404 - city not found"})));
        let (agent, _) = agent(provider.clone(), weather);

        let response = agent.process_message("weather in Atlantis", "s", false).await;
        assert_eq!(
            response.response,
            "I'm sorry, I couldn't fetch the weather data: HTTP error: 404 - city not found. Please check the city name and try again."
        );
        assert_eq!(response.tool_calls, Some(vec!["get_weather".to_string()]));
        assert!(response.weather_data.is_none());
        assert_eq!(provider.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_provider_failure_becomes_apology() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(LLMError::NetworkError(
            "connection refused".to_string(),
        ))]));
        let (agent, _) = agent(provider, Arc::new(FixedWeather::new(weather_json())));

        let response = agent.process_message("hello", "keep-me", false).await;
        assert!(response
            .response
            .starts_with("I apologize, but I encountered an error: "));
        assert!(response.response.contains("connection refused"));
        assert_eq!(response.session_id, "keep-me");
    }

    #[tokio::test]
    async fn test_formatter_tool_call_becomes_apology() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(tool_call("get_weather")),
            Ok(tool_call("get_weather")),
        ]));
        let (agent, _) = agent(provider, Arc::new(FixedWeather::new(weather_json())));

        let response = agent.process_message("weather in Dhaka", "s", false).await;
        assert!(response.response.starts_with("I apologize"));
        assert!(response.weather_data.is_none());
    }

    #[tokio::test]
    async fn test_llm_timeout_becomes_apology() {
        let provider = Arc::new(ScriptedProvider {
            delay: Some(Duration::from_secs(5)),
            ..ScriptedProvider::new(vec![Ok(LLMResponse::FinalAnswer("late".to_string()))])
        });
        let (agent, _) = agent_with(
            provider,
            Arc::new(FixedWeather::new(weather_json())),
            Duration::from_millis(50),
        );

        let response = agent.process_message("hello", "s", false).await;
        assert!(response.response.contains("LLM call timed out"));
    }

    #[tokio::test]
    async fn test_secrets_scrubbed_from_apology() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(LLMError::AuthenticationFailed(
            "Invalid API Key gsk_abcdefghijklmnopqrstuvwxyz012345".to_string(),
        ))]));
        let (agent, _) = agent(provider, Arc::new(FixedWeather::new(weather_json())));

        let response = agent.process_message("hello", "s", false).await;
        assert!(response.response.contains("[REDACTED]"));
        assert!(!response.response.contains("gsk_"));
    }
}
