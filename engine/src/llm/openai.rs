//! OpenAI-compatible chat completions provider
//!
//! Serves both Groq and OpenAI: the two expose the same `/chat/completions`
//! endpoint and differ only in base URL, model and API key.

use super::{LLMError, LLMProvider, LLMResponse, Message, ToolCall, ToolDefinition};
use crate::tools::ToolArguments;
use async_trait::async_trait;
use sdk::SecretString;
use serde_json::{json, Value};

pub struct OpenAICompatProvider {
    name: String,
    base_url: String,
    model: String,
    api_key: SecretString,
    temperature: f64,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAICompatProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: SecretString,
        temperature: f64,
        max_tokens: u32,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            temperature,
            max_tokens,
            client: reqwest::Client::new(),
        }
    }

    fn build_payload(&self, messages: &[Message], tools: Option<&[ToolDefinition]>) -> Value {
        let api_messages: Vec<Value> = messages
            .iter()
            .map(|msg| {
                json!({
                    "role": msg.role.to_string(),
                    "content": msg.content
                })
            })
            .collect();

        let mut payload = json!({
            "model": self.model,
            "messages": api_messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        // tool_choice is rejected by the API unless tools are sent too
        if let Some(tools) = tools.filter(|t| !t.is_empty()) {
            payload["tools"] = Value::Array(tools.iter().map(|t| t.to_openai_format()).collect());
            payload["tool_choice"] = json!("auto");
        }

        payload
    }
}

/// Converts the `message` object of the first choice into a response.
///
/// Structured `tool_calls` win over content. When tools were offered, text
/// that looks like a tool call is also treated as one.
fn parse_choice_message(message: &Value, tools_offered: bool) -> super::Result<LLMResponse> {
    if let Some(raw_calls) = message.get("tool_calls").and_then(|c| c.as_array()) {
        let calls: Vec<ToolCall> = raw_calls
            .iter()
            .filter_map(|call| {
                let function = call.get("function")?;
                let name = function.get("name")?.as_str()?;
                let id = call
                    .get("id")
                    .and_then(|id| id.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(ToolCall::generated_id);
                let arguments = function
                    .get("arguments")
                    .cloned()
                    .map(ToolArguments::from)
                    .unwrap_or_default();
                Some(ToolCall::new(id, name, arguments))
            })
            .collect();

        if !calls.is_empty() {
            return Ok(LLMResponse::ToolCalls(calls));
        }
    }

    let content = match message.get("content") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => {
            return Err(LLMError::ParseError(format!(
                "Unexpected content type: {}",
                other
            )))
        }
    };

    if tools_offered {
        if let Some(tool_call) = super::parse_tool_calls(&content) {
            return Ok(LLMResponse::ToolCalls(vec![tool_call]));
        }
    }

    Ok(LLMResponse::FinalAnswer(content))
}

#[async_trait]
impl LLMProvider for OpenAICompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_local(&self) -> bool {
        false
    }

    async fn check_health(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn generate(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> super::Result<LLMResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let payload = self.build_payload(messages, tools);

        tracing::debug!(
            "{} request: model={}, messages={}, tools={}",
            self.name,
            self.model,
            messages.len(),
            tools.map(|t| t.len()).unwrap_or(0)
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key.unsecure()))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LLMError::Timeout
                } else {
                    LLMError::NetworkError(e.without_url().to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(LLMError::AuthenticationFailed(text));
            } else if status.as_u16() == 429 {
                return Err(LLMError::RateLimitExceeded);
            } else {
                return Err(LLMError::InvalidRequest(format!("HTTP {}: {}", status, text)));
            }
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        let choice = data
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| LLMError::ParseError("No choices in response".to_string()))?;

        let message = choice
            .get("message")
            .ok_or_else(|| LLMError::ParseError("No message in choice".to_string()))?;

        parse_choice_message(message, tools.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MessageRole;

    fn provider() -> OpenAICompatProvider {
        OpenAICompatProvider::new(
            "groq",
            "https://api.groq.com/openai/v1/",
            "llama3-groq-70b-8192-tool-use-preview",
            SecretString::new("gsk_test"),
            0.7,
            800,
        )
    }

    fn weather_tool() -> ToolDefinition {
        ToolDefinition {
            name: "get_weather".to_string(),
            description: "Get the current weather for a specified city".to_string(),
            parameters: json!({"type": "object"}),
        }
    }

    #[test]
    fn test_payload_with_tools() {
        let tools = [weather_tool()];
        let payload = provider().build_payload(&[Message::user("weather in Dhaka?")], Some(&tools));

        assert_eq!(payload["tool_choice"], "auto");
        assert_eq!(payload["tools"][0]["function"]["name"], "get_weather");
        assert_eq!(payload["max_tokens"], 800);
        assert_eq!(payload["messages"][0]["role"], "user");
    }

    #[test]
    fn test_payload_without_tools() {
        let payload = provider().build_payload(&[Message::new(MessageRole::System, "hi")], None);
        assert!(payload.get("tools").is_none());
        assert!(payload.get("tool_choice").is_none());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        assert_eq!(provider().base_url, "https://api.groq.com/openai/v1");
    }

    #[test]
    fn test_structured_tool_calls() {
        let message = json!({
            "content": null,
            "tool_calls": [{
                "id": "call_abc",
                "type": "function",
                "function": {"name": "get_weather", "arguments": "{\"city\":\"Dhaka\"}"}
            }]
        });

        match parse_choice_message(&message, true).unwrap() {
            LLMResponse::ToolCalls(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].id, "call_abc");
                assert_eq!(
                    calls[0].arguments,
                    ToolArguments::Text("{\"city\":\"Dhaka\"}".to_string())
                );
            }
            other => panic!("expected tool calls, got {:?}", other),
        }
    }

    #[test]
    fn test_null_content_is_empty_answer() {
        let message = json!({"role": "assistant", "content": null});
        assert_eq!(
            parse_choice_message(&message, false).unwrap(),
            LLMResponse::FinalAnswer(String::new())
        );
    }

    #[test]
    fn test_text_tool_call_only_when_tools_offered() {
        let message = json!({
            "content": "{\"name\": \"get_weather\", \"arguments\": {\"city\": \"Oslo\"}}"
        });
        assert!(matches!(
            parse_choice_message(&message, true).unwrap(),
            LLMResponse::ToolCalls(_)
        ));
        assert!(matches!(
            parse_choice_message(&message, false).unwrap(),
            LLMResponse::FinalAnswer(_)
        ));
    }
}
