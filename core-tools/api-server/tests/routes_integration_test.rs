//! Integration tests for the chat API routes
//!
//! Binds the server to an ephemeral port over a scripted chat handle.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use api_server::APIServer;
use sdk::{
    ChatHandle, ChatHandleImpl, ChatResponse, CoreContext, HealthCheck, HistoryEntry, Suggestion,
    SuggestionPriority, SuggestionResponse, VectorStoreStats,
};

/// Echoes messages back and records them per session
#[derive(Default)]
struct EchoChat {
    sessions: Mutex<HashMap<String, Vec<HistoryEntry>>>,
    contexts: Mutex<Vec<bool>>,
}

#[async_trait]
impl ChatHandleImpl for EchoChat {
    async fn submit_message(&self, message: &str, session_id: &str, use_context: bool) -> ChatResponse {
        self.contexts.lock().unwrap().push(use_context);
        let reply = format!("echo: {}", message);
        let mut sessions = self.sessions.lock().unwrap();
        let log = sessions.entry(session_id.to_string()).or_default();
        log.push(HistoryEntry {
            role: "user".to_string(),
            content: message.to_string(),
        });
        log.push(HistoryEntry {
            role: "assistant".to_string(),
            content: reply.clone(),
        });
        ChatResponse::text(reply, session_id)
    }

    async fn history(&self, session_id: &str) -> Vec<HistoryEntry> {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn clear_history(&self, session_id: &str) {
        self.sessions.lock().unwrap().remove(session_id);
    }

    async fn health(&self) -> HealthCheck {
        HealthCheck {
            status: "degraded".to_string(),
            api: "healthy".to_string(),
            weather_server: "unreachable".to_string(),
            llm_configured: true,
            vector_store: VectorStoreStats::disabled(),
        }
    }

    async fn suggestions(&self, city: &str, _context: Option<&str>) -> SuggestionResponse {
        SuggestionResponse {
            city: city.to_string(),
            suggestions: vec![Suggestion {
                category: "General".to_string(),
                suggestion: "Check weather conditions before going out".to_string(),
                priority: SuggestionPriority::Medium,
                icon: "🌤️".to_string(),
            }],
            generated_at: chrono::Utc::now(),
        }
    }
}

async fn start() -> (APIServer, Arc<EchoChat>, String) {
    let chat = Arc::new(EchoChat::default());
    let ctx = CoreContext::new(ChatHandle::new(chat.clone()));
    let mut server = APIServer::new(ctx, "127.0.0.1", 0);
    let addr = server.start().await.unwrap();
    (server, chat, format!("http://{}", addr))
}

#[tokio::test]
async fn test_chat_round_trip_and_history() {
    let (_server, chat, base) = start().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/chat?session_id=s1&use_context=false", base))
        .json(&json!({ "message": "hello" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["response"], "echo: hello");
    assert_eq!(body["session_id"], "s1");
    assert_eq!(body["tool_calls"], Value::Null);
    assert_eq!(*chat.contexts.lock().unwrap(), vec![false]);

    let history: Value = client
        .get(format!("{}/chat/history?session_id=s1", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history["session_id"], "s1");
    assert_eq!(history["history"].as_array().unwrap().len(), 2);
    assert_eq!(history["history"][0]["role"], "user");
}

#[tokio::test]
async fn test_empty_message_is_bad_request() {
    let (_server, chat, base) = start().await;

    let response = reqwest::Client::new()
        .post(format!("{}/chat", base))
        .json(&json!({ "message": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "detail": "Message cannot be empty" }));
    assert!(chat.contexts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_oversized_message_is_bad_request() {
    let (_server, _chat, base) = start().await;

    let response = reqwest::Client::new()
        .post(format!("{}/chat", base))
        .json(&json!({ "message": "x".repeat(1001) }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_clear_then_history_is_empty() {
    let (_server, _chat, base) = start().await;
    let client = reqwest::Client::new();

    client
        .post(format!("{}/chat?session_id=s2", base))
        .json(&json!({ "message": "weather in Paris" }))
        .send()
        .await
        .unwrap();

    let cleared: Value = client
        .post(format!("{}/chat/clear?session_id=s2", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cleared["message"], "History cleared for session: s2");

    let history: Value = client
        .get(format!("{}/chat/history?session_id=s2", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history["history"], json!([]));
}

#[tokio::test]
async fn test_health_and_suggestions() {
    let (_server, _chat, base) = start().await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/chat/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["vector_store"]["enabled"], false);

    let suggestions: Value = client
        .post(format!("{}/suggestions", base))
        .json(&json!({ "city": "Dhaka" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(suggestions["city"], "Dhaka");
    assert_eq!(suggestions["suggestions"][0]["priority"], "medium");

    let liveness: Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(liveness["status"], "healthy");
}
