//! Chat API Server
//!
//! Provides the REST surface the chat UI talks to. Every route is a thin
//! pass-through to the engine's [`ChatHandle`]; the server holds no
//! conversation state of its own.
//!
//! # Endpoints
//!
//! - POST /chat - Run one conversation turn
//! - GET /chat/history - Visible history for a session
//! - POST /chat/clear - Drop a session's history
//! - GET /chat/health - Dependency health
//! - POST /suggestions - Weather-driven suggestions for a city
//! - GET / - Service banner
//! - GET /health - Liveness probe

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use sdk::{
    ChatMessage, ChatResponse, ConversationHistory, CoreContext, EngineError, HealthCheck,
    NimbusErrorExt, SuggestionRequest, SuggestionResponse,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;

const SERVICE_NAME: &str = "Nimbus Weather Assistant";

/// Query string shared by the session-scoped routes
#[derive(Debug, Deserialize)]
struct SessionQuery {
    #[serde(default = "default_session")]
    session_id: String,
}

/// Query string of `POST /chat`
#[derive(Debug, Deserialize)]
struct ChatQuery {
    #[serde(default = "default_session")]
    session_id: String,
    #[serde(default = "default_use_context")]
    use_context: bool,
}

fn default_session() -> String {
    "default".to_string()
}

fn default_use_context() -> bool {
    true
}

/// Error body in the `{"detail": ...}` shape the UI expects
struct ApiError {
    status: StatusCode,
    detail: String,
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation(detail) => Self {
                status: StatusCode::BAD_REQUEST,
                detail,
            },
            other => {
                tracing::error!("Chat request failed: {}", other);
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    detail: other.user_hint().to_string(),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

/// Chat API server
pub struct APIServer {
    ctx: CoreContext,
    host: String,
    port: u16,
    addr: Option<SocketAddr>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl APIServer {
    /// Create a new APIServer bound to `host:port` once started
    pub fn new(ctx: CoreContext, host: impl Into<String>, port: u16) -> Self {
        Self {
            ctx,
            host: host.into(),
            port,
            addr: None,
            shutdown_tx: None,
        }
    }

    /// Build the router without binding a socket
    pub fn router(&self) -> Router {
        Router::new()
            .route("/chat", post(chat_handler))
            .route("/chat/", post(chat_handler))
            .route("/chat/history", get(history_handler))
            .route("/chat/clear", post(clear_handler))
            .route("/chat/health", get(chat_health_handler))
            .route("/suggestions", post(suggestions_handler))
            .route("/health", get(health_handler))
            .route("/", get(index_handler))
            .layer(CorsLayer::permissive())
            .with_state(self.ctx.clone())
    }

    /// Bind and serve in the background. Returns the bound address.
    pub async fn start(&mut self) -> Result<SocketAddr, EngineError> {
        let bind = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&bind)
            .await
            .map_err(|e| EngineError::Network(format!("Failed to bind to {}: {}", bind, e)))?;

        let addr = listener
            .local_addr()
            .map_err(|e| EngineError::Network(format!("Failed to get local address: {}", e)))?;

        tracing::info!("API server bound to {}", addr);

        let app = self.router();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            tracing::info!("API server listening on http://{}", addr);

            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_rx.await.ok();
                    tracing::info!("API server shutting down gracefully");
                })
                .await
                .unwrap_or_else(|e| {
                    tracing::error!("API server error: {}", e);
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
            tracing::info!("API server stopped");
        }
    }

    /// Address the server is bound to, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.addr
    }
}

impl Drop for APIServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn chat_handler(
    State(ctx): State<CoreContext>,
    Query(query): Query<ChatQuery>,
    Json(payload): Json<ChatMessage>,
) -> Result<Json<ChatResponse>, ApiError> {
    let response = ctx
        .chat
        .submit_message(&payload.message, &query.session_id, query.use_context)
        .await?;
    Ok(Json(response))
}

async fn history_handler(
    State(ctx): State<CoreContext>,
    Query(query): Query<SessionQuery>,
) -> Json<ConversationHistory> {
    let history = ctx.chat.history(&query.session_id).await;
    let now = Utc::now();
    Json(ConversationHistory {
        session_id: query.session_id,
        history,
        created_at: now,
        updated_at: now,
    })
}

async fn clear_handler(
    State(ctx): State<CoreContext>,
    Query(query): Query<SessionQuery>,
) -> Json<Value> {
    ctx.chat.clear_history(&query.session_id).await;
    Json(json!({
        "message": format!("History cleared for session: {}", query.session_id)
    }))
}

async fn chat_health_handler(State(ctx): State<CoreContext>) -> Json<HealthCheck> {
    Json(ctx.chat.health().await)
}

async fn suggestions_handler(
    State(ctx): State<CoreContext>,
    Json(request): Json<SuggestionRequest>,
) -> Result<Json<SuggestionResponse>, ApiError> {
    let city = request.city.trim();
    if city.is_empty() {
        return Err(EngineError::Validation("City cannot be empty".to_string()).into());
    }
    Ok(Json(
        ctx.chat.suggestions(city, request.context.as_deref()).await,
    ))
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": SERVICE_NAME }))
}

async fn index_handler() -> Json<Value> {
    Json(json!({
        "message": format!("Welcome to {}", SERVICE_NAME),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "/chat": "Chat with the weather assistant",
            "/chat/history": "Conversation history for a session",
            "/chat/clear": "Clear a session",
            "/chat/health": "Dependency health",
            "/suggestions": "Weather-based suggestions"
        }
    }))
}
