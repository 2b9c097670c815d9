//! Conversational weather agent
//!
//! The orchestrator, the per-session memory it reads and writes, semantic
//! context retrieval, suggestions, and the chat handle that exposes all of it.

pub mod context;
pub mod conversation;
pub mod core;
pub mod handle;
pub mod prompts;
pub mod sessions;
pub mod suggestions;

pub use context::ContextRetriever;
pub use conversation::ConversationMemory;
pub use self::core::{AgentSettings, ChatAgent};
pub use handle::EngineChat;
pub use sessions::SessionRegistry;
pub use suggestions::SuggestionService;
