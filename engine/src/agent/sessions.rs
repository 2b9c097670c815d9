//! Session registry
//!
//! Maps session keys to their [`ConversationMemory`]. Sessions are created on
//! first touch and dropped on clear. User messages are also written through to
//! the semantic store; a failed write is logged and the turn goes on.

use chrono::Utc;
use sdk::HistoryEntry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::conversation::ConversationMemory;
use crate::llm::{Message, MessageRole};
use crate::semantic::{DocumentMetadata, SemanticStore};

pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, ConversationMemory>>,
    system_prompt: String,
    max_turn_messages: usize,
    store: Arc<dyn SemanticStore>,
}

impl SessionRegistry {
    pub fn new(
        system_prompt: impl Into<String>,
        max_turn_messages: usize,
        store: Arc<dyn SemanticStore>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            system_prompt: system_prompt.into(),
            max_turn_messages,
            store,
        }
    }

    fn fresh_memory(&self) -> ConversationMemory {
        ConversationMemory::new(self.system_prompt.clone(), self.max_turn_messages)
    }

    /// Snapshot of a session's messages, creating the session if absent
    pub async fn get(&self, session_id: &str) -> Vec<Message> {
        if let Some(memory) = self.sessions.read().await.get(session_id) {
            return memory.messages().to_vec();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                debug!("Creating session '{}'", session_id);
                self.fresh_memory()
            })
            .messages()
            .to_vec()
    }

    /// Append a message to a session, creating the session if absent
    pub async fn append(&self, session_id: &str, role: MessageRole, content: &str) {
        {
            let mut sessions = self.sessions.write().await;
            sessions
                .entry(session_id.to_string())
                .or_insert_with(|| self.fresh_memory())
                .push(Message::new(role, content));
        }

        if role == MessageRole::User && self.store.is_enabled() {
            let metadata = DocumentMetadata {
                session_id: session_id.to_string(),
                timestamp: Utc::now(),
                role: role.to_string(),
            };
            if let Err(e) = self
                .store
                .add_documents(&[content.to_string()], &[metadata])
                .await
            {
                warn!("Failed to store message in semantic index: {}", e);
            }
        }
    }

    /// Drop a session's log; the next touch starts fresh
    pub async fn clear(&self, session_id: &str) {
        if self.sessions.write().await.remove(session_id).is_some() {
            debug!("Cleared session '{}'", session_id);
        }
    }

    /// Turn history of a session, system prompt excluded
    pub async fn history(&self, session_id: &str) -> Vec<HistoryEntry> {
        if let Some(memory) = self.sessions.read().await.get(session_id) {
            return memory.history();
        }
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| self.fresh_memory())
            .history()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::{NullStore, SearchHit};
    use async_trait::async_trait;
    use sdk::errors::EngineError;
    use sdk::VectorStoreStats;
    use std::sync::Mutex;

    /// Records writes, optionally failing them
    #[derive(Default)]
    struct RecordingStore {
        added: Mutex<Vec<(String, DocumentMetadata)>>,
        fail: bool,
    }

    #[async_trait]
    impl SemanticStore for RecordingStore {
        fn is_enabled(&self) -> bool {
            true
        }

        async fn add_documents(
            &self,
            texts: &[String],
            metadata: &[DocumentMetadata],
        ) -> Result<(), EngineError> {
            if self.fail {
                return Err(EngineError::SemanticStore("disk full".to_string()));
            }
            let mut added = self.added.lock().unwrap();
            for (text, meta) in texts.iter().zip(metadata) {
                added.push((text.clone(), meta.clone()));
            }
            Ok(())
        }

        async fn search(&self, _query: &str, _k: usize) -> Result<Vec<SearchHit>, EngineError> {
            Ok(Vec::new())
        }

        async fn stats(&self) -> VectorStoreStats {
            VectorStoreStats::disabled()
        }

        async fn clear(&self) -> Result<(), EngineError> {
            Ok(())
        }
    }

    fn registry() -> SessionRegistry {
        SessionRegistry::new("sys", 10, Arc::new(NullStore))
    }

    #[tokio::test]
    async fn test_get_creates_session_with_system_prompt() {
        let registry = registry();
        let messages = registry.get("a").await;
        assert_eq!(messages, vec![Message::system("sys")]);
        assert_eq!(registry.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let registry = registry();
        registry.append("a", MessageRole::User, "weather in Dhaka").await;
        registry.append("b", MessageRole::User, "hello").await;

        assert_eq!(registry.history("a").await[0].content, "weather in Dhaka");
        assert_eq!(registry.history("b").await[0].content, "hello");
        assert_eq!(registry.get("a").await.len(), 2);
    }

    #[tokio::test]
    async fn test_clear_then_history_is_empty() {
        let registry = registry();
        registry.append("s", MessageRole::User, "hi").await;
        registry.append("s", MessageRole::Assistant, "Hello! 👋").await;

        registry.clear("s").await;
        assert!(registry.history("s").await.is_empty());

        registry.append("s", MessageRole::User, "again").await;
        let messages = registry.get("s").await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::System);
        assert_eq!(messages[1].content, "again");
    }

    #[tokio::test]
    async fn test_only_user_messages_reach_semantic_store() {
        let store = Arc::new(RecordingStore::default());
        let registry = SessionRegistry::new("sys", 10, store.clone());

        registry.append("s1", MessageRole::User, "rain in Oslo?").await;
        registry.append("s1", MessageRole::Assistant, "Yes ☔").await;

        let added = store.added.lock().unwrap();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].0, "rain in Oslo?");
        assert_eq!(added[0].1.session_id, "s1");
        assert_eq!(added[0].1.role, "user");
    }

    #[tokio::test]
    async fn test_store_failure_does_not_block_append() {
        let store = Arc::new(RecordingStore {
            fail: true,
            ..Default::default()
        });
        let registry = SessionRegistry::new("sys", 10, store);

        registry.append("s", MessageRole::User, "hello").await;
        assert_eq!(registry.history("s").await.len(), 1);
    }
}
