//! Semantic context retrieval
//!
//! Finds past user messages close to the incoming one. Any store failure
//! degrades to "no context".

use std::sync::Arc;
use tracing::{debug, warn};

use super::prompts::context_prompt;
use crate::llm::Message;
use crate::semantic::SemanticStore;

pub struct ContextRetriever {
    store: Arc<dyn SemanticStore>,
    threshold: f32,
}

impl ContextRetriever {
    pub fn new(store: Arc<dyn SemanticStore>, threshold: f32) -> Self {
        Self { store, threshold }
    }

    /// Up to `k` prior texts strictly closer than the threshold, nearest first
    pub async fn retrieve(&self, query: &str, k: usize) -> Vec<String> {
        if !self.store.is_enabled() {
            return Vec::new();
        }

        match self.store.search(query, k).await {
            Ok(hits) => {
                let similar: Vec<String> = hits
                    .into_iter()
                    .filter(|hit| hit.distance < self.threshold)
                    .map(|hit| hit.text)
                    .collect();
                debug!("Retrieved {} similar past queries", similar.len());
                similar
            }
            Err(e) => {
                warn!("Semantic search failed, continuing without context: {}", e);
                Vec::new()
            }
        }
    }

    /// System message to splice after the preamble, if there is any context
    pub fn context_message(similar: &[String]) -> Option<Message> {
        if similar.is_empty() {
            None
        } else {
            Some(Message::system(context_prompt(similar)))
        }
    }
}
