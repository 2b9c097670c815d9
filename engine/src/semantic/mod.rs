//! Semantic store
//!
//! Optional similarity index over past user messages. When disabled in
//! config, [`NullStore`] stands in so callers never branch on availability.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sdk::errors::EngineError;
use sdk::VectorStoreStats;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::VectorDbConfig;

pub mod embedding;
pub mod flat_index;

pub use embedding::HashingEmbedder;
pub use flat_index::FlatIndexStore;

/// Metadata stored alongside each document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentMetadata {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub role: String,
}

/// One search result
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub text: String,
    /// Squared L2 distance to the query; lower is closer
    pub distance: f32,
    pub metadata: Option<DocumentMetadata>,
}

#[async_trait]
pub trait SemanticStore: Send + Sync {
    fn is_enabled(&self) -> bool;

    /// Add documents with parallel metadata entries
    async fn add_documents(
        &self,
        texts: &[String],
        metadata: &[DocumentMetadata],
    ) -> Result<(), EngineError>;

    /// Up to `k` nearest documents, ascending by distance
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, EngineError>;

    async fn stats(&self) -> VectorStoreStats;

    /// Drop every document
    async fn clear(&self) -> Result<(), EngineError>;
}

/// Disabled store: accepts writes, never returns results
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStore;

#[async_trait]
impl SemanticStore for NullStore {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn add_documents(
        &self,
        _texts: &[String],
        _metadata: &[DocumentMetadata],
    ) -> Result<(), EngineError> {
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

/// Open the store selected by config.
///
/// # Errors
/// Returns `EngineError::SemanticStore` if an enabled index cannot be loaded
pub async fn open_store(config: &VectorDbConfig) -> Result<Arc<dyn SemanticStore>, EngineError> {
    if !config.enabled {
        tracing::debug!("Semantic store disabled");
        return Ok(Arc::new(NullStore));
    }

    let store = FlatIndexStore::open(&config.index_path, config.dimension).await?;
    Ok(Arc::new(store))
}
