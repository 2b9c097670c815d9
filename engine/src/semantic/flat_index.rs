//! Exhaustive flat index persisted as JSON
//!
//! Three files live in the index directory: `index.json` (dimension and
//! vectors), `documents.json` and `metadata.json`. All three are rewritten on
//! every addition. Writes are serialized by the state mutex.

use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::VectorStoreStats;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::embedding::{is_zero, squared_l2, HashingEmbedder};
use super::{DocumentMetadata, SearchHit, SemanticStore};

const INDEX_FILE: &str = "index.json";
const DOCUMENTS_FILE: &str = "documents.json";
const METADATA_FILE: &str = "metadata.json";

pub const INDEX_TYPE: &str = "IndexFlatL2";

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedIndex {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

#[derive(Debug, Default)]
struct IndexState {
    vectors: Vec<Vec<f32>>,
    documents: Vec<String>,
    metadata: Vec<DocumentMetadata>,
}

pub struct FlatIndexStore {
    dir: PathBuf,
    embedder: HashingEmbedder,
    state: Mutex<IndexState>,
}

impl FlatIndexStore {
    /// Open (or create) the index stored in `dir`.
    ///
    /// # Errors
    /// Fails if the directory cannot be created, a file is unreadable, or the
    /// persisted dimension differs from `dimension`
    pub async fn open(dir: &Path, dimension: usize) -> Result<Self, EngineError> {
        tokio::fs::create_dir_all(dir).await?;
        let embedder = HashingEmbedder::new(dimension);

        let mut state = IndexState::default();
        if let Some(index) = read_json::<PersistedIndex>(&dir.join(INDEX_FILE)).await? {
            if index.dimension != embedder.dimension() {
                return Err(EngineError::SemanticStore(format!(
                    "Index dimension {} does not match configured dimension {}",
                    index.dimension,
                    embedder.dimension()
                )));
            }
            state.vectors = index.vectors;
        }
        state.documents = read_json(&dir.join(DOCUMENTS_FILE))
            .await?
            .unwrap_or_default();
        state.metadata = read_json(&dir.join(METADATA_FILE))
            .await?
            .unwrap_or_default();

        info!(
            "Semantic index at {} loaded with {} documents",
            dir.display(),
            state.documents.len()
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            embedder,
            state: Mutex::new(state),
        })
    }

    async fn persist(&self, state: &IndexState) -> Result<(), EngineError> {
        let index = PersistedIndex {
            dimension: self.embedder.dimension(),
            vectors: state.vectors.clone(),
        };
        write_json(&self.dir.join(INDEX_FILE), &index).await?;
        write_json(&self.dir.join(DOCUMENTS_FILE), &state.documents).await?;
        write_json(&self.dir.join(METADATA_FILE), &state.metadata).await?;
        Ok(())
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, EngineError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            EngineError::SemanticStore(format!("Failed to parse {}: {}", path.display(), e))
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), EngineError> {
    let bytes = serde_json::to_vec(value)?;
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

#[async_trait]
impl SemanticStore for FlatIndexStore {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn add_documents(
        &self,
        texts: &[String],
        metadata: &[DocumentMetadata],
    ) -> Result<(), EngineError> {
        if texts.len() != metadata.len() {
            return Err(EngineError::SemanticStore(format!(
                "Got {} documents but {} metadata entries",
                texts.len(),
                metadata.len()
            )));
        }
        if texts.is_empty() {
            return Ok(());
        }

        let mut state = self.state.lock().await;
        let previous = (
            state.vectors.len(),
            state.documents.len(),
            state.metadata.len(),
        );
        for (text, meta) in texts.iter().zip(metadata) {
            state.vectors.push(self.embedder.embed(text));
            state.documents.push(text.clone());
            state.metadata.push(meta.clone());
        }

        // Memory only keeps what made it to disk
        if let Err(e) = self.persist(&state).await {
            state.vectors.truncate(previous.0);
            state.documents.truncate(previous.1);
            state.metadata.truncate(previous.2);
            return Err(e);
        }

        debug!("Added {} documents to semantic index", texts.len());
        Ok(())
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, EngineError> {
        let query_vector = self.embedder.embed(query);
        if k == 0 || is_zero(&query_vector) {
            return Ok(Vec::new());
        }

        let state = self.state.lock().await;
        let mut scored: Vec<(usize, f32)> = state
            .vectors
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx < state.documents.len())
            .map(|(idx, vector)| (idx, squared_l2(&query_vector, vector)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(idx, distance)| SearchHit {
                text: state.documents[idx].clone(),
                distance,
                metadata: state.metadata.get(idx).cloned(),
            })
            .collect())
    }

    async fn stats(&self) -> VectorStoreStats {
        let state = self.state.lock().await;
        VectorStoreStats {
            enabled: true,
            total_documents: state.documents.len(),
            dimension: self.embedder.dimension(),
            index_type: INDEX_TYPE.to_string(),
        }
    }

    async fn clear(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        let empty = IndexState::default();
        self.persist(&empty).await?;
        *state = empty;
        info!("Semantic index cleared");
        Ok(())
    }
}
