//! Local documentation index: a JSON file of pre-chunked passages.
//!
//! The index is produced by the ingestion pipeline and consumed read-only:
//!
//! ```json
//! {
//!   "embedding_model": "text-embedding-004",
//!   "chunks": [
//!     { "id": "persistence-0", "text": "...", "source": "concepts/persistence.md",
//!       "embedding": [0.01, -0.2] }
//!   ]
//! }
//! ```
//!
//! With an embedder attached, queries are embedded with the model the index
//! declares and ranked by cosine similarity. Chunks without embeddings, an
//! index with no declared model, or a failed embedding call fall back to
//! lexical ranking.

use async_trait::async_trait;
use docsage_core::error::RetrievalError;
use docsage_core::provider::{EmbeddingRequest, Provider};
use docsage_core::retrieval::{LocalSearch, Passage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::score::{cosine_similarity, lexical_score, query_terms, top_k};

/// One pre-chunked passage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexChunk {
    #[serde(default)]
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// On-disk layout of the index file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    pub chunks: Vec<IndexChunk>,
}

impl IndexFile {
    /// Read and parse an index file.
    pub fn read(path: &Path) -> Result<Self, RetrievalError> {
        if !path.exists() {
            return Err(RetrievalError::IndexUnavailable(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            RetrievalError::IndexUnavailable(format!("{}: {e}", path.display()))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| RetrievalError::InvalidIndex(format!("{}: {e}", path.display())))
    }
}

/// The local index, loaded from disk on first use.
pub struct LocalIndex {
    path: PathBuf,
    chunks: RwLock<Option<Arc<IndexFile>>>,
    embedder: Option<Arc<dyn Provider>>,
    embedding_model: Option<String>,
    min_score: f32,
}

impl LocalIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            chunks: RwLock::new(None),
            embedder: None,
            embedding_model: None,
            min_score: 0.0,
        }
    }

    /// An index backed by already-loaded chunks (no file).
    pub fn from_chunks(chunks: Vec<IndexChunk>) -> Self {
        Self {
            path: PathBuf::new(),
            chunks: RwLock::new(Some(Arc::new(IndexFile {
                embedding_model: None,
                chunks,
            }))),
            embedder: None,
            embedding_model: None,
            min_score: 0.0,
        }
    }

    /// Embed queries through `provider` and rank by cosine similarity.
    ///
    /// The query model is the one the index file declares, unless
    /// [`with_embedding_model`](Self::with_embedding_model) overrides it.
    pub fn with_embedder(mut self, provider: Arc<dyn Provider>) -> Self {
        self.embedder = Some(provider);
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the backing file is present (or chunks were supplied directly).
    pub fn is_available(&self) -> bool {
        self.path.as_os_str().is_empty() || self.path.exists()
    }

    async fn load(&self) -> Result<Arc<IndexFile>, RetrievalError> {
        if let Some(index) = self.chunks.read().await.as_ref() {
            return Ok(index.clone());
        }

        let mut slot = self.chunks.write().await;
        if let Some(index) = slot.as_ref() {
            return Ok(index.clone());
        }
        let index = Arc::new(IndexFile::read(&self.path)?);
        debug!(path = %self.path.display(), chunks = index.chunks.len(), "Local index loaded");
        *slot = Some(index.clone());
        Ok(index)
    }

    /// Only indexes whose every chunk carries a vector are embedded against.
    async fn embed_query(&self, index: &IndexFile, query: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        if index.chunks.is_empty() || index.chunks.iter().any(|c| c.embedding.is_none()) {
            return None;
        }
        let model = self
            .embedding_model
            .clone()
            .or_else(|| index.embedding_model.clone())?;

        let request = EmbeddingRequest {
            model,
            inputs: vec![query.to_string()],
        };
        match embedder.embed(request).await {
            Ok(response) => response.embeddings.into_iter().next(),
            Err(e) => {
                warn!(error = %e, "Query embedding failed, ranking lexically");
                None
            }
        }
    }

    fn rank(&self, index: &IndexFile, query: &str, query_embedding: Option<&[f32]>, k: usize) -> Vec<Passage> {
        let terms = query_terms(query);
        let vector_ready = query_embedding.is_some()
            && index.chunks.iter().all(|c| c.embedding.is_some());

        let scores: Vec<f32> = index
            .chunks
            .iter()
            .map(|chunk| match (vector_ready, query_embedding, &chunk.embedding) {
                (true, Some(q), Some(e)) => cosine_similarity(q, e),
                _ => lexical_score(&terms, &chunk.text),
            })
            .collect();

        top_k(&scores, k, self.min_score)
            .into_iter()
            .map(|i| {
                let chunk = &index.chunks[i];
                let source = if chunk.source.is_empty() {
                    chunk.id.clone()
                } else {
                    chunk.source.clone()
                };
                Passage::new(chunk.text.clone(), source)
            })
            .collect()
    }
}

#[async_trait]
impl LocalSearch for LocalIndex {
    fn name(&self) -> &str {
        "json-index"
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>, RetrievalError> {
        let index = self.load().await?;
        let embedding = self.embed_query(&index, query).await;
        let passages = self.rank(&index, query, embedding.as_deref(), k);
        debug!(query, hits = passages.len(), "Local search");
        Ok(passages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsage_core::error::ServiceError;
    use docsage_core::provider::{EmbeddingResponse, ProviderRequest, ProviderResponse};
    use std::io::Write;

    fn chunk(id: &str, text: &str, embedding: Option<Vec<f32>>) -> IndexChunk {
        IndexChunk {
            id: id.into(),
            text: text.into(),
            source: format!("{id}.md"),
            embedding,
        }
    }

    #[derive(Default)]
    struct AxisEmbedder {
        models: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Provider for AxisEmbedder {
        fn name(&self) -> &str {
            "axis"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ServiceError> {
            Err(ServiceError::NotConfigured("embedding only".into()))
        }

        async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ServiceError> {
            self.models.lock().unwrap().push(request.model.clone());
            let v = if request.inputs[0].contains("memory") {
                vec![1.0, 0.0]
            } else {
                vec![0.0, 1.0]
            };
            Ok(EmbeddingResponse {
                embeddings: vec![v],
                model: request.model,
            })
        }
    }

    #[tokio::test]
    async fn missing_file_is_index_unavailable() {
        let index = LocalIndex::new("/nonexistent/index.json");
        assert!(!index.is_available());
        assert!(matches!(
            index.search("anything", 3).await,
            Err(RetrievalError::IndexUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn malformed_file_is_invalid_index() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let index = LocalIndex::new(file.path());
        assert!(matches!(
            index.search("anything", 3).await,
            Err(RetrievalError::InvalidIndex(_))
        ));
    }

    #[tokio::test]
    async fn loads_file_and_ranks_lexically() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let body = serde_json::json!({
            "chunks": [
                {"id": "tools", "text": "Tools let agents call functions.", "source": "tools.md"},
                {"id": "persist", "text": "Add a checkpointer to enable persistence.", "source": "persistence.md"},
                {"id": "stream", "text": "Streaming tokens from a graph.", "source": "streaming.md"}
            ]
        });
        write!(file, "{body}").unwrap();

        let index = LocalIndex::new(file.path());
        let hits = index.search("How do I enable persistence?", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source, "persistence.md");
    }

    #[tokio::test]
    async fn respects_k() {
        let index = LocalIndex::from_chunks(vec![
            chunk("a", "graph nodes and edges", None),
            chunk("b", "graph state", None),
            chunk("c", "graph compile", None),
        ]);
        assert_eq!(index.search("graph", 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn ranks_by_cosine_when_embeddings_present() {
        let index = LocalIndex::from_chunks(vec![
            chunk("memory", "Short-term memory via checkpointers", Some(vec![0.9, 0.1])),
            chunk("tools", "Tool calling", Some(vec![0.1, 0.9])),
        ])
        .with_embedder(Arc::new(AxisEmbedder::default()))
        .with_embedding_model("axis-embed");

        let hits = index.search("memory", 1).await.unwrap();
        assert_eq!(hits[0].source, "memory.md");

        let hits = index.search("tool calling", 1).await.unwrap();
        assert_eq!(hits[0].source, "tools.md");
    }

    #[tokio::test]
    async fn declared_model_drives_vector_search_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let body = serde_json::json!({
            "embedding_model": "axis-embed",
            "chunks": [
                {"id": "tools", "text": "Tool calling", "source": "tools.md", "embedding": [0.1, 0.9]},
                {"id": "memory", "text": "Checkpointers", "source": "memory.md", "embedding": [0.9, 0.1]}
            ]
        });
        write!(file, "{body}").unwrap();

        let embedder = Arc::new(AxisEmbedder::default());
        let index = LocalIndex::new(file.path()).with_embedder(embedder.clone());

        // No lexical overlap with either chunk, so only the vectors can rank it
        let hits = index.search("conversation memory", 1).await.unwrap();
        assert_eq!(hits[0].source, "memory.md");
        assert_eq!(*embedder.models.lock().unwrap(), vec!["axis-embed".to_string()]);
    }

    #[tokio::test]
    async fn undeclared_model_ranks_lexically_without_embedding() {
        let embedder = Arc::new(AxisEmbedder::default());
        let index = LocalIndex::from_chunks(vec![
            chunk("memory", "Short-term memory via checkpointers", Some(vec![0.9, 0.1])),
            chunk("tools", "Tool calling", Some(vec![0.1, 0.9])),
        ])
        .with_embedder(embedder.clone());

        let hits = index.search("tool calling", 1).await.unwrap();
        assert_eq!(hits[0].source, "tools.md");
        assert!(embedder.models.lock().unwrap().is_empty());
    }
}
