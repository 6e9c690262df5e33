//! Collaborator seams, injected at engine construction.
//!
//! The embedding/LLM/vector backends live outside this workspace; the core
//! consumes them through these single-method traits and never reaches for a
//! global client.

use crate::error::Result;
use crate::types::{ChunkMeta, DocumentChunk, MetadataFilter};

/// Batch text embedding. Used by the semantic cache and the embedding
/// reranker fallback.
pub trait Embedder: Send + Sync {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Raw hits from the external nearest-neighbor store, aligned by index.
/// `distances` are store-native (lower = closer).
#[derive(Debug, Clone, Default)]
pub struct VectorHits {
    pub documents: Vec<String>,
    pub metadatas: Vec<ChunkMeta>,
    pub distances: Vec<f32>,
}

/// Query interface of the external ANN store. Implementations may apply
/// `filter` themselves or ignore it; the adapter re-filters either way.
pub trait VectorSearch: Send + Sync {
    fn search(&self, query: &str, top_n: usize, filter: &MetadataFilter) -> Result<VectorHits>;
}

/// Text generation, used for query rewriting and sub-question
/// decomposition. Responses are expected to contain a JSON array, possibly
/// surrounded by prose.
pub trait LlmClient: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String>;
}

/// Read access to the corpus for keyword-index rebuilds.
///
/// `fingerprint` identifies the corpus snapshot (e.g. an ingest stamp) and
/// scopes the semantic cache namespace; it must change whenever the corpus
/// mutates.
pub trait CorpusSnapshot: Send + Sync {
    fn snapshot(&self) -> Result<Vec<DocumentChunk>>;
    fn fingerprint(&self) -> String;
}
