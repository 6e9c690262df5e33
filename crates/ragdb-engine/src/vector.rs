//! Adapter over the external nearest-neighbor store.
//!
//! Filtering happens after the store call, so the adapter over-fetches
//! (5× top_k, floor 25, ceiling 200) to keep top_k reachable when the
//! allow-lists discard matches. Native rank order is preserved.

use std::sync::Arc;

use tracing::warn;

use ragdb_core::traits::{VectorHits, VectorSearch};
use ragdb_core::types::{ChunkMeta, MetadataFilter};

const OVERFETCH_FLOOR: usize = 25;
const OVERFETCH_CEILING: usize = 200;

pub struct VectorRetriever {
    store: Arc<dyn VectorSearch>,
}

impl VectorRetriever {
    pub fn new(store: Arc<dyn VectorSearch>) -> Self {
        Self { store }
    }

    /// Top-k lookup with metadata filtering. An unreachable store yields an
    /// empty result, never an error: fusion proceeds with partial data.
    pub fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        filter: &MetadataFilter,
    ) -> (Vec<String>, Vec<ChunkMeta>, Vec<f32>) {
        let n_fetch = (top_k * 5).max(OVERFETCH_FLOOR).min(OVERFETCH_CEILING);
        let hits = match self.store.search(query, n_fetch, filter) {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "vector store unreachable; returning empty result");
                VectorHits::default()
            }
        };

        let mut docs = Vec::new();
        let mut metas = Vec::new();
        let mut dists = Vec::new();
        for ((doc, meta), &dist) in hits
            .documents
            .iter()
            .zip(&hits.metadatas)
            .zip(&hits.distances)
        {
            if !filter.matches(meta) {
                continue;
            }
            docs.push(doc.clone());
            metas.push(meta.clone());
            dists.push(dist);
            if docs.len() >= top_k {
                break;
            }
        }
        (docs, metas, dists)
    }
}
