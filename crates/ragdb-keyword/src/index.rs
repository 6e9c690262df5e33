//! Lazily-built keyword index with a single-build guarantee.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::debug;

use ragdb_core::traits::CorpusSnapshot;
use ragdb_core::types::{ChunkMeta, MetadataFilter};
use ragdb_core::Result;

use crate::bm25::Bm25Snapshot;

/// `Absent | Ready` state behind a lock, with a double-checked build path:
/// queries take the read lock and reuse the current snapshot; after an
/// invalidation the first caller takes the write lock, re-checks, and
/// builds while concurrent callers block and then observe the same
/// completed build.
#[derive(Default)]
pub struct KeywordIndex {
    state: RwLock<Option<Arc<Bm25Snapshot>>>,
    builds: AtomicU64,
}

impl KeywordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the index absent; the next query triggers a rebuild.
    /// Called on every corpus mutation (ingest/delete).
    pub fn invalidate(&self) {
        let mut guard = self.state.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
        debug!("keyword index invalidated");
    }

    /// How many builds have executed. Exposed for observability and the
    /// concurrency tests.
    pub fn build_count(&self) -> u64 {
        self.builds.load(Ordering::Relaxed)
    }

    /// Return the current snapshot, building it from `corpus` if absent.
    pub fn ensure(&self, corpus: &dyn CorpusSnapshot) -> Result<Arc<Bm25Snapshot>> {
        // Fast path: already built.
        if let Some(snap) = self
            .state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
        {
            return Ok(Arc::clone(snap));
        }

        let mut guard = self.state.write().unwrap_or_else(|e| e.into_inner());
        // Re-check: another caller may have built while we waited.
        if let Some(snap) = guard.as_ref() {
            return Ok(Arc::clone(snap));
        }

        let (documents, metadatas) = corpus
            .snapshot()?
            .into_iter()
            .map(|chunk| (chunk.text, chunk.meta))
            .unzip();
        let snap = Arc::new(Bm25Snapshot::build(documents, metadatas));
        self.builds.fetch_add(1, Ordering::Relaxed);
        debug!(docs = snap.len(), "keyword index built");
        *guard = Some(Arc::clone(&snap));
        Ok(snap)
    }

    /// Ranked keyword retrieval over the (possibly freshly built) index.
    pub fn query(
        &self,
        corpus: &dyn CorpusSnapshot,
        query: &str,
        top_k: usize,
        filter: &MetadataFilter,
    ) -> Result<(Vec<String>, Vec<ChunkMeta>, Vec<f32>)> {
        let snap = self.ensure(corpus)?;
        Ok(snap.query(query, top_k, filter))
    }
}
