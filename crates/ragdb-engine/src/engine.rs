//! The facade tying retrieval, fusion, caching and reranking together.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use ragdb_cache::{CacheStats, HitKind, SemanticQueryCache};
use ragdb_core::config::EngineConfig;
use ragdb_core::traits::{CorpusSnapshot, Embedder, LlmClient, VectorSearch};
use ragdb_core::types::{
    ChunkMeta, DedupKey, FusionResult, MetadataFilter, Method, RetrievalOutcome,
};
use ragdb_fusion::{rrf_fuse, to_similarity, weighted_fuse, MethodList};
use ragdb_keyword::KeywordIndex;
use ragdb_rerank::{PairwiseScorer, RerankStack};

use crate::multihop::{self, MultiHopReport};
use crate::rewrite;
use crate::vector::VectorRetriever;

/// Keyword side of a hybrid query always fetches at least this many
/// candidates, so fusion has material to work with at small top_k.
const MIN_KEYWORD_FETCH: usize = 10;

/// A `search` result plus how it was obtained.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub result: FusionResult,
    /// `None` when the pipeline ran; otherwise which kind of cache hit.
    pub cache_hit: Option<HitKind>,
}

pub struct RetrievalEngine {
    config: EngineConfig,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn LlmClient>,
    corpus: Arc<dyn CorpusSnapshot>,
    vector: VectorRetriever,
    keyword: KeywordIndex,
    cache: Arc<SemanticQueryCache<FusionResult>>,
    rerank: RerankStack,
}

impl RetrievalEngine {
    pub fn new(
        config: EngineConfig,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorSearch>,
        llm: Arc<dyn LlmClient>,
        corpus: Arc<dyn CorpusSnapshot>,
        pairwise: Option<Arc<dyn PairwiseScorer>>,
    ) -> ragdb_core::Result<Self> {
        config.validate()?;
        let cache = Arc::new(SemanticQueryCache::new(&config.cache));
        let rerank = RerankStack::new(
            pairwise,
            Arc::clone(&embedder),
            config.rerank_max_candidates,
            config.rerank_batch_size,
        );
        info!(method = %config.method, top_k = config.top_k, "retrieval engine ready");
        Ok(Self {
            config,
            embedder,
            llm,
            corpus,
            vector: VectorRetriever::new(store),
            keyword: KeywordIndex::new(),
            cache,
            rerank,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn llm(&self) -> &Arc<dyn LlmClient> {
        &self.llm
    }

    /// Shared handle to the query cache, for wiring up maintenance.
    pub fn cache(&self) -> Arc<SemanticQueryCache<FusionResult>> {
        Arc::clone(&self.cache)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn keyword_build_count(&self) -> u64 {
        self.keyword.build_count()
    }

    /// Call after any corpus mutation. The keyword index rebuilds lazily on
    /// the next query; cached results for the old corpus go stale on their
    /// own because the namespace follows the corpus fingerprint.
    pub fn notify_corpus_changed(&self) {
        self.keyword.invalidate();
    }

    /// Allow-lists from configuration.
    pub fn base_filter(&self) -> MetadataFilter {
        MetadataFilter {
            languages: self.config.languages.clone(),
            versions: self.config.versions.clone(),
        }
    }

    fn retrieve_keyword(
        &self,
        query: &str,
        top_k: usize,
        filter: &MetadataFilter,
    ) -> ragdb_core::Result<(Vec<String>, Vec<ChunkMeta>, Vec<f32>)> {
        self.keyword
            .query(self.corpus.as_ref(), query, top_k, filter)
    }

    /// Hybrid retrieval: both methods, fused by RRF (or the legacy weighted
    /// combination when RRF is disabled). A failed keyword side degrades to
    /// vector-only.
    pub fn retrieve_hybrid(
        &self,
        query: &str,
        top_k: usize,
        filter: &MetadataFilter,
    ) -> FusionResult {
        let n_fetch = top_k.max(MIN_KEYWORD_FETCH);
        let (v_docs, v_metas, v_dists) = self.vector.retrieve(query, n_fetch, filter);
        let (k_docs, k_metas, k_scores) = match self.retrieve_keyword(query, n_fetch, filter) {
            Ok(out) => out,
            Err(e) => {
                warn!(error = %e, "keyword retrieval failed; fusing vector side only");
                (Vec::new(), Vec::new(), Vec::new())
            }
        };

        if self.config.rrf_enable {
            let lists = [
                MethodList {
                    method: Method::Vector,
                    documents: v_docs,
                    metadatas: v_metas,
                },
                MethodList {
                    method: Method::Bm25,
                    documents: k_docs,
                    metadatas: k_metas,
                },
            ];
            rrf_fuse(&lists, self.config.rrf_k, top_k)
        } else {
            weighted_fuse(
                (v_docs.as_slice(), v_metas.as_slice(), v_dists.as_slice()),
                (k_docs.as_slice(), k_metas.as_slice(), k_scores.as_slice()),
                self.config.bm25_weight,
                top_k,
            )
        }
    }

    /// Single-method retrieval, dispatching on `method`. Vector scores are
    /// reported as similarities, keyword scores as raw BM25.
    pub fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        method: Method,
        filter: &MetadataFilter,
    ) -> FusionResult {
        match method {
            Method::Vector => {
                let (documents, metadatas, distances) = self.vector.retrieve(query, top_k, filter);
                FusionResult {
                    documents,
                    metadatas,
                    scores: to_similarity(&distances),
                }
            }
            Method::Bm25 => match self.retrieve_keyword(query, top_k, filter) {
                Ok((documents, metadatas, scores)) => FusionResult {
                    documents,
                    metadatas,
                    scores,
                },
                Err(e) => {
                    warn!(error = %e, "keyword retrieval failed; empty result");
                    FusionResult::default()
                }
            },
            Method::Hybrid => self.retrieve_hybrid(query, top_k, filter),
        }
    }

    /// One method's outcome with timing, for the parallel coordinator.
    pub fn retrieve_outcome(
        &self,
        method: Method,
        query: &str,
        top_k: usize,
        filter: &MetadataFilter,
    ) -> RetrievalOutcome {
        let started = Instant::now();
        // Keyword is the one method whose failure is reported rather than
        // silently degraded, so the coordinator can surface it.
        if method == Method::Bm25 {
            return match self.retrieve_keyword(query, top_k, filter) {
                Ok((documents, metadatas, scores)) => RetrievalOutcome {
                    method,
                    documents,
                    metadatas,
                    scores,
                    duration_ms: started.elapsed().as_secs_f64() * 1000.0,
                    error: None,
                },
                Err(e) => RetrievalOutcome::failed(
                    method,
                    started.elapsed().as_secs_f64() * 1000.0,
                    e.to_string(),
                ),
            };
        }
        let fused = self.retrieve(query, top_k, method, filter);
        RetrievalOutcome {
            method,
            documents: fused.documents,
            metadatas: fused.metadatas,
            scores: fused.scores,
            duration_ms: started.elapsed().as_secs_f64() * 1000.0,
            error: None,
        }
    }

    /// Hybrid retrieval over the original query plus LLM rewrites, fused
    /// across query variants with RRF. Falls back to plain hybrid when no
    /// rewrites come back.
    pub fn retrieve_aggregate(
        &self,
        query: &str,
        top_k: usize,
        filter: &MetadataFilter,
    ) -> FusionResult {
        let rewrites = rewrite::rewrite_queries(&self.llm, query, self.config.rewrite_n);
        let mut queries = vec![query.to_owned()];
        queries.extend(rewrites.into_iter().filter(|r| r != query));
        if queries.len() == 1 {
            return self.retrieve_hybrid(query, top_k, filter);
        }
        debug!(variants = queries.len(), "aggregating across query rewrites");

        let lists: Vec<MethodList> = queries
            .iter()
            .map(|q| {
                let fused = self.retrieve_hybrid(q, top_k, filter);
                MethodList {
                    method: Method::Hybrid,
                    documents: fused.documents,
                    metadatas: fused.metadatas,
                }
            })
            .collect();
        rrf_fuse(&lists, self.config.rrf_k, top_k)
    }

    /// Rerank a fused candidate set down to `top_k`. Fused scores follow
    /// their documents through the reorder.
    pub(crate) fn apply_rerank(
        &self,
        query: &str,
        fused: FusionResult,
        top_k: usize,
    ) -> FusionResult {
        let score_by_key: HashMap<DedupKey, f32> = fused
            .documents
            .iter()
            .zip(&fused.metadatas)
            .zip(&fused.scores)
            .map(|((d, m), &s)| (DedupKey::of(d, m), s))
            .collect();
        let (documents, metadatas) =
            self.rerank
                .rerank(query, fused.documents, fused.metadatas, top_k);
        let scores = documents
            .iter()
            .zip(&metadatas)
            .map(|(d, m)| score_by_key.get(&DedupKey::of(d, m)).copied().unwrap_or(0.0))
            .collect();
        FusionResult {
            documents,
            metadatas,
            scores,
        }
    }

    /// The full configured pipeline behind the semantic cache: rewrite
    /// aggregation if enabled, the configured method otherwise, reranking
    /// if enabled, and a cache write on the way out.
    pub fn search(&self, query: &str) -> SearchOutcome {
        let namespace = self.corpus.fingerprint();
        if let Some((result, kind)) = self.cache.get(query, self.embedder.as_ref(), &namespace) {
            return SearchOutcome {
                result,
                cache_hit: Some(kind),
            };
        }

        let filter = self.base_filter();
        let top_k = self.config.top_k;
        let base_k = if self.config.rerank_enable {
            top_k.max(self.config.rerank_top_n)
        } else {
            top_k
        };

        let fused = if self.config.rewrite_enable {
            self.retrieve_aggregate(query, base_k, &filter)
        } else {
            self.retrieve(query, base_k, self.config.method, &filter)
        };
        let result = if self.config.rerank_enable {
            self.apply_rerank(query, fused, top_k)
        } else {
            let mut fused = fused;
            fused.truncate(top_k);
            fused
        };

        self.cache
            .set(query, result.clone(), self.embedder.as_ref(), &namespace);
        SearchOutcome {
            result,
            cache_hit: None,
        }
    }

    /// Multi-hop question answering over the retrieval pipeline.
    pub fn search_multihop(&self, question: &str) -> MultiHopReport {
        multihop::run(self, question)
    }
}
