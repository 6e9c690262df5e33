use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ragdb_core::config::EngineConfig;
use ragdb_core::traits::{CorpusSnapshot, Embedder, LlmClient, VectorHits, VectorSearch};
use ragdb_core::types::{ChunkMeta, DocumentChunk, MetadataFilter, Method};
use ragdb_core::{Error, Result};
use ragdb_engine::{retrieve_parallel, HitKind, RetrievalEngine};
use ragdb_rerank::PairwiseScorer;

fn meta(i: usize) -> ChunkMeta {
    ChunkMeta {
        source: format!("doc{i}"),
        chunk_index: 0,
        version: None,
        language: None,
    }
}

fn tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Deterministic embedding: byte-frequency histogram. Equal texts embed
/// identically; unrelated texts rarely clear a high similarity threshold.
struct HashEmbedder;

impl Embedder for HashEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; 16];
                for b in t.bytes() {
                    v[(b as usize) % 16] += 1.0;
                }
                v
            })
            .collect())
    }
}

/// Nearest-neighbor store scored by token overlap with the query.
struct MemoryStore {
    documents: Vec<String>,
    metadatas: Vec<ChunkMeta>,
}

impl MemoryStore {
    fn new(docs: &[&str]) -> Self {
        Self {
            documents: docs.iter().map(|d| (*d).to_owned()).collect(),
            metadatas: (0..docs.len()).map(meta).collect(),
        }
    }
}

impl VectorSearch for MemoryStore {
    fn search(&self, query: &str, top_n: usize, _filter: &MetadataFilter) -> Result<VectorHits> {
        let q = tokens(query);
        let mut scored: Vec<(f32, usize)> = self
            .documents
            .iter()
            .enumerate()
            .map(|(i, d)| {
                let overlap = q.intersection(&tokens(d)).count() as f32;
                // more overlap -> smaller distance
                (1.0 / (1.0 + overlap), i)
            })
            .collect();
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).expect("finite").then(a.1.cmp(&b.1)));
        scored.truncate(top_n);
        Ok(VectorHits {
            documents: scored.iter().map(|&(_, i)| self.documents[i].clone()).collect(),
            metadatas: scored.iter().map(|&(_, i)| self.metadatas[i].clone()).collect(),
            distances: scored.iter().map(|&(d, _)| d).collect(),
        })
    }
}

struct MemoryCorpus {
    documents: Vec<String>,
    metadatas: Vec<ChunkMeta>,
    fingerprint: Mutex<String>,
    fail: AtomicBool,
}

impl MemoryCorpus {
    fn new(docs: &[&str]) -> Self {
        Self {
            documents: docs.iter().map(|d| (*d).to_owned()).collect(),
            metadatas: (0..docs.len()).map(meta).collect(),
            fingerprint: Mutex::new("v1".to_owned()),
            fail: AtomicBool::new(false),
        }
    }

    fn set_fingerprint(&self, fp: &str) {
        *self.fingerprint.lock().expect("lock") = fp.to_owned();
    }
}

impl CorpusSnapshot for MemoryCorpus {
    fn snapshot(&self) -> Result<Vec<DocumentChunk>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::backend("corpus", "snapshot unavailable"));
        }
        Ok(self
            .documents
            .iter()
            .zip(&self.metadatas)
            .map(|(doc, meta)| DocumentChunk {
                id: format!("{}:{}", meta.source, meta.chunk_index),
                text: doc.clone(),
                meta: meta.clone(),
            })
            .collect())
    }

    fn fingerprint(&self) -> String {
        self.fingerprint.lock().expect("lock").clone()
    }
}

/// Always answers with the same canned response.
struct ScriptedLlm {
    response: String,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    fn new(response: &str) -> Self {
        Self {
            response: response.to_owned(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl LlmClient for ScriptedLlm {
    fn generate(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

struct FailingLlm;

impl LlmClient for FailingLlm {
    fn generate(&self, _prompt: &str) -> Result<String> {
        Err(Error::backend("llm", "model offline"))
    }
}

/// Burns wall clock on every call, for budget tests.
struct SlowLlm {
    delay: Duration,
}

impl LlmClient for SlowLlm {
    fn generate(&self, _prompt: &str) -> Result<String> {
        std::thread::sleep(self.delay);
        Err(Error::backend("llm", "too slow"))
    }
}

struct LengthScorer;

impl PairwiseScorer for LengthScorer {
    fn available(&self) -> bool {
        true
    }

    fn score(&self, _query: &str, documents: &[String]) -> Result<Vec<f32>> {
        Ok(documents.iter().map(|d| d.len() as f32).collect())
    }
}

const DOCS: &[&str] = &[
    "rust ownership model explained",
    "borrow checker rules for rust references",
    "garbage collection in managed languages",
    "async runtimes schedule tasks on worker threads",
    "ownership and borrowing teach memory safety",
];

fn build_engine(
    config: EngineConfig,
    corpus: Arc<MemoryCorpus>,
    llm: Arc<dyn LlmClient>,
    pairwise: Option<Arc<dyn PairwiseScorer>>,
) -> RetrievalEngine {
    RetrievalEngine::new(
        config,
        Arc::new(HashEmbedder),
        Arc::new(MemoryStore::new(DOCS)),
        llm,
        corpus,
        pairwise,
    )
    .expect("valid config")
}

#[test]
fn hybrid_ranks_doc_found_by_both_methods_first() {
    let corpus = Arc::new(MemoryCorpus::new(DOCS));
    let engine = build_engine(
        EngineConfig::default(),
        corpus,
        Arc::new(FailingLlm),
        None,
    );
    let fused = engine.retrieve_hybrid("rust ownership", 3, &MetadataFilter::default());
    assert!(!fused.is_empty());
    // "rust ownership model explained" matches both query terms in both
    // the vector store and the keyword index.
    assert_eq!(fused.documents[0], "rust ownership model explained");
    assert_eq!(fused.documents.len(), fused.scores.len());
}

#[test]
fn search_hits_cache_on_repeat() {
    let corpus = Arc::new(MemoryCorpus::new(DOCS));
    let engine = build_engine(
        EngineConfig::default(),
        corpus,
        Arc::new(FailingLlm),
        None,
    );

    let first = engine.search("rust ownership");
    assert!(first.cache_hit.is_none());
    let second = engine.search("rust ownership");
    assert_eq!(second.cache_hit, Some(HitKind::Exact));
    assert_eq!(first.result, second.result);

    let stats = engine.cache_stats();
    assert_eq!(stats.exact_hits, 1);
    assert_eq!(stats.size, 1);
}

#[test]
fn corpus_fingerprint_change_invalidates_cached_entries() {
    let corpus = Arc::new(MemoryCorpus::new(DOCS));
    let engine = build_engine(
        EngineConfig::default(),
        Arc::clone(&corpus),
        Arc::new(FailingLlm),
        None,
    );

    engine.search("rust ownership");
    corpus.set_fingerprint("v2");
    engine.notify_corpus_changed();
    // Same query, new namespace: the v1 entry must not answer.
    let outcome = engine.search("rust ownership");
    assert!(outcome.cache_hit.is_none());
}

#[test]
fn keyword_index_builds_once_across_queries() {
    let corpus = Arc::new(MemoryCorpus::new(DOCS));
    let mut config = EngineConfig::default();
    config.method = Method::Bm25;
    let engine = build_engine(config, corpus, Arc::new(FailingLlm), None);

    engine.retrieve("ownership", 3, Method::Bm25, &MetadataFilter::default());
    engine.retrieve("borrow", 3, Method::Bm25, &MetadataFilter::default());
    assert_eq!(engine.keyword_build_count(), 1);

    engine.notify_corpus_changed();
    engine.retrieve("ownership", 3, Method::Bm25, &MetadataFilter::default());
    assert_eq!(engine.keyword_build_count(), 2);
}

#[test]
fn aggregate_pulls_in_documents_surfaced_by_rewrites() {
    let corpus = Arc::new(MemoryCorpus::new(DOCS));
    let llm = Arc::new(ScriptedLlm::new(r#"["borrow checker references"]"#));
    let mut config = EngineConfig::default();
    config.rewrite_enable = true;
    config.rewrite_n = 1;
    let engine = build_engine(config, corpus, llm.clone(), None);

    let fused = engine.retrieve_aggregate("rust ownership", 4, &MetadataFilter::default());
    assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    assert!(fused
        .documents
        .iter()
        .any(|d| d == "borrow checker rules for rust references"));
    // The original query's best hit survives the cross-variant fusion.
    assert!(fused
        .documents
        .iter()
        .any(|d| d == "rust ownership model explained"));
}

#[test]
fn search_with_rerank_orders_by_scorer() {
    let corpus = Arc::new(MemoryCorpus::new(DOCS));
    let mut config = EngineConfig::default();
    config.method = Method::Hybrid;
    config.rerank_enable = true;
    config.rerank_top_n = 4;
    config.top_k = 3;
    let engine = build_engine(
        config,
        corpus,
        Arc::new(FailingLlm),
        Some(Arc::new(LengthScorer)),
    );

    let outcome = engine.search("rust ownership borrowing");
    assert_eq!(outcome.result.len(), 3);
    let lens: Vec<usize> = outcome.result.documents.iter().map(String::len).collect();
    let mut sorted = lens.clone();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    assert_eq!(lens, sorted, "documents ordered by descending scorer value");
    assert_eq!(outcome.result.scores.len(), 3, "scores stay aligned");
}

#[test]
fn multihop_with_broken_llm_degrades_to_single_hop_retrieval() {
    let corpus = Arc::new(MemoryCorpus::new(DOCS));
    let engine = build_engine(
        EngineConfig::default(),
        corpus,
        Arc::new(FailingLlm),
        None,
    );

    let report = engine.search_multihop("rust ownership");
    // Decomposition falls back to the question itself, so retrieval still
    // happens every hop.
    assert_eq!(report.hops_run, 2);
    assert!(report.subquestions.iter().all(|s| s == "rust ownership"));
    assert!(!report.result.is_empty());
    assert!(!report.budget_exhausted);
    assert_eq!(report.result.documents[0], "rust ownership model explained");
}

#[test]
fn multihop_respects_wall_clock_budget() {
    let corpus = Arc::new(MemoryCorpus::new(DOCS));
    let mut config = EngineConfig::default();
    config.multihop_budget_ms = 20;
    let engine = build_engine(
        config,
        corpus,
        Arc::new(SlowLlm {
            delay: Duration::from_millis(50),
        }),
        None,
    );

    let report = engine.search_multihop("rust ownership");
    assert!(report.budget_exhausted);
    // Whatever was gathered before the deadline still produces an answer
    // (here: nothing, so the single-hop fallback kicks in).
    assert!(!report.result.is_empty());
}

#[test]
fn multihop_subquestions_follow_the_decomposition() {
    let corpus = Arc::new(MemoryCorpus::new(DOCS));
    let llm = Arc::new(ScriptedLlm::new(
        r#"["what is ownership", "how does borrowing work"]"#,
    ));
    let mut config = EngineConfig::default();
    config.multihop_depth = 1;
    config.multihop_fanout = 2;
    let engine = build_engine(config, corpus, llm, None);

    let report = engine.search_multihop("explain rust memory safety");
    assert_eq!(report.hops_run, 1);
    assert_eq!(
        report.subquestions,
        vec![
            "what is ownership".to_owned(),
            "how does borrowing work".to_owned()
        ]
    );
    assert!(!report.result.is_empty());
}

#[tokio::test]
async fn parallel_isolates_a_failing_method() {
    let corpus = Arc::new(MemoryCorpus::new(DOCS));
    corpus.fail.store(true, Ordering::SeqCst);
    let engine = Arc::new(build_engine(
        EngineConfig::default(),
        corpus,
        Arc::new(FailingLlm),
        None,
    ));

    let results = retrieve_parallel(
        engine,
        "rust ownership",
        &[Method::Vector, Method::Bm25],
        3,
        &MetadataFilter::default(),
    )
    .await;

    let vector = &results[&Method::Vector];
    assert!(vector.error.is_none());
    assert!(!vector.documents.is_empty());
    assert!(vector.duration_ms >= 0.0);

    let keyword = &results[&Method::Bm25];
    assert!(keyword.error.is_some(), "corpus failure surfaces as method error");
    assert!(keyword.documents.is_empty());
}

#[tokio::test]
async fn parallel_runs_duplicate_methods_once() {
    let corpus = Arc::new(MemoryCorpus::new(DOCS));
    let engine = Arc::new(build_engine(
        EngineConfig::default(),
        corpus,
        Arc::new(FailingLlm),
        None,
    ));

    let results = retrieve_parallel(
        engine,
        "rust ownership",
        &[Method::Vector, Method::Vector, Method::Hybrid],
        3,
        &MetadataFilter::default(),
    )
    .await;
    assert_eq!(results.len(), 2);
}
