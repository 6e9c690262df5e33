use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ragdb_core::traits::Embedder;
use ragdb_core::types::ChunkMeta;
use ragdb_core::{Error, Result};
use ragdb_rerank::{PairwiseScorer, RerankStack};

fn meta(source: &str) -> ChunkMeta {
    ChunkMeta {
        source: source.into(),
        chunk_index: 0,
        version: None,
        language: None,
    }
}

/// Embeds the query as [1, 0]; documents score by how often they contain
/// the word "relevant".
struct KeywordEmbedder;

impl Embedder for KeywordEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                if i == 0 {
                    vec![1.0, 0.0]
                } else {
                    let hits = t.matches("relevant").count() as f32;
                    // more "relevant" → closer to the query direction
                    vec![hits, 1.0]
                }
            })
            .collect())
    }
}

/// Scores by document length; counts invocations.
struct LengthScorer {
    available: bool,
    calls: AtomicUsize,
}

impl PairwiseScorer for LengthScorer {
    fn available(&self) -> bool {
        self.available
    }

    fn score(&self, _query: &str, documents: &[String]) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(documents.iter().map(|d| d.len() as f32).collect())
    }
}

struct BrokenScorer;

impl PairwiseScorer for BrokenScorer {
    fn available(&self) -> bool {
        true
    }

    fn score(&self, _query: &str, _documents: &[String]) -> Result<Vec<f32>> {
        Err(Error::backend("reranker", "model crashed"))
    }
}

fn docs(texts: &[&str]) -> (Vec<String>, Vec<ChunkMeta>) {
    (
        texts.iter().map(|t| (*t).to_owned()).collect(),
        texts.iter().map(|t| meta(t)).collect(),
    )
}

#[test]
fn pairwise_scorer_orders_by_score() {
    let scorer = Arc::new(LengthScorer {
        available: true,
        calls: AtomicUsize::new(0),
    });
    let stack = RerankStack::new(Some(scorer.clone()), Arc::new(KeywordEmbedder), 0, 32);
    let (d, m) = docs(&["bb", "dddd", "a"]);
    let (ranked, metas) = stack.rerank("q", d, m, 3);
    assert_eq!(ranked, vec!["dddd".to_owned(), "bb".to_owned(), "a".to_owned()]);
    assert_eq!(metas[0].source, "dddd");
    assert_eq!(scorer.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn unavailable_scorer_falls_back_to_embeddings() {
    let scorer = Arc::new(LengthScorer {
        available: false,
        calls: AtomicUsize::new(0),
    });
    let stack = RerankStack::new(Some(scorer.clone()), Arc::new(KeywordEmbedder), 0, 32);
    let (d, m) = docs(&["nothing here", "relevant relevant text", "relevant once"]);
    let (ranked, _) = stack.rerank("q", d, m, 3);
    assert_eq!(ranked[0], "relevant relevant text");
    assert_eq!(ranked[1], "relevant once");
    assert_eq!(ranked.len(), 3, "fallback still returns a full ordering");
    assert_eq!(scorer.calls.load(Ordering::SeqCst), 0, "unavailable scorer never called");
}

#[test]
fn scoring_failure_falls_back_without_error() {
    let stack = RerankStack::new(Some(Arc::new(BrokenScorer)), Arc::new(KeywordEmbedder), 0, 32);
    let (d, m) = docs(&["plain", "relevant stuff"]);
    let (ranked, _) = stack.rerank("q", d, m, 2);
    assert_eq!(ranked[0], "relevant stuff");
}

#[test]
fn max_candidates_bounds_rescoring() {
    let scorer = Arc::new(LengthScorer {
        available: true,
        calls: AtomicUsize::new(0),
    });
    // Only the first 2 candidates are rescored; the tail keeps its place.
    let stack = RerankStack::new(Some(scorer), Arc::new(KeywordEmbedder), 2, 32);
    let (d, m) = docs(&["bb", "dddd", "zzzzzzzz"]);
    let (ranked, _) = stack.rerank("q", d, m, 3);
    assert_eq!(
        ranked,
        vec!["dddd".to_owned(), "bb".to_owned(), "zzzzzzzz".to_owned()]
    );
}

#[test]
fn batching_splits_scorer_calls() {
    let scorer = Arc::new(LengthScorer {
        available: true,
        calls: AtomicUsize::new(0),
    });
    let stack = RerankStack::new(Some(scorer.clone()), Arc::new(KeywordEmbedder), 0, 2);
    let (d, m) = docs(&["a", "bb", "ccc", "dddd", "eeeee"]);
    let (ranked, _) = stack.rerank("q", d, m, 5);
    assert_eq!(ranked[0], "eeeee");
    assert_eq!(scorer.calls.load(Ordering::SeqCst), 3, "ceil(5/2) batches");
}

#[test]
fn truncates_to_top_k() {
    let stack = RerankStack::new(None, Arc::new(KeywordEmbedder), 0, 32);
    let (d, m) = docs(&["relevant a", "relevant b", "c", "d"]);
    let (ranked, metas) = stack.rerank("q", d, m, 2);
    assert_eq!(ranked.len(), 2);
    assert_eq!(metas.len(), 2);
}
