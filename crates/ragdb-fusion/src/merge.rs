//! Coordinator-facing merge of per-method outcomes.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use ragdb_core::types::{DedupKey, FusionResult, Method, RetrievalOutcome};

use crate::rrf::{rrf_fuse, MethodList};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Reciprocal Rank Fusion with the given k.
    Rrf { k: u32 },
    /// Order-preserving concatenation with dedup, methods in priority order.
    Concatenate,
    /// Majority vote by appearance count across methods.
    Vote,
}

/// Merge the outcome map produced by the parallel coordinator. Failed
/// methods (`error` set) are skipped; they already logged on their own.
pub fn merge_results(
    results: &HashMap<Method, RetrievalOutcome>,
    strategy: MergeStrategy,
    top_k: usize,
) -> FusionResult {
    // Deterministic method order regardless of map iteration.
    let mut ok: Vec<&RetrievalOutcome> = results
        .values()
        .filter(|r| r.error.is_none())
        .collect();
    ok.sort_by_key(|r| r.method.priority());
    debug!(methods = ok.len(), ?strategy, "merging retrieval outcomes");

    match strategy {
        MergeStrategy::Rrf { k } => {
            let lists: Vec<MethodList> = ok
                .iter()
                .map(|r| MethodList {
                    method: r.method,
                    documents: r.documents.clone(),
                    metadatas: r.metadatas.clone(),
                })
                .collect();
            rrf_fuse(&lists, k, top_k)
        }
        MergeStrategy::Concatenate => {
            let mut seen: HashSet<DedupKey> = HashSet::new();
            let mut out = FusionResult::default();
            'outer: for r in ok {
                for (doc, meta) in r.documents.iter().zip(&r.metadatas) {
                    if !seen.insert(DedupKey::of(doc, meta)) {
                        continue;
                    }
                    out.documents.push(doc.clone());
                    out.metadatas.push(meta.clone());
                    if out.len() >= top_k {
                        break 'outer;
                    }
                }
            }
            out
        }
        MergeStrategy::Vote => {
            struct Tally {
                votes: u32,
                first_seen: usize,
                document: String,
                meta: ragdb_core::types::ChunkMeta,
            }
            let mut tallies: HashMap<DedupKey, Tally> = HashMap::new();
            let mut order = 0usize;
            for r in ok {
                for (doc, meta) in r.documents.iter().zip(&r.metadatas) {
                    let key = DedupKey::of(doc, meta);
                    match tallies.get_mut(&key) {
                        Some(t) => t.votes += 1,
                        None => {
                            tallies.insert(
                                key,
                                Tally {
                                    votes: 1,
                                    first_seen: order,
                                    document: doc.clone(),
                                    meta: meta.clone(),
                                },
                            );
                            order += 1;
                        }
                    }
                }
            }
            let mut entries: Vec<Tally> = tallies.into_values().collect();
            entries.sort_by(|a, b| b.votes.cmp(&a.votes).then(a.first_seen.cmp(&b.first_seen)));
            entries.truncate(top_k);

            let mut out = FusionResult::default();
            for t in entries {
                out.documents.push(t.document);
                out.metadatas.push(t.meta);
                out.scores.push(t.votes as f32);
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragdb_core::types::ChunkMeta;

    fn meta(source: &str, idx: usize) -> ChunkMeta {
        ChunkMeta {
            source: source.into(),
            chunk_index: idx,
            version: None,
            language: None,
        }
    }

    fn outcome(method: Method, docs: &[(&str, &str)]) -> RetrievalOutcome {
        RetrievalOutcome {
            method,
            documents: docs.iter().map(|(d, _)| (*d).to_owned()).collect(),
            metadatas: docs.iter().map(|(_, s)| meta(s, 0)).collect(),
            scores: Vec::new(),
            duration_ms: 1.0,
            error: None,
        }
    }

    fn as_map(outcomes: Vec<RetrievalOutcome>) -> HashMap<Method, RetrievalOutcome> {
        outcomes.into_iter().map(|o| (o.method, o)).collect()
    }

    #[test]
    fn failed_methods_are_skipped() {
        let mut results = as_map(vec![outcome(Method::Vector, &[("v", "a")])]);
        results.insert(
            Method::Bm25,
            RetrievalOutcome::failed(Method::Bm25, 2.0, "backend down".into()),
        );
        let merged = merge_results(&results, MergeStrategy::Rrf { k: 60 }, 5);
        assert_eq!(merged.documents, vec!["v".to_owned()]);
    }

    #[test]
    fn concatenate_dedups_preserving_order() {
        let results = as_map(vec![
            outcome(Method::Vector, &[("x", "a"), ("y", "b")]),
            outcome(Method::Bm25, &[("x", "a"), ("z", "c")]),
        ]);
        let merged = merge_results(&results, MergeStrategy::Concatenate, 10);
        assert_eq!(
            merged.documents,
            vec!["x".to_owned(), "y".to_owned(), "z".to_owned()]
        );
    }

    #[test]
    fn vote_ranks_by_appearance_count() {
        let results = as_map(vec![
            outcome(Method::Vector, &[("both", "a"), ("v-only", "b")]),
            outcome(Method::Bm25, &[("k-only", "c"), ("both", "a")]),
        ]);
        let merged = merge_results(&results, MergeStrategy::Vote, 10);
        assert_eq!(merged.documents[0], "both");
        assert_eq!(merged.scores[0], 2.0);
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn rrf_merge_caps_at_top_k() {
        let results = as_map(vec![outcome(
            Method::Vector,
            &[("a", "a"), ("b", "b"), ("c", "c")],
        )]);
        let merged = merge_results(&results, MergeStrategy::Rrf { k: 60 }, 2);
        assert_eq!(merged.len(), 2);
    }
}
