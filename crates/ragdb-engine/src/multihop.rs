//! Multi-hop retrieval: decompose, retrieve per sub-question, fuse the
//! accumulated evidence.
//!
//! The hop loop is bounded three ways: depth (1..=3), per-question fanout
//! (1..=3, first hop may widen to 5), and an optional wall-clock budget
//! checked cooperatively before each LLM call and each retrieval. Blowing
//! the budget stops expansion; evidence gathered so far is still fused.

use std::collections::HashSet;
use std::time::Instant;

use tracing::{debug, info, warn};

use ragdb_core::types::{DedupKey, FusionResult, Method};
use ragdb_fusion::{rrf_fuse, MethodList};

use crate::engine::RetrievalEngine;
use crate::rewrite;

/// What a multi-hop run did, alongside its fused result.
#[derive(Debug, Clone)]
pub struct MultiHopReport {
    pub result: FusionResult,
    /// Every sub-question retrieved against, in execution order.
    pub subquestions: Vec<String>,
    pub hops_run: usize,
    pub budget_exhausted: bool,
}

struct Budget {
    deadline: Option<Instant>,
}

impl Budget {
    fn new(budget_ms: u64) -> Self {
        Self {
            deadline: (budget_ms > 0)
                .then(|| Instant::now() + std::time::Duration::from_millis(budget_ms)),
        }
    }

    fn exhausted(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

pub(crate) fn run(engine: &RetrievalEngine, question: &str) -> MultiHopReport {
    let config = engine.config();
    let filter = engine.base_filter();
    let top_k = config.top_k;
    // Retrieve wide enough per sub-question that the terminal rerank has
    // candidates to choose from.
    let per_sub_k = if config.rerank_enable {
        top_k.max(config.rerank_top_n)
    } else {
        top_k
    };

    let budget = Budget::new(config.multihop_budget_ms);
    let mut budget_exhausted = false;

    let mut frontier = vec![question.to_owned()];
    let mut subquestions: Vec<String> = Vec::new();
    let mut evidence: Vec<MethodList> = Vec::new();
    let mut seen: HashSet<DedupKey> = HashSet::new();
    let mut hops_run = 0usize;

    'hops: for hop in 0..config.multihop_depth {
        if budget.exhausted() {
            budget_exhausted = true;
            break;
        }
        let fanout = if hop == 0 {
            config
                .multihop_fanout_first_hop
                .unwrap_or(config.multihop_fanout)
        } else {
            config.multihop_fanout
        };

        hops_run += 1;
        let mut next_frontier = Vec::new();
        for q in &frontier {
            if budget.exhausted() {
                budget_exhausted = true;
                break 'hops;
            }
            let subs = rewrite::decompose(engine.llm(), q, fanout);
            for sub in subs {
                if budget.exhausted() {
                    budget_exhausted = true;
                    break 'hops;
                }
                let fused = engine.retrieve_hybrid(&sub, per_sub_k, &filter);
                let mut fresh = 0usize;
                for (doc, meta) in fused.documents.iter().zip(&fused.metadatas) {
                    if seen.insert(DedupKey::of(doc, meta)) {
                        fresh += 1;
                    }
                }
                debug!(hop, sub = %sub, hits = fused.len(), fresh, "sub-question retrieved");
                if !fused.is_empty() {
                    evidence.push(MethodList {
                        method: Method::Hybrid,
                        documents: fused.documents,
                        metadatas: fused.metadatas,
                    });
                }
                subquestions.push(sub.clone());
                next_frontier.push(sub);
            }
        }
        frontier = next_frontier;
        if frontier.is_empty() {
            break;
        }
    }

    // No evidence at all (every decomposition dead-ended, or the store is
    // empty for every sub-question): retry as a plain single-hop query.
    if evidence.is_empty() {
        warn!("multi-hop gathered no evidence; falling back to single-hop");
        let fused = engine.retrieve_hybrid(question, per_sub_k, &filter);
        let result = finish(engine, question, fused, top_k);
        return MultiHopReport {
            result,
            subquestions,
            hops_run,
            budget_exhausted,
        };
    }

    let fused = rrf_fuse(&evidence, config.rrf_k, per_sub_k);
    let result = finish(engine, question, fused, top_k);
    info!(
        subquestions = subquestions.len(),
        hops_run,
        budget_exhausted,
        results = result.len(),
        "multi-hop complete"
    );
    MultiHopReport {
        result,
        subquestions,
        hops_run,
        budget_exhausted,
    }
}

fn finish(
    engine: &RetrievalEngine,
    question: &str,
    fused: FusionResult,
    top_k: usize,
) -> FusionResult {
    if engine.config().rerank_enable {
        engine.apply_rerank(question, fused, top_k)
    } else {
        let mut fused = fused;
        fused.truncate(top_k);
        fused
    }
}
