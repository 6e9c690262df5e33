//! Reciprocal Rank Fusion: score = Σ 1/(k + rank) per method, 1-based rank.

use std::collections::HashMap;

use tracing::debug;

use ragdb_core::types::{ChunkMeta, DedupKey, FusionResult, Method};

/// One method's ranked output, best first. `documents` and `metadatas` are
/// aligned by index.
#[derive(Debug, Clone)]
pub struct MethodList {
    pub method: Method,
    pub documents: Vec<String>,
    pub metadatas: Vec<ChunkMeta>,
}

struct Accum {
    score: f64,
    priority: u8,
    document: String,
    meta: ChunkMeta,
}

/// Fuse ranked lists with RRF, merging candidates by `DedupKey` before
/// score accumulation.
///
/// The output is invariant to the ordering of `lists` (commutative merge):
/// scores are sums, the representative is chosen by method priority (vector
/// over keyword), and score ties are broken on the key itself.
pub fn rrf_fuse(lists: &[MethodList], k: u32, top_k: usize) -> FusionResult {
    let mut by_key: HashMap<DedupKey, Accum> = HashMap::new();

    for list in lists {
        for (rank0, (doc, meta)) in list.documents.iter().zip(&list.metadatas).enumerate() {
            let key = DedupKey::of(doc, meta);
            let contribution = 1.0 / (f64::from(k) + (rank0 + 1) as f64);
            let priority = list.method.priority();
            match by_key.get_mut(&key) {
                Some(acc) => {
                    acc.score += contribution;
                    if priority < acc.priority {
                        acc.priority = priority;
                        acc.document = doc.clone();
                        acc.meta = meta.clone();
                    }
                }
                None => {
                    by_key.insert(
                        key,
                        Accum {
                            score: contribution,
                            priority,
                            document: doc.clone(),
                            meta: meta.clone(),
                        },
                    );
                }
            }
        }
    }

    let mut entries: Vec<(DedupKey, Accum)> = by_key.into_iter().collect();
    entries.sort_by(|(ka, a), (kb, b)| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                (&ka.source, ka.chunk_index, ka.text_len).cmp(&(
                    &kb.source,
                    kb.chunk_index,
                    kb.text_len,
                ))
            })
    });
    entries.truncate(top_k);
    debug!(candidates = entries.len(), k, "rrf fusion complete");

    let mut out = FusionResult::default();
    for (_, acc) in entries {
        out.documents.push(acc.document);
        out.metadatas.push(acc.meta);
        out.scores.push(acc.score as f32);
    }
    out
}
