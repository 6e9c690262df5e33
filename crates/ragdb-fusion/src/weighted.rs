//! Legacy weighted fusion: per-method min-max normalization combined as
//! `(1-w)*vector + w*keyword`.

use std::collections::HashMap;

use ragdb_core::types::{ChunkMeta, DedupKey, FusionResult};

/// Convert store-native distances to similarities via `1/(1+d)`.
/// NaN/Inf collapse to 0 similarity instead of propagating.
pub fn to_similarity(distances: &[f32]) -> Vec<f32> {
    distances
        .iter()
        .map(|&d| if d.is_finite() { 1.0 / (1.0 + d) } else { 0.0 })
        .collect()
}

/// Min-max normalize to [0,1]. A degenerate (all-equal) vector maps to all
/// 1.0 — documented legacy behavior, deliberately not corrected even though
/// it can overweight a uniformly-scored method.
pub fn min_max(values: &[f32]) -> Vec<f32> {
    if values.is_empty() {
        return Vec::new();
    }
    let clean: Vec<f32> = values
        .iter()
        .map(|&v| if v.is_finite() { v } else { 0.0 })
        .collect();
    let vmin = clean.iter().copied().fold(f32::INFINITY, f32::min);
    let vmax = clean.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if (vmax - vmin).abs() <= 1e-12 {
        return vec![1.0; clean.len()];
    }
    clean.iter().map(|&v| (v - vmin) / (vmax - vmin)).collect()
}

struct Cand {
    document: String,
    meta: ChunkMeta,
    vector: f32,
    keyword: f32,
}

/// Weighted normalized fusion of one vector list (with distances) and one
/// keyword list (with scores). `w` is the keyword weight, clamped to [0,1].
pub fn weighted_fuse(
    vector: (&[String], &[ChunkMeta], &[f32]),
    keyword: (&[String], &[ChunkMeta], &[f32]),
    w: f32,
    top_k: usize,
) -> FusionResult {
    let (v_docs, v_metas, v_dists) = vector;
    let (k_docs, k_metas, k_scores) = keyword;
    let v_norm = min_max(&to_similarity(v_dists));
    let k_norm = min_max(k_scores);
    let w = w.clamp(0.0, 1.0);

    let mut cands: HashMap<DedupKey, Cand> = HashMap::new();
    for ((doc, meta), &s) in v_docs.iter().zip(v_metas).zip(&v_norm) {
        cands.insert(
            DedupKey::of(doc, meta),
            Cand {
                document: doc.clone(),
                meta: meta.clone(),
                vector: s,
                keyword: 0.0,
            },
        );
    }
    for ((doc, meta), &s) in k_docs.iter().zip(k_metas).zip(&k_norm) {
        let key = DedupKey::of(doc, meta);
        match cands.get_mut(&key) {
            // Vector representative kept; only the keyword score lands.
            Some(c) => c.keyword = s,
            None => {
                cands.insert(
                    key,
                    Cand {
                        document: doc.clone(),
                        meta: meta.clone(),
                        vector: 0.0,
                        keyword: s,
                    },
                );
            }
        }
    }

    let mut scored: Vec<(DedupKey, f32, Cand)> = cands
        .into_iter()
        .map(|(key, c)| {
            let score = (1.0 - w) * c.vector + w * c.keyword;
            (key, score, c)
        })
        .collect();
    scored.sort_by(|(ka, sa, _), (kb, sb, _)| {
        sb.partial_cmp(sa)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                (&ka.source, ka.chunk_index, ka.text_len).cmp(&(
                    &kb.source,
                    kb.chunk_index,
                    kb.text_len,
                ))
            })
    });
    scored.truncate(top_k);

    let mut out = FusionResult::default();
    for (_, score, c) in scored {
        out.documents.push(c.document);
        out.metadatas.push(c.meta);
        out.scores.push(score);
    }
    out
}
