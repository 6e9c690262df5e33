//! BM25 scoring over a fixed, tokenized corpus snapshot.

use std::collections::HashMap;

use ragdb_core::types::{ChunkMeta, MetadataFilter};

use crate::tokenize::tokenize;

const K1: f32 = 1.5;
const B: f32 = 0.75;

/// Immutable scorer built from one corpus snapshot.
///
/// Empty documents are dropped at build time while keeping the remaining
/// document↔metadata alignment intact.
pub struct Bm25Snapshot {
    documents: Vec<String>,
    metadatas: Vec<ChunkMeta>,
    term_freqs: Vec<HashMap<String, u32>>,
    doc_lens: Vec<f32>,
    /// Document frequency per term across the snapshot.
    doc_freqs: HashMap<String, u32>,
    avg_doc_len: f32,
}

impl Bm25Snapshot {
    pub fn build(documents: Vec<String>, metadatas: Vec<ChunkMeta>) -> Self {
        let mut docs = Vec::new();
        let mut metas = Vec::new();
        let mut term_freqs = Vec::new();
        let mut doc_lens = Vec::new();
        let mut doc_freqs: HashMap<String, u32> = HashMap::new();

        for (doc, meta) in documents.into_iter().zip(metadatas) {
            if doc.trim().is_empty() {
                continue;
            }
            let tokens = tokenize(&doc);
            let mut tf: HashMap<String, u32> = HashMap::new();
            for t in &tokens {
                *tf.entry(t.clone()).or_default() += 1;
            }
            for term in tf.keys() {
                *doc_freqs.entry(term.clone()).or_default() += 1;
            }
            doc_lens.push(tokens.len() as f32);
            term_freqs.push(tf);
            docs.push(doc);
            metas.push(meta);
        }

        let avg_doc_len = if doc_lens.is_empty() {
            0.0
        } else {
            doc_lens.iter().sum::<f32>() / doc_lens.len() as f32
        };

        Self {
            documents: docs,
            metadatas: metas,
            term_freqs,
            doc_lens,
            doc_freqs,
            avg_doc_len,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Non-negative IDF: `ln((N - df + 0.5)/(df + 0.5) + 1)`.
    fn idf(&self, term: &str) -> f32 {
        let n = self.documents.len() as f32;
        let df = self.doc_freqs.get(term).copied().unwrap_or(0) as f32;
        (((n - df + 0.5) / (df + 0.5)) + 1.0).ln()
    }

    /// BM25 score of every document against `query_tokens`, aligned with
    /// the snapshot's document order.
    pub fn scores(&self, query_tokens: &[String]) -> Vec<f32> {
        let mut out = vec![0.0f32; self.documents.len()];
        if self.avg_doc_len <= 0.0 {
            return out;
        }
        for term in query_tokens {
            let idf = self.idf(term);
            for (i, tf_map) in self.term_freqs.iter().enumerate() {
                let tf = tf_map.get(term).copied().unwrap_or(0) as f32;
                if tf == 0.0 {
                    continue;
                }
                let norm = K1 * (1.0 - B + B * self.doc_lens[i] / self.avg_doc_len);
                out[i] += idf * (tf * (K1 + 1.0)) / (tf + norm);
            }
        }
        out
    }

    /// Ranked retrieval: descending score, ties broken by corpus order,
    /// filtered, truncated to `top_k`.
    pub fn query(
        &self,
        query: &str,
        top_k: usize,
        filter: &MetadataFilter,
    ) -> (Vec<String>, Vec<ChunkMeta>, Vec<f32>) {
        let tokens = tokenize(query);
        let scores = self.scores(&tokens);
        let mut idxs: Vec<usize> = (0..scores.len()).collect();
        // Stable by construction: equal scores keep ascending corpus order.
        idxs.sort_by(|&a, &b| {
            scores[b]
                .partial_cmp(&scores[a])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });

        let mut docs = Vec::new();
        let mut metas = Vec::new();
        let mut out_scores = Vec::new();
        for i in idxs {
            if !filter.matches(&self.metadatas[i]) {
                continue;
            }
            docs.push(self.documents[i].clone());
            metas.push(self.metadatas[i].clone());
            out_scores.push(scores[i]);
            if docs.len() >= top_k {
                break;
            }
        }
        (docs, metas, out_scores)
    }
}
