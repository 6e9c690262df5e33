use std::sync::Arc;

use tracing::{debug, warn};

use ragdb_core::traits::Embedder;
use ragdb_core::types::ChunkMeta;

use crate::embed::EmbedReranker;
use crate::PairwiseScorer;

/// The reranker the engine talks to: pairwise scorer if configured and
/// available, embedding fallback otherwise, original order as a last
/// resort. Never fails.
pub struct RerankStack {
    pairwise: Option<Arc<dyn PairwiseScorer>>,
    embed: EmbedReranker,
    /// 0 = rescore everything; otherwise only the first N candidates are
    /// rescored, the tail keeps its original order behind them.
    max_candidates: usize,
    batch_size: usize,
}

impl RerankStack {
    pub fn new(
        pairwise: Option<Arc<dyn PairwiseScorer>>,
        embedder: Arc<dyn Embedder>,
        max_candidates: usize,
        batch_size: usize,
    ) -> Self {
        Self {
            pairwise,
            embed: EmbedReranker::new(embedder),
            max_candidates,
            batch_size: batch_size.max(1),
        }
    }

    pub fn rerank(
        &self,
        query: &str,
        documents: Vec<String>,
        metadatas: Vec<ChunkMeta>,
        top_k: usize,
    ) -> (Vec<String>, Vec<ChunkMeta>) {
        if documents.is_empty() {
            return (documents, metadatas);
        }

        // Bound the rescoring work; the tail stays in original order.
        let cap = if self.max_candidates == 0 {
            documents.len()
        } else {
            self.max_candidates.min(documents.len())
        };
        let mut head_docs = documents;
        let mut head_metas = metadatas;
        let tail_docs = head_docs.split_off(cap);
        let tail_metas = head_metas.split_off(cap);

        let (mut docs, mut metas) = self.rerank_head(query, head_docs, head_metas, top_k);
        for (d, m) in tail_docs.into_iter().zip(tail_metas) {
            if docs.len() >= top_k {
                break;
            }
            docs.push(d);
            metas.push(m);
        }
        (docs, metas)
    }

    fn rerank_head(
        &self,
        query: &str,
        documents: Vec<String>,
        metadatas: Vec<ChunkMeta>,
        top_k: usize,
    ) -> (Vec<String>, Vec<ChunkMeta>) {
        if let Some(scorer) = self.pairwise.as_ref().filter(|s| s.available()) {
            match self.score_batched(scorer.as_ref(), query, &documents) {
                Ok(scores) => {
                    let mut order: Vec<(f32, usize)> =
                        scores.into_iter().enumerate().map(|(i, s)| (s, i)).collect();
                    order.sort_by(|(sa, ia), (sb, ib)| {
                        sb.partial_cmp(sa)
                            .unwrap_or(std::cmp::Ordering::Equal)
                            .then(ia.cmp(ib))
                    });
                    order.truncate(top_k);
                    let docs = order.iter().map(|&(_, i)| documents[i].clone()).collect();
                    let metas = order.iter().map(|&(_, i)| metadatas[i].clone()).collect();
                    debug!("pairwise rerank applied");
                    return (docs, metas);
                }
                Err(e) => {
                    warn!(error = %e, "pairwise scorer failed; falling back to embeddings");
                }
            }
        }

        match self
            .embed
            .rerank(query, documents.clone(), metadatas.clone(), top_k)
        {
            Ok(out) => out,
            Err(e) => {
                // Last resort: keep the fused order.
                warn!(error = %e, "embedding rerank failed; keeping original order");
                let mut docs = documents;
                let mut metas = metadatas;
                docs.truncate(top_k);
                metas.truncate(top_k);
                (docs, metas)
            }
        }
    }

    fn score_batched(
        &self,
        scorer: &dyn PairwiseScorer,
        query: &str,
        documents: &[String],
    ) -> ragdb_core::Result<Vec<f32>> {
        let mut scores = Vec::with_capacity(documents.len());
        for batch in documents.chunks(self.batch_size) {
            scores.extend(scorer.score(query, batch)?);
        }
        Ok(scores)
    }
}
