//! Embedding-similarity reranker: cosine between the query embedding and
//! each document embedding, one batched embed call.

use std::sync::Arc;

use ragdb_core::traits::Embedder;
use ragdb_core::types::ChunkMeta;
use ragdb_core::Result;

pub struct EmbedReranker {
    embedder: Arc<dyn Embedder>,
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for i in 0..n {
        dot += a[i] * b[i];
        na += a[i] * a[i];
        nb += b[i] * b[i];
    }
    dot / (na.sqrt() * nb.sqrt() + 1e-12)
}

impl EmbedReranker {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    pub fn rerank(
        &self,
        query: &str,
        documents: Vec<String>,
        metadatas: Vec<ChunkMeta>,
        top_k: usize,
    ) -> Result<(Vec<String>, Vec<ChunkMeta>)> {
        if documents.is_empty() {
            return Ok((documents, metadatas));
        }
        let mut texts = Vec::with_capacity(documents.len() + 1);
        texts.push(query.to_owned());
        texts.extend(documents.iter().cloned());
        let mut embeddings = self.embedder.embed(&texts)?;
        let query_emb = embeddings.remove(0);

        let mut order: Vec<(f32, usize)> = embeddings
            .iter()
            .enumerate()
            .map(|(i, e)| (cosine(&query_emb, e), i))
            .collect();
        order.sort_by(|(sa, ia), (sb, ib)| {
            sb.partial_cmp(sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(ia.cmp(ib))
        });
        order.truncate(top_k);

        let docs = order.iter().map(|&(_, i)| documents[i].clone()).collect();
        let metas = order.iter().map(|&(_, i)| metadatas[i].clone()).collect();
        Ok((docs, metas))
    }
}
