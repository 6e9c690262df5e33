//! Domain types shared by the keyword, fusion, cache and engine crates.

use serde::{Deserialize, Serialize};

pub type ChunkId = String;

/// Metadata attached to every indexed chunk.
///
/// `version` and `language` are optional because corpora ingested before
/// those fields existed carry neither; filters treat a missing value as a
/// non-match when the corresponding allow-list is active.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMeta {
    pub source: String,
    pub chunk_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// A chunk of a source document. Owned by the external corpus store; the
/// core only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: ChunkId,
    pub text: String,
    pub meta: ChunkMeta,
}

/// Which retrieval method produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Vector,
    Bm25,
    Hybrid,
}

impl Method {
    /// Tie-break priority when two methods return the same passage:
    /// lower wins, so a vector-sourced representative beats a keyword one.
    pub fn priority(self) -> u8 {
        match self {
            Method::Vector => 0,
            Method::Hybrid => 1,
            Method::Bm25 => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Vector => "vector",
            Method::Bm25 => "bm25",
            Method::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite identity merging "the same passage" across retrieval methods.
///
/// Uses text length rather than a content hash; two distinct chunks with
/// equal length at the same (source, chunk_index) are indistinguishable.
/// Known approximation, kept for output stability.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub source: String,
    pub chunk_index: usize,
    pub text_len: usize,
}

impl DedupKey {
    pub fn of(text: &str, meta: &ChunkMeta) -> Self {
        Self {
            source: meta.source.clone(),
            chunk_index: meta.chunk_index,
            text_len: text.len(),
        }
    }
}

/// Allow-list filters applied to retrieval candidates.
///
/// `None` or an empty list means "match everything"; a populated list
/// requires the metadata value to be present and listed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataFilter {
    #[serde(default)]
    pub languages: Option<Vec<String>>,
    #[serde(default)]
    pub versions: Option<Vec<String>>,
}

impl MetadataFilter {
    pub fn matches(&self, meta: &ChunkMeta) -> bool {
        if let Some(langs) = self.languages.as_deref() {
            if !langs.is_empty() {
                match meta.language.as_deref() {
                    Some(l) if langs.iter().any(|x| x == l) => {}
                    _ => return false,
                }
            }
        }
        if let Some(vers) = self.versions.as_deref() {
            if !vers.is_empty() {
                match meta.version.as_deref() {
                    Some(v) if vers.iter().any(|x| x == v) => {}
                    _ => return false,
                }
            }
        }
        true
    }

    pub fn is_empty(&self) -> bool {
        self.languages.as_deref().map_or(true, <[String]>::is_empty)
            && self.versions.as_deref().map_or(true, <[String]>::is_empty)
    }
}

/// One method's ranked output, as recorded by the parallel coordinator.
///
/// `error` is set (and the lists empty) when the method failed; a failed
/// method never fails its siblings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalOutcome {
    pub method: Method,
    pub documents: Vec<String>,
    pub metadatas: Vec<ChunkMeta>,
    #[serde(default)]
    pub scores: Vec<f32>,
    pub duration_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RetrievalOutcome {
    pub fn failed(method: Method, duration_ms: f64, error: String) -> Self {
        Self {
            method,
            documents: Vec::new(),
            metadatas: Vec::new(),
            scores: Vec::new(),
            duration_ms,
            error: Some(error),
        }
    }
}

/// Final fused ranking. Ordered by descending fused score, at most the
/// requested `top_k` entries, no two entries sharing a `DedupKey`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FusionResult {
    pub documents: Vec<String>,
    pub metadatas: Vec<ChunkMeta>,
    pub scores: Vec<f32>,
}

impl FusionResult {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn truncate(&mut self, top_k: usize) {
        self.documents.truncate(top_k);
        self.metadatas.truncate(top_k);
        self.scores.truncate(top_k);
    }
}
