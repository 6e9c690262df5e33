//! Candidate reranking: a high-quality pairwise scorer with a transparent
//! embedding-similarity fallback.
//!
//! The caller only requires a relevance ordering, so scorer unavailability
//! is never surfaced as an error — the stack silently switches variants.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

mod embed;
mod stack;

pub use embed::EmbedReranker;
pub use stack::RerankStack;

use ragdb_core::Result;

/// Scores (query, document) pairs directly, e.g. a cross-encoder.
///
/// `available` may be false when the backing model failed to load; the
/// stack then routes around it.
pub trait PairwiseScorer: Send + Sync {
    fn available(&self) -> bool;
    /// One relevance score per document, higher = more relevant.
    fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>>;
}
