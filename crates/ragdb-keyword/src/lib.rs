//! In-memory BM25 keyword ranking over a corpus snapshot.
//!
//! The index is derived state: built lazily from `CorpusSnapshot`,
//! invalidated whenever the corpus mutates, rebuilt at most once per
//! invalidation even under concurrent queries.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

mod bm25;
mod index;
mod tokenize;

pub use bm25::Bm25Snapshot;
pub use index::KeywordIndex;
pub use tokenize::tokenize;
