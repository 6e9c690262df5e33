//! Semantic query cache: maps a query to a previously computed result by
//! embedding similarity, not just exact text, namespaced per corpus
//! snapshot. Caching is an optimization — every failure path degrades to a
//! miss, never to an error.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

mod cache;
mod maintenance;

pub use cache::{cosine_similarity, CacheStats, EntryInfo, HitKind, SemanticQueryCache};
pub use maintenance::CacheMaintenance;
