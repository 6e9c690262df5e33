//! The retrieval pipeline: vector adapter, parallel coordinator, query
//! rewriting, multi-hop orchestration, and the `RetrievalEngine` facade
//! tying them to the keyword index, fusion, cache and reranker crates.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

mod engine;
mod multihop;
mod parallel;
mod rewrite;
mod vector;

pub use engine::{RetrievalEngine, SearchOutcome};
pub use multihop::MultiHopReport;
pub use parallel::retrieve_parallel;
pub use rewrite::extract_json_array;
pub use vector::VectorRetriever;

pub use ragdb_cache::{CacheMaintenance, HitKind};
pub use ragdb_fusion::{merge_results, MergeStrategy};
