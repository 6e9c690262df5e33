//! Result fusion: merge ranked lists from multiple retrieval methods into
//! one ranking, deduplicated by `DedupKey`.
//!
//! Two per-call strategies (RRF and legacy weighted normalization) plus the
//! coordinator-facing merge (`rrf` / `concatenate` / `vote`).

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

mod merge;
mod rrf;
mod weighted;

pub use merge::{merge_results, MergeStrategy};
pub use rrf::{rrf_fuse, MethodList};
pub use weighted::{min_max, to_similarity, weighted_fuse};
