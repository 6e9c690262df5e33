//! Runs several retrieval methods concurrently and records per-method
//! timing and failure, so one broken backend never sinks the others.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tracing::{debug, warn};

use ragdb_core::types::{Method, MetadataFilter, RetrievalOutcome};

use crate::engine::RetrievalEngine;

/// Execute each requested method on the blocking pool and collect its
/// outcome. Duplicated methods are run once. A panicked or failed method
/// yields a `RetrievalOutcome` with `error` set and empty lists.
pub async fn retrieve_parallel(
    engine: Arc<RetrievalEngine>,
    query: &str,
    methods: &[Method],
    top_k: usize,
    filter: &MetadataFilter,
) -> HashMap<Method, RetrievalOutcome> {
    let mut seen = Vec::new();
    for &m in methods {
        if !seen.contains(&m) {
            seen.push(m);
        }
    }

    let tasks = seen.into_iter().map(|method| {
        let engine = Arc::clone(&engine);
        let query = query.to_owned();
        let filter = filter.clone();
        async move {
            let started = Instant::now();
            let joined = tokio::task::spawn_blocking(move || {
                engine.retrieve_outcome(method, &query, top_k, &filter)
            })
            .await;
            match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(%method, error = %e, "retrieval task aborted");
                    RetrievalOutcome::failed(
                        method,
                        started.elapsed().as_secs_f64() * 1000.0,
                        e.to_string(),
                    )
                }
            }
        }
    });

    let outcomes = join_all(tasks).await;
    for o in &outcomes {
        debug!(
            method = %o.method,
            hits = o.documents.len(),
            duration_ms = o.duration_ms,
            failed = o.error.is_some(),
            "method finished"
        );
    }
    outcomes.into_iter().map(|o| (o.method, o)).collect()
}
