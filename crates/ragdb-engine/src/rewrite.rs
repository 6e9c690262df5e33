//! LLM-backed query rewriting and sub-question decomposition.
//!
//! Models rarely return clean JSON, so the parser tolerates surrounding
//! prose and code fences: it takes the text between the first `[` and the
//! last `]` and tries that. Any failure degrades to a deterministic
//! fallback, never an error.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use ragdb_core::traits::LlmClient;

/// Pull a JSON string array out of a model response. String entries are
/// trimmed; numbers are stringified; other entry types and empties are
/// dropped. `None` when no parseable array is found.
pub fn extract_json_array(raw: &str) -> Option<Vec<String>> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    if end <= start {
        return None;
    }
    let items: Vec<Value> = serde_json::from_str(&raw[start..=end]).ok()?;
    let out: Vec<String> = items
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s.trim().to_owned()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect();
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Generate up to `n` alternative phrasings of `question`. The original
/// question is not included; callers prepend it. Empty on any failure.
pub fn rewrite_queries(llm: &Arc<dyn LlmClient>, question: &str, n: usize) -> Vec<String> {
    let prompt = format!(
        "Rewrite the following search query {n} different ways to improve recall. \
         Keep each rewrite short and self-contained. \
         Respond with ONLY a JSON array of {n} strings, nothing else.\n\nQuery: {question}"
    );
    match llm.generate(&prompt) {
        Ok(raw) => match extract_json_array(&raw) {
            Some(mut rewrites) => {
                let mut seen = std::collections::HashSet::new();
                rewrites.retain(|r| seen.insert(r.clone()));
                rewrites.truncate(n);
                debug!(count = rewrites.len(), "query rewrites generated");
                rewrites
            }
            None => {
                warn!("rewrite response had no JSON array; skipping rewrites");
                Vec::new()
            }
        },
        Err(e) => {
            warn!(error = %e, "query rewrite failed; skipping rewrites");
            Vec::new()
        }
    }
}

/// Break `question` into at most `fanout` independent sub-questions.
/// Falls back to the question itself when the model fails or returns
/// nothing usable, so a broken LLM degrades multi-hop to single-hop.
pub fn decompose(llm: &Arc<dyn LlmClient>, question: &str, fanout: usize) -> Vec<String> {
    let prompt = format!(
        "Decompose the question below into at most {fanout} simpler sub-questions \
         that can each be answered independently from a document corpus. \
         If it is already simple, return it unchanged as a single element. \
         Respond with ONLY a JSON array of strings, nothing else.\n\nQuestion: {question}"
    );
    match llm.generate(&prompt) {
        Ok(raw) => match extract_json_array(&raw) {
            Some(mut subs) => {
                subs.truncate(fanout);
                subs
            }
            None => {
                warn!("decomposition response had no JSON array; using the question as-is");
                vec![question.to_owned()]
            }
        },
        Err(e) => {
            warn!(error = %e, "decomposition failed; using the question as-is");
            vec![question.to_owned()]
        }
    }
}
