//! Demo CLI: runs the retrieval engine over an in-process corpus with a
//! deterministic hash embedder, so the whole pipeline can be exercised
//! without external model or database services.

use std::env;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use ragdb_core::config::EngineConfig;
use ragdb_core::traits::{CorpusSnapshot, Embedder, LlmClient, VectorHits, VectorSearch};
use ragdb_core::types::{ChunkMeta, DocumentChunk, Method, MetadataFilter};
use ragdb_core::{Error, Result};
use ragdb_engine::{retrieve_parallel, CacheMaintenance, RetrievalEngine};

/// Byte-frequency histogram embedding. Not semantically meaningful, but
/// deterministic and cheap, which is all the demo needs.
struct HashEmbedder;

impl Embedder for HashEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; 64];
                for b in t.to_lowercase().bytes() {
                    v[(b as usize) % 64] += 1.0;
                }
                v
            })
            .collect())
    }
}

/// In-memory nearest-neighbor store over pre-embedded passages.
struct MemoryStore {
    documents: Vec<String>,
    metadatas: Vec<ChunkMeta>,
    embeddings: Vec<Vec<f32>>,
}

impl MemoryStore {
    fn build(documents: Vec<String>, metadatas: Vec<ChunkMeta>) -> Result<Self> {
        let embeddings = HashEmbedder.embed(&documents)?;
        Ok(Self {
            documents,
            metadatas,
            embeddings,
        })
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    dot / (na.sqrt() * nb.sqrt() + 1e-10)
}

impl VectorSearch for MemoryStore {
    fn search(&self, query: &str, top_n: usize, _filter: &MetadataFilter) -> Result<VectorHits> {
        let q = HashEmbedder
            .embed(&[query.to_owned()])?
            .pop()
            .ok_or_else(|| Error::backend("embed", "no vector returned"))?;
        let mut scored: Vec<(f32, usize)> = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(i, e)| (1.0 - cosine(&q, e), i))
            .collect();
        scored.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        scored.truncate(top_n);
        Ok(VectorHits {
            documents: scored.iter().map(|&(_, i)| self.documents[i].clone()).collect(),
            metadatas: scored.iter().map(|&(_, i)| self.metadatas[i].clone()).collect(),
            distances: scored.iter().map(|&(d, _)| d).collect(),
        })
    }
}

struct StaticCorpus {
    documents: Vec<String>,
    metadatas: Vec<ChunkMeta>,
}

impl CorpusSnapshot for StaticCorpus {
    fn snapshot(&self) -> Result<Vec<DocumentChunk>> {
        Ok(self
            .documents
            .iter()
            .zip(&self.metadatas)
            .map(|(doc, meta)| DocumentChunk {
                id: format!("{}:{}", meta.source, meta.chunk_index),
                text: doc.clone(),
                meta: meta.clone(),
            })
            .collect())
    }

    fn fingerprint(&self) -> String {
        let bytes: usize = self.documents.iter().map(String::len).sum();
        format!("static-{}-{}", self.documents.len(), bytes)
    }
}

/// No model attached: decomposition degrades to single-hop and rewrites
/// are skipped, which is the honest offline behavior.
struct OfflineLlm;

impl LlmClient for OfflineLlm {
    fn generate(&self, _prompt: &str) -> Result<String> {
        Err(Error::backend("llm", "no model configured"))
    }
}

const SAMPLE_PASSAGES: &[&str] = &[
    "Reciprocal rank fusion combines ranked lists by summing reciprocal ranks.",
    "BM25 weighs term frequency against document length and corpus rarity.",
    "A semantic cache returns a stored answer when a new query embeds close enough to an old one.",
    "Multi-hop retrieval decomposes a question into sub-questions and gathers evidence per hop.",
    "Vector search finds nearest neighbors of a query embedding.",
    "Keyword search matches exact terms; hybrid search fuses both result lists.",
];

fn load_passages(path: Option<&String>) -> anyhow::Result<(Vec<String>, Vec<ChunkMeta>)> {
    let (source, lines): (String, Vec<String>) = match path {
        Some(p) => (
            p.clone(),
            fs::read_to_string(p)?
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_owned)
                .collect(),
        ),
        None => (
            "builtin".to_owned(),
            SAMPLE_PASSAGES.iter().map(|p| (*p).to_owned()).collect(),
        ),
    };
    let metadatas = (0..lines.len())
        .map(|i| ChunkMeta {
            source: source.clone(),
            chunk_index: i,
            version: None,
            language: None,
        })
        .collect();
    Ok((lines, metadatas))
}

fn print_result(documents: &[String], metadatas: &[ChunkMeta], scores: &[f32]) {
    for (i, ((doc, meta), score)) in documents.iter().zip(metadatas).zip(scores).enumerate() {
        println!(
            "  {}. score={:.4}  {}#{}",
            i + 1,
            score,
            meta.source,
            meta.chunk_index
        );
        println!("     {doc}");
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.len() < 2 {
        eprintln!("Usage: {prog} <query|multihop|parallel> \"<question>\" [passages.txt]");
        std::process::exit(1);
    }
    let cmd = args.remove(0);
    let question = args.remove(0);

    let config = EngineConfig::load()?;
    let purge_every = Duration::from_secs(config.cache.ttl_secs.max(1));
    let (documents, metadatas) = load_passages(args.first())?;
    let store = MemoryStore::build(documents.clone(), metadatas.clone())?;
    let corpus = StaticCorpus {
        documents,
        metadatas,
    };
    let engine = RetrievalEngine::new(
        config,
        Arc::new(HashEmbedder),
        Arc::new(store),
        Arc::new(OfflineLlm),
        Arc::new(corpus),
        None,
    )?;

    let runtime = tokio::runtime::Runtime::new()?;
    let maintenance = {
        let _guard = runtime.enter();
        CacheMaintenance::spawn(engine.cache(), purge_every)
    };

    match cmd.as_str() {
        "query" => {
            let outcome = engine.search(&question);
            match outcome.cache_hit {
                Some(kind) => println!("cache hit ({kind:?})"),
                None => println!("pipeline run"),
            }
            print_result(
                &outcome.result.documents,
                &outcome.result.metadatas,
                &outcome.result.scores,
            );
        }
        "multihop" => {
            let report = engine.search_multihop(&question);
            println!(
                "hops={} subquestions={:?} budget_exhausted={}",
                report.hops_run, report.subquestions, report.budget_exhausted
            );
            print_result(
                &report.result.documents,
                &report.result.metadatas,
                &report.result.scores,
            );
        }
        "parallel" => {
            let top_k = engine.config().top_k;
            let filter = engine.base_filter();
            let engine = Arc::new(engine);
            let results = runtime.block_on(retrieve_parallel(
                Arc::clone(&engine),
                &question,
                &[Method::Vector, Method::Bm25, Method::Hybrid],
                top_k,
                &filter,
            ));
            for (method, outcome) in &results {
                println!(
                    "{method}: {} hits in {:.2}ms{}",
                    outcome.documents.len(),
                    outcome.duration_ms,
                    outcome
                        .error
                        .as_deref()
                        .map(|e| format!(" (error: {e})"))
                        .unwrap_or_default()
                );
            }
        }
        _ => {
            eprintln!("Unknown command: {cmd}");
            std::process::exit(1);
        }
    }

    runtime.block_on(maintenance.shutdown());
    Ok(())
}
