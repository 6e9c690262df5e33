//! Engine configuration: `config.toml` merged with `RAGDB_*` env vars.
//!
//! Invalid values are rejected here, at construction time; nothing further
//! down the pipeline re-validates. Runtime failures (backends, parsing)
//! degrade instead, see `error`.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Method;

fn default_top_k() -> usize {
    5
}
fn default_method() -> Method {
    Method::Vector
}
fn default_bm25_weight() -> f32 {
    0.5
}
fn default_true() -> bool {
    true
}
fn default_rrf_k() -> u32 {
    60
}
fn default_rerank_top_n() -> usize {
    10
}
fn default_rerank_batch_size() -> usize {
    32
}
fn default_rewrite_n() -> usize {
    2
}
fn default_multihop_depth() -> usize {
    2
}
fn default_multihop_fanout() -> usize {
    2
}
fn default_similarity_threshold() -> f32 {
    0.95
}
fn default_cache_max_size() -> usize {
    1000
}
fn default_cache_ttl_secs() -> u64 {
    300
}

/// Semantic query cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cosine similarity at or above which a cached query counts as a hit.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            max_size: default_cache_max_size(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

/// Everything the retrieval core recognizes. Unknown keys are ignored so
/// the same config file can carry API-layer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_method")]
    pub method: Method,
    /// Keyword weight in legacy weighted fusion; vector side gets `1 - w`.
    #[serde(default = "default_bm25_weight")]
    pub bm25_weight: f32,
    #[serde(default = "default_true")]
    pub rrf_enable: bool,
    #[serde(default = "default_rrf_k")]
    pub rrf_k: u32,

    #[serde(default)]
    pub rerank_enable: bool,
    #[serde(default = "default_rerank_top_n")]
    pub rerank_top_n: usize,
    #[serde(default)]
    pub rerank_provider: Option<String>,
    /// 0 = rescore all candidates.
    #[serde(default)]
    pub rerank_max_candidates: usize,
    #[serde(default = "default_rerank_batch_size")]
    pub rerank_batch_size: usize,

    #[serde(default)]
    pub rewrite_enable: bool,
    #[serde(default = "default_rewrite_n")]
    pub rewrite_n: usize,

    #[serde(default = "default_multihop_depth")]
    pub multihop_depth: usize,
    #[serde(default = "default_multihop_fanout")]
    pub multihop_fanout: usize,
    #[serde(default)]
    pub multihop_fanout_first_hop: Option<usize>,
    /// 0 = no budget.
    #[serde(default)]
    pub multihop_budget_ms: u64,

    #[serde(default)]
    pub languages: Option<Vec<String>>,
    #[serde(default)]
    pub versions: Option<Vec<String>>,

    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            method: default_method(),
            bm25_weight: default_bm25_weight(),
            rrf_enable: true,
            rrf_k: default_rrf_k(),
            rerank_enable: false,
            rerank_top_n: default_rerank_top_n(),
            rerank_provider: None,
            rerank_max_candidates: 0,
            rerank_batch_size: default_rerank_batch_size(),
            rewrite_enable: false,
            rewrite_n: default_rewrite_n(),
            multihop_depth: default_multihop_depth(),
            multihop_fanout: default_multihop_fanout(),
            multihop_fanout_first_hop: None,
            multihop_budget_ms: 0,
            languages: None,
            versions: None,
            cache: CacheConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from `config.toml` (if present) with `RAGDB_*` env overrides,
    /// e.g. `RAGDB_TOP_K=10` or `RAGDB_CACHE.TTL_SECS=60`.
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("RAGDB_").split("."));
        let config: Self = figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::InvalidConfig("top_k must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.bm25_weight) {
            return Err(Error::InvalidConfig(format!(
                "bm25_weight must be in [0,1], got {}",
                self.bm25_weight
            )));
        }
        if self.rrf_k == 0 {
            return Err(Error::InvalidConfig("rrf_k must be > 0".into()));
        }
        if self.rerank_top_n == 0 {
            return Err(Error::InvalidConfig("rerank_top_n must be > 0".into()));
        }
        if self.rerank_batch_size == 0 {
            return Err(Error::InvalidConfig("rerank_batch_size must be > 0".into()));
        }
        if !(1..=5).contains(&self.rewrite_n) {
            return Err(Error::InvalidConfig(format!(
                "rewrite_n must be in 1..=5, got {}",
                self.rewrite_n
            )));
        }
        if !(1..=3).contains(&self.multihop_depth) {
            return Err(Error::InvalidConfig(format!(
                "multihop_depth must be in 1..=3, got {}",
                self.multihop_depth
            )));
        }
        if !(1..=3).contains(&self.multihop_fanout) {
            return Err(Error::InvalidConfig(format!(
                "multihop_fanout must be in 1..=3, got {}",
                self.multihop_fanout
            )));
        }
        if let Some(f) = self.multihop_fanout_first_hop {
            if !(1..=5).contains(&f) {
                return Err(Error::InvalidConfig(format!(
                    "multihop_fanout_first_hop must be in 1..=5, got {f}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.cache.similarity_threshold) {
            return Err(Error::InvalidConfig(format!(
                "cache.similarity_threshold must be in [0,1], got {}",
                self.cache.similarity_threshold
            )));
        }
        if self.cache.max_size == 0 {
            return Err(Error::InvalidConfig("cache.max_size must be > 0".into()));
        }
        Ok(())
    }
}
