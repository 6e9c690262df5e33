use std::collections::{HashMap, VecDeque};
use std::hash::Hasher;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use twox_hash::XxHash64;

use ragdb_core::config::CacheConfig;
use ragdb_core::traits::Embedder;

/// How a cached result was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitKind {
    /// Same query text (and namespace) as a live entry.
    Exact,
    /// A live entry whose embedding cosine similarity cleared the threshold.
    Semantic,
}

/// Cosine similarity with an epsilon against degenerate (zero) vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for i in 0..n {
        dot += a[i] * b[i];
        na += a[i] * a[i];
        nb += b[i] * b[i];
    }
    dot / (na.sqrt() * nb.sqrt() + 1e-10)
}

struct Entry<T> {
    query: String,
    embedding: Vec<f32>,
    payload: T,
    created_at: Instant,
    access_count: u64,
    last_access: Instant,
    namespace: String,
    /// Position in the LRU order index.
    tick: u64,
}

impl<T> Entry<T> {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub exact_hits: u64,
    pub semantic_hits: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub size: usize,
}

struct Inner<T> {
    entries: HashMap<u64, Entry<T>>,
    /// `(tick, key)` pairs, oldest first. A pair is live only while the
    /// tick still matches the entry's current tick; superseded and removed
    /// pairs go stale in place and are skipped at pop time, which keeps
    /// every LRU operation O(1) amortized.
    order: VecDeque<(u64, u64)>,
    next_tick: u64,
    stats: CacheStats,
}

impl<T> Inner<T> {
    fn touch(&mut self, key: u64) {
        let next = self.next_tick;
        self.next_tick += 1;
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.tick = next;
            self.order.push_back((next, key));
        }
        self.compact();
    }

    fn remove(&mut self, key: u64) {
        self.entries.remove(&key);
    }

    /// Pop pairs until one is live; that key is the least recently used.
    fn pop_lru(&mut self) -> Option<u64> {
        while let Some((tick, key)) = self.order.pop_front() {
            if self.entries.get(&key).map(|e| e.tick) == Some(tick) {
                return Some(key);
            }
        }
        None
    }

    /// Drop stale pairs once they dominate the queue, so a hit-heavy
    /// workload cannot grow it without bound.
    fn compact(&mut self) {
        if self.order.len() > self.entries.len().saturating_mul(2).max(32) {
            let entries = &self.entries;
            self.order
                .retain(|&(tick, key)| entries.get(&key).map(|e| e.tick) == Some(tick));
        }
    }
}

/// Thread-safe semantic cache with TTL and LRU eviction.
///
/// Reads also serialize: a `get` can refresh LRU order and purge expired
/// entries, so there is no shared read path. Embeddings are always computed
/// outside the lock; the lock only guards CPU bookkeeping.
pub struct SemanticQueryCache<T> {
    similarity_threshold: f32,
    max_size: usize,
    ttl: Duration,
    inner: Mutex<Inner<T>>,
}

impl<T: Clone> SemanticQueryCache<T> {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_params(
            config.similarity_threshold,
            config.max_size,
            Duration::from_secs(config.ttl_secs),
        )
    }

    pub fn with_params(similarity_threshold: f32, max_size: usize, ttl: Duration) -> Self {
        Self {
            similarity_threshold,
            max_size: max_size.max(1),
            ttl,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                next_tick: 0,
                stats: CacheStats::default(),
            }),
        }
    }

    fn count_miss(&self) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .stats
            .misses += 1;
    }

    /// Exact-match key: content + namespace hash.
    fn compute_key(query: &str, namespace: &str) -> u64 {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(namespace.as_bytes());
        hasher.write(b"|");
        hasher.write(query.as_bytes());
        hasher.finish()
    }

    /// Look up `query` in `namespace`. Exact match first; otherwise one
    /// embedding call and a linear scan of live same-namespace entries for
    /// the best cosine similarity at or above the threshold.
    pub fn get(
        &self,
        query: &str,
        embedder: &dyn Embedder,
        namespace: &str,
    ) -> Option<(T, HitKind)> {
        let key = Self::compute_key(query, namespace);

        {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            match inner.entries.get(&key).map(|e| e.is_expired(self.ttl)) {
                Some(true) => {
                    inner.remove(key);
                    inner.stats.expirations += 1;
                    inner.stats.misses += 1;
                    return None;
                }
                Some(false) => {
                    let payload = {
                        let entry = inner.entries.get_mut(&key)?;
                        entry.access_count += 1;
                        entry.last_access = Instant::now();
                        entry.payload.clone()
                    };
                    inner.touch(key);
                    inner.stats.hits += 1;
                    inner.stats.exact_hits += 1;
                    debug!(namespace, "semantic cache exact hit");
                    return Some((payload, HitKind::Exact));
                }
                None => {}
            }
        }

        // Embed outside the lock; a failure here is a miss, not an error.
        let query_embedding = match embedder.embed(&[query.to_owned()]) {
            Ok(mut embs) if !embs.is_empty() => embs.remove(0),
            Ok(_) => {
                warn!("embedder returned no vectors; cache miss");
                self.count_miss();
                return None;
            }
            Err(e) => {
                warn!(error = %e, "cache embedding failed; treating as miss");
                self.count_miss();
                return None;
            }
        };

        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut expired: Vec<u64> = Vec::new();
        let mut best: Option<(u64, f32)> = None;
        for (&k, entry) in &inner.entries {
            if entry.is_expired(self.ttl) {
                expired.push(k);
                continue;
            }
            if entry.namespace != namespace {
                continue;
            }
            let sim = cosine_similarity(&query_embedding, &entry.embedding);
            if sim >= self.similarity_threshold && best.map_or(true, |(_, s)| sim > s) {
                best = Some((k, sim));
            }
        }
        // Purge entries found expired during the scan.
        for k in expired {
            inner.remove(k);
            inner.stats.expirations += 1;
        }

        if let Some((k, sim)) = best {
            let payload = {
                let entry = inner.entries.get_mut(&k)?;
                entry.access_count += 1;
                entry.last_access = Instant::now();
                entry.payload.clone()
            };
            inner.touch(k);
            inner.stats.hits += 1;
            inner.stats.semantic_hits += 1;
            debug!(namespace, similarity = sim, "semantic cache similarity hit");
            return Some((payload, HitKind::Semantic));
        }

        inner.stats.misses += 1;
        None
    }

    /// Store a computed result. At capacity, the least-recently-used entry
    /// is evicted first; the new entry becomes most recently used.
    /// An embedding failure makes this a no-op.
    pub fn set(&self, query: &str, payload: T, embedder: &dyn Embedder, namespace: &str) {
        let embedding = match embedder.embed(&[query.to_owned()]) {
            Ok(mut embs) if !embs.is_empty() => embs.remove(0),
            Ok(_) => {
                warn!("embedder returned no vectors; cache set skipped");
                return;
            }
            Err(e) => {
                warn!(error = %e, "cache embedding failed; set skipped");
                return;
            }
        };

        let key = Self::compute_key(query, namespace);
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        if inner.entries.len() >= self.max_size && !inner.entries.contains_key(&key) {
            if let Some(lru_key) = inner.pop_lru() {
                inner.remove(lru_key);
                inner.stats.evictions += 1;
            }
        }

        let now = Instant::now();
        let tick = inner.next_tick;
        inner.next_tick += 1;
        inner.entries.insert(
            key,
            Entry {
                query: query.to_owned(),
                embedding,
                payload,
                created_at: now,
                access_count: 0,
                last_access: now,
                namespace: namespace.to_owned(),
                tick,
            },
        );
        inner.order.push_back((tick, key));
        inner.compact();
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.clear();
        inner.order.clear();
    }

    /// Remove all expired entries; returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let expired: Vec<u64> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(self.ttl))
            .map(|(&k, _)| k)
            .collect();
        let count = expired.len();
        for k in expired {
            inner.remove(k);
        }
        inner.stats.expirations += count as u64;
        if count > 0 {
            debug!(purged = count, "expired cache entries removed");
        }
        count
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        CacheStats {
            size: inner.entries.len(),
            ..inner.stats
        }
    }

    /// Diagnostics for the entry stored under exactly this query text,
    /// without refreshing its LRU position.
    pub fn peek(&self, query: &str, namespace: &str) -> Option<EntryInfo> {
        let key = Self::compute_key(query, namespace);
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.get(&key).map(|e| EntryInfo {
            query: e.query.clone(),
            access_count: e.access_count,
            idle: e.last_access.elapsed(),
        })
    }
}

/// Snapshot of one entry's bookkeeping, see [`SemanticQueryCache::peek`].
#[derive(Debug, Clone)]
pub struct EntryInfo {
    pub query: String,
    pub access_count: u64,
    pub idle: Duration,
}
