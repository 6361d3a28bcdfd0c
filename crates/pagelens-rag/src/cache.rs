//! Embedding cache
//!
//! Wraps any `EmbeddingProvider` with a moka cache so repeated queries
//! skip the provider round trip. Keys combine the model id and the text.
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use moka::future::Cache;
use pagelens_core::{PageLensError, Result};
use pagelens_vector::EmbeddingProvider;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cache sizing
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached embeddings
    pub max_capacity: u64,

    /// Time-to-live of a cached embedding (in seconds)
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            ttl_seconds: 3600,
        }
    }
}

// ============================================================================
// Cached provider
// ============================================================================

/// Cache key: the model id and the exact text it embedded
type CacheKey = (String, String);

/// Embedding provider backed by a concurrent cache
#[derive(Clone)]
pub struct CachedEmbeddingProvider {
    inner: Arc<dyn EmbeddingProvider>,
    cache: Cache<CacheKey, Vec<f32>>,
    stats: Arc<CacheStats>,
}

impl CachedEmbeddingProvider {
    pub fn new(inner: Arc<dyn EmbeddingProvider>) -> Self {
        Self::with_config(inner, &CacheConfig::default())
    }

    pub fn with_config(inner: Arc<dyn EmbeddingProvider>, config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(Duration::from_secs(config.ttl_seconds))
            .build();

        Self {
            inner,
            cache,
            stats: Arc::new(CacheStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    /// Drop every cached embedding
    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }

    fn key(&self, text: &str) -> CacheKey {
        (self.inner.model_id().to_string(), text.to_string())
    }

    async fn lookup(&self, key: &CacheKey) -> Option<Vec<f32>> {
        let hit = self.cache.get(key).await;
        match hit {
            Some(_) => self.stats.hits.fetch_add(1, Ordering::Relaxed),
            None => self.stats.misses.fetch_add(1, Ordering::Relaxed),
        };
        hit
    }
}

#[async_trait]
impl EmbeddingProvider for CachedEmbeddingProvider {
    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let key = self.key(text);
        if let Some(embedding) = self.lookup(&key).await {
            return Ok(embedding);
        }

        let embedding = self.inner.encode(text).await?;
        self.cache.insert(key, embedding.clone()).await;
        Ok(embedding)
    }

    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut missing = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            let cached = self.lookup(&self.key(text)).await;
            if cached.is_none() {
                missing.push(i);
            }
            results.push(cached);
        }

        if !missing.is_empty() {
            let pending: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
            let fresh = self.inner.encode_batch(&pending).await?;
            if fresh.len() != pending.len() {
                return Err(PageLensError::EmbeddingError(format!(
                    "provider returned {} embeddings for {} texts",
                    fresh.len(),
                    pending.len()
                )));
            }

            for (&i, embedding) in missing.iter().zip(fresh) {
                self.cache.insert(self.key(&texts[i]), embedding.clone()).await;
                results[i] = Some(embedding);
            }
        }

        results
            .into_iter()
            .map(|e| {
                e.ok_or_else(|| PageLensError::EmbeddingError("missing embedding".to_string()))
            })
            .collect()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Hit and miss counters
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Hit rate (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses();
        if total == 0 {
            0.0
        } else {
            self.hits() as f64 / total as f64
        }
    }

    pub fn report(&self) -> CacheStatsReport {
        CacheStatsReport {
            hits: self.hits(),
            misses: self.misses(),
            hit_rate: self.hit_rate(),
        }
    }
}

/// Serializable snapshot of [`CacheStats`]
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsReport {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

// ============================================================================
// Tests
// ============================================================================
