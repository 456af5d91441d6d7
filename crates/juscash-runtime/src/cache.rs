//! Caching layer for juscash-runtime.
//!
//! Provides in-memory caching of embeddings so repeated retrieval queries
//! (the same case decided twice) skip the embedding round-trip.

use crate::providers::{Embedder, ProviderError};
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use tracing::debug;

/// Embedder wrapper backed by a moka cache keyed by input text.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    cache: Cache<String, Arc<Vec<f32>>>,
}

impl CachedEmbedder {
    /// Wrap `inner` with a cache holding up to `max_entries` vectors.
    pub fn new(inner: Arc<dyn Embedder>, max_entries: u64) -> Self {
        let cache = Cache::builder().max_capacity(max_entries).build();
        Self { inner, cache }
    }

    /// Get cache statistics.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Clear the cache.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut slots: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut missing: Vec<String> = Vec::new();

        for text in texts {
            match self.cache.get(text).await {
                Some(vector) => slots.push(Some(vector.as_ref().clone())),
                None => {
                    slots.push(None);
                    missing.push(text.clone());
                }
            }
        }

        if !missing.is_empty() {
            debug!(
                hits = texts.len() - missing.len(),
                misses = missing.len(),
                "Embedding cache lookup"
            );
            let fresh = self.inner.embed_batch(&missing).await?;
            if fresh.len() != missing.len() {
                return Err(ProviderError::ParseError(format!(
                    "expected {} embeddings, got {}",
                    missing.len(),
                    fresh.len()
                )));
            }

            let mut fresh = fresh.into_iter();
            for (slot, text) in slots.iter_mut().zip(texts) {
                if slot.is_none() {
                    if let Some(vector) = fresh.next() {
                        self.cache.insert(text.clone(), Arc::new(vector.clone())).await;
                        *slot = Some(vector);
                    }
                }
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.ok_or_else(|| ProviderError::ParseError("missing embedding".to_string()))
            })
            .collect()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
