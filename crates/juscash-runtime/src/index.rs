//! Policy index.
//!
//! Embeds every rule of a [`PolicyCorpus`] once at construction and ranks
//! rules by cosine similarity to a query. The index is immutable after
//! construction and is shared across pipeline invocations behind an `Arc`;
//! concurrent reads need no locking.

use crate::providers::{Embedder, ProviderError};
use async_trait::async_trait;
use juscash_core::{PolicyCorpus, PolicyRule, RetrievedPassage};
use std::cmp::Ordering;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Errors from building or querying the index.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Embedding failed: {0}")]
    Embedding(#[from] ProviderError),

    #[error("Policy corpus is empty")]
    EmptyCorpus,

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// The single retrieval capability the pipeline depends on.
#[async_trait]
pub trait PolicyRetriever: Send + Sync {
    /// Rank policy passages against a free-text query, best first.
    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedPassage>, IndexError>;
}

struct IndexedRule {
    rule: PolicyRule,
    vector: Vec<f32>,
}

/// Nearest-neighbour index over policy rules.
pub struct PolicyIndex {
    entries: Vec<IndexedRule>,
    embedder: Arc<dyn Embedder>,
    dimension: usize,
    top_k: Option<usize>,
}

impl std::fmt::Debug for PolicyIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyIndex")
            .field("rules", &self.entries.len())
            .field("embedder", &self.embedder.name())
            .field("dimension", &self.dimension)
            .field("top_k", &self.top_k)
            .finish()
    }
}

impl PolicyIndex {
    /// Embed the corpus and build the index.
    ///
    /// Any embedding failure is fatal: an index missing rules would silently
    /// narrow what the generator is allowed to cite.
    pub async fn build(
        corpus: &PolicyCorpus,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, IndexError> {
        if corpus.is_empty() {
            return Err(IndexError::EmptyCorpus);
        }

        let texts: Vec<String> = corpus.rules.iter().map(|r| r.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;

        if vectors.len() != texts.len() {
            return Err(IndexError::Embedding(ProviderError::ParseError(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            ))));
        }

        let dimension = vectors.first().map(Vec::len).unwrap_or(0);
        let mut entries = Vec::with_capacity(vectors.len());
        for (rule, mut vector) in corpus.rules.iter().zip(vectors) {
            if vector.len() != dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            crate::providers::l2_normalize(&mut vector);
            entries.push(IndexedRule {
                rule: rule.clone(),
                vector,
            });
        }

        info!(
            rules = entries.len(),
            dimension,
            embedder = embedder.name(),
            policy_version = %corpus.version,
            "Policy index built"
        );

        Ok(Self {
            entries,
            embedder,
            dimension,
            top_k: None,
        })
    }

    /// Limit retrieval to the `k` best passages. `None` returns every rule.
    pub fn with_top_k(mut self, top_k: Option<usize>) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Rank every rule against an already-embedded query.
    fn rank(&self, query: &[f32]) -> Vec<RetrievedPassage> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, dot(query, &entry.vector)))
            .collect();

        // Stable sort: ties keep corpus order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        let limit = self.top_k.unwrap_or(scored.len());
        scored
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(rank, (i, _))| RetrievedPassage {
                rule: self.entries[i].rule.clone(),
                rank,
            })
            .collect()
    }
}

#[async_trait]
impl PolicyRetriever for PolicyIndex {
    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedPassage>, IndexError> {
        let mut vector = self.embedder.embed(query).await?;
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        crate::providers::l2_normalize(&mut vector);

        let passages = self.rank(&vector);
        debug!(
            returned = passages.len(),
            best = passages.first().map(|p| p.rule.id.as_str()).unwrap_or(""),
            "Policies retrieved"
        );
        Ok(passages)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
