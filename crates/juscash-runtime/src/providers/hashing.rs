//! Feature-hashing embedder for tests.
//!
//! Maps lower-cased alphanumeric tokens into a fixed number of signed
//! buckets and L2-normalizes the result. Lexical only: it exercises the
//! index and pipeline deterministically but never ranks production queries.

use super::{l2_normalize, Embedder, ProviderError};
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Default vector dimension.
pub const DEFAULT_HASHING_DIMENSION: usize = 384;

/// Deterministic bag-of-words embedder.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    /// Create an embedder producing vectors of `dimension` components.
    ///
    /// A zero dimension is bumped to one.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed one text synchronously.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in tokens(text) {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let h = hasher.finish();

            let bucket = (h % self.dimension as u64) as usize;
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        l2_normalize(&mut vector);
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASHING_DIMENSION)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_deterministic() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed_text("Processo trabalhista não elegível");
        let b = embedder.embed_text("Processo trabalhista não elegível");
        assert_eq!(a, b);
        assert_eq!(a.len(), DEFAULT_HASHING_DIMENSION);
    }

    #[test]
    fn test_unit_length() {
        let embedder = HashingEmbedder::new(64);
        let v = embedder.embed_text("Valor da condenação informado");
        let norm = dot(&v, &v).sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        let embedder = HashingEmbedder::default();
        assert_eq!(
            embedder.embed_text("Esfera Trabalhista."),
            embedder.embed_text("esfera, trabalhista")
        );
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(8);
        assert_eq!(embedder.embed_text("  ... "), vec![0.0; 8]);
    }

    #[test]
    fn test_overlap_scores_higher() {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed_text("esfera trabalhista");
        let related = embedder.embed_text("processos da esfera trabalhista não são elegíveis");
        let unrelated = embedder.embed_text("honorários contratuais devem ser informados");
        assert!(dot(&query, &related) > dot(&query, &unrelated));
    }

    #[test]
    fn test_zero_dimension_bumped() {
        assert_eq!(HashingEmbedder::new(0).dimension(), 1);
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let embedder = HashingEmbedder::default();
        let texts = vec!["primeiro".to_string(), "segundo".to_string()];
        let vectors = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors[0], embedder.embed_text("primeiro"));
        assert_eq!(vectors[1], embedder.embed_text("segundo"));
    }
}
