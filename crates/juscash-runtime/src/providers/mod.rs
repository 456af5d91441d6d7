//! Model capability abstractions for juscash-runtime.
//!
//! This module defines the traits for the two external capabilities the
//! decision pipeline consumes, text generation and text embedding. Adapters
//! cover the local inference servers (feature `http`) and in-process ONNX
//! sentence embeddings (feature `onnx`).
//!
//! ## Security
//!
//! Server credentials are held by the [`secrets`] module. See
//! [`ApiCredential`] for the redaction guarantees.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[cfg(test)]
pub(crate) mod hashing;
#[cfg(feature = "onnx")]
mod onnx;
pub mod secrets;
mod serialized;
#[cfg(feature = "http")]
mod tgi;

#[cfg(test)]
pub(crate) use hashing::HashingEmbedder;
#[cfg(feature = "onnx")]
pub use onnx::OnnxEmbedder;
pub use secrets::{ApiCredential, CredentialSource, HF_TOKEN_ENV};
pub use serialized::SerializedGenerator;
#[cfg(feature = "http")]
pub use tgi::{TeiEmbedder, TgiGenerator};

/// Errors from model capabilities.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

/// Configuration for a generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    /// Maximum new tokens to generate
    pub max_new_tokens: u32,

    /// Request timeout
    pub timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_new_tokens: 256,
            timeout: Duration::from_secs(200),
        }
    }
}

/// Text generation capability.
///
/// Generation is greedy and returns only the continuation, never the
/// prompt. The output has no structural contract; callers must normalize it.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a continuation for the prompt.
    async fn generate(&self, prompt: &str, config: &GenerationConfig)
        -> Result<String, ProviderError>;

    /// Check if the generator is reachable.
    async fn health_check(&self) -> bool;

    /// Get generator name for logs.
    fn name(&self) -> &str;
}

/// Text embedding capability.
///
/// Equal input must yield equal vectors, and every vector from one embedder
/// has the same dimension.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed several texts in one call, preserving order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        match vectors.pop() {
            Some(vector) if vectors.is_empty() => Ok(vector),
            _ => Err(ProviderError::ParseError(
                "embedder returned wrong number of vectors".to_string(),
            )),
        }
    }

    /// Get embedder name for logs.
    fn name(&self) -> &str;
}

/// L2-normalize a vector in place. Zero vectors are left untouched.
pub(crate) fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
