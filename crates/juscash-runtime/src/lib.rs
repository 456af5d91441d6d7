//! # juscash-runtime
//!
//! Retrieval-augmented decisions for JusCash credit validation.
//!
//! This crate connects the deterministic machinery of `juscash-core` to the
//! two model capabilities it needs:
//! - An embedder, used to index the policy corpus at startup and to embed
//!   each case summary at request time. Either an embedding server
//!   (feature `http`) or an in-process ONNX model (feature `onnx`)
//! - A generator, asked once per case for a JSON verdict
//!
//! ## Failure model
//!
//! Infrastructure failures (embedding, index, generation) are returned as
//! errors. Whatever the generator writes is normalized into a typed verdict
//! and never becomes an error.
//!
//! ## Example
//!
//! ```rust,ignore
//! use juscash_runtime::{bootstrap, RuntimeConfig};
//!
//! let config = RuntimeConfig::from_env()?;
//! let pipeline = bootstrap(&config, |k| std::env::var(k).ok()).await?;
//!
//! let case = juscash_core::CaseRecord::from_json(&payload)?;
//! let result = pipeline.decide(&case).await?;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! ```

pub mod audit;
pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod index;
pub mod pipeline;
pub mod providers;

pub use audit::{AuditRecord, AuditSink, NoopAuditSink, TracingAuditSink};
pub use bootstrap::{assemble, assemble_default, configured_embedder, BootstrapError};
pub use cache::CachedEmbedder;
pub use config::{ConfigError, RuntimeConfig};
pub use index::{IndexError, PolicyIndex, PolicyRetriever};
pub use pipeline::{DecisionPipeline, DecisionPipelineBuilder, PipelineError};
pub use providers::{
    ApiCredential, Embedder, GenerationConfig, Generator, ProviderError, SerializedGenerator,
};

#[cfg(feature = "http")]
pub use bootstrap::{bootstrap, configured_generator};
#[cfg(feature = "http")]
pub use providers::{TeiEmbedder, TgiGenerator};
#[cfg(feature = "onnx")]
pub use providers::OnnxEmbedder;
