//! Startup wiring.
//!
//! Builds the process-wide policy index once and hands a ready
//! [`DecisionPipeline`] to the caller. Every failure here is fatal: the
//! service must not accept cases without an index or a generator.

use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use juscash_core::{CorpusError, PolicyCorpus};

use crate::audit::{AuditSink, TracingAuditSink};
use crate::cache::CachedEmbedder;
use crate::config::{RuntimeConfig, ENV_EMBEDDER_URL, ENV_EMBEDDING_MODEL_DIR};
use crate::index::{IndexError, PolicyIndex};
use crate::pipeline::{DecisionPipeline, PipelineError};
use crate::providers::{Embedder, Generator, ProviderError, SerializedGenerator};

/// Errors from starting the runtime.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("Policy corpus failed to load: {0}")]
    Corpus(#[from] CorpusError),

    #[error("Policy index failed to build: {0}")]
    Index(#[from] IndexError),

    #[error("Provider setup failed: {0}")]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

#[cfg(feature = "http")]
const TOKEN_NAME: &str = "Hugging Face token";

/// Assemble a pipeline around the given capabilities.
///
/// Generation is serialized to `max_concurrent_generations`, the query
/// embedder is cached when the cache is enabled, and the reference corpus
/// is indexed before this returns.
pub async fn assemble(
    config: &RuntimeConfig,
    generator: Arc<dyn Generator>,
    embedder: Arc<dyn Embedder>,
    audit: Arc<dyn AuditSink>,
) -> Result<DecisionPipeline, BootstrapError> {
    let corpus = PolicyCorpus::reference()?;

    let embedder: Arc<dyn Embedder> = if config.embedding_cache_entries > 0 {
        Arc::new(CachedEmbedder::new(embedder, config.embedding_cache_entries))
    } else {
        embedder
    };

    let index = PolicyIndex::build(corpus, embedder.clone())
        .await?
        .with_top_k(config.top_k);

    let generator = Arc::new(SerializedGenerator::new(
        generator,
        config.max_concurrent_generations,
    ));

    info!(
        model = %config.generation_model,
        generator = generator.name(),
        embedder = embedder.name(),
        embedding_model = %config.embedding_model,
        authenticated = config.has_token,
        rules = index.len(),
        top_k = ?config.top_k,
        max_concurrent_generations = generator.max_concurrent(),
        "Decision pipeline ready"
    );

    let pipeline = DecisionPipeline::builder()
        .retriever(Arc::new(index))
        .generator(generator)
        .audit(audit)
        .model_name(config.generation_model.clone())
        .generation(config.generation.clone())
        .build()?;

    Ok(pipeline)
}

/// [`assemble`] with the default audit sink.
pub async fn assemble_default(
    config: &RuntimeConfig,
    generator: Arc<dyn Generator>,
    embedder: Arc<dyn Embedder>,
) -> Result<DecisionPipeline, BootstrapError> {
    assemble(config, generator, embedder, Arc::new(TracingAuditSink)).await
}

/// The configured embedder.
///
/// An embedding server URL wins over a local model directory. With neither
/// configured there is nothing to rank policies with, so startup fails.
pub fn configured_embedder<F>(
    config: &RuntimeConfig,
    lookup: F,
) -> Result<Arc<dyn Embedder>, BootstrapError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = &config.embedder_url {
        return server_embedder(url, &lookup);
    }
    if let Some(dir) = &config.embedding_model_dir {
        return local_embedder(dir);
    }
    Err(ProviderError::NotConfigured(format!(
        "no embedder: set {} or {}",
        ENV_EMBEDDER_URL, ENV_EMBEDDING_MODEL_DIR
    ))
    .into())
}

#[cfg(feature = "http")]
fn server_embedder<F>(url: &str, lookup: &F) -> Result<Arc<dyn Embedder>, BootstrapError>
where
    F: Fn(&str) -> Option<String>,
{
    use crate::providers::{ApiCredential, TeiEmbedder, HF_TOKEN_ENV};

    let credential = ApiCredential::from_lookup(HF_TOKEN_ENV, TOKEN_NAME, lookup);
    Ok(Arc::new(TeiEmbedder::new(url, credential)?))
}

#[cfg(not(feature = "http"))]
fn server_embedder<F>(_url: &str, _lookup: &F) -> Result<Arc<dyn Embedder>, BootstrapError> {
    Err(ProviderError::NotConfigured(format!(
        "{} requires the `http` feature",
        ENV_EMBEDDER_URL
    ))
    .into())
}

#[cfg(feature = "onnx")]
fn local_embedder(dir: &Path) -> Result<Arc<dyn Embedder>, BootstrapError> {
    Ok(Arc::new(crate::providers::OnnxEmbedder::load(dir)?))
}

#[cfg(not(feature = "onnx"))]
fn local_embedder(_dir: &Path) -> Result<Arc<dyn Embedder>, BootstrapError> {
    Err(ProviderError::NotConfigured(format!(
        "{} requires the `onnx` feature",
        ENV_EMBEDDING_MODEL_DIR
    ))
    .into())
}

/// Build a pipeline against the configured inference servers.
///
/// `lookup` resolves the optional server token; pass
/// `|k| std::env::var(k).ok()` in production.
#[cfg(feature = "http")]
pub async fn bootstrap<F>(
    config: &RuntimeConfig,
    lookup: F,
) -> Result<DecisionPipeline, BootstrapError>
where
    F: Fn(&str) -> Option<String>,
{
    let embedder = configured_embedder(config, &lookup)?;
    let generator = server_generator(config, &lookup)?;
    assemble_default(config, generator, embedder).await
}

/// The configured generator, wrapped the same way as in [`bootstrap`].
///
/// Used by liveness probes that must not build the index.
#[cfg(feature = "http")]
pub fn configured_generator<F>(
    config: &RuntimeConfig,
    lookup: F,
) -> Result<Arc<dyn Generator>, BootstrapError>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(Arc::new(SerializedGenerator::new(
        server_generator(config, &lookup)?,
        config.max_concurrent_generations,
    )))
}

#[cfg(feature = "http")]
fn server_generator<F>(
    config: &RuntimeConfig,
    lookup: &F,
) -> Result<Arc<dyn Generator>, BootstrapError>
where
    F: Fn(&str) -> Option<String>,
{
    use crate::providers::{ApiCredential, TgiGenerator, HF_TOKEN_ENV};

    let credential = ApiCredential::from_lookup(HF_TOKEN_ENV, TOKEN_NAME, lookup);
    Ok(Arc::new(TgiGenerator::new(config.generator_url.clone(), credential)?))
}
