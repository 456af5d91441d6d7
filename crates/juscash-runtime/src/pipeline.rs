//! Decision pipeline.
//!
//! Sequences one decision end to end:
//! 1. Summarize the case (pure)
//! 2. Retrieve policy passages for the summary
//! 3. Build the prompt (pure)
//! 4. Generate
//! 5. Normalize the raw output (never fails)
//! 6. Attach model and version metadata, then hand the result to the audit sink
//!
//! Only retrieval and generation can fail. Both are infrastructure failures
//! and are propagated; malformed model output never is.

use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

use juscash_core::{
    build_prompt, normalize_with_path, summarize, CaseRecord, DecisionMetadata, DecisionResult,
    NormalizationPath,
};

use crate::audit::{AuditRecord, AuditSink, TracingAuditSink};
use crate::index::{IndexError, PolicyRetriever};
use crate::providers::{GenerationConfig, Generator, ProviderError};

/// Errors from a pipeline invocation.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Policy retrieval failed: {0}")]
    Retrieval(#[from] IndexError),

    #[error("Generation failed: {0}")]
    Generation(#[from] ProviderError),

    #[error("Pipeline not configured: {0}")]
    NotConfigured(String),
}

/// The decision orchestrator.
///
/// Holds only shared, read-only collaborators, so one pipeline serves any
/// number of concurrent `decide` calls.
pub struct DecisionPipeline {
    retriever: Arc<dyn PolicyRetriever>,
    generator: Arc<dyn Generator>,
    audit: Arc<dyn AuditSink>,
    metadata: DecisionMetadata,
    generation: GenerationConfig,
}

impl DecisionPipeline {
    pub fn builder() -> DecisionPipelineBuilder {
        DecisionPipelineBuilder::new()
    }

    /// Metadata attached to every result.
    pub fn metadata(&self) -> &DecisionMetadata {
        &self.metadata
    }

    /// Decide a case.
    pub async fn decide(&self, case: &CaseRecord) -> Result<DecisionResult, PipelineError> {
        let started = Instant::now();

        let summary = summarize(case);
        let passages = self.retriever.retrieve(&summary).await?;
        debug!(
            case_number = %case.case_number,
            passages = passages.len(),
            "Building decision prompt"
        );

        let prompt = build_prompt(&passages, &summary);
        let raw = self.generator.generate(&prompt, &self.generation).await?;

        let (verdict, path) = normalize_with_path(&raw);
        if path != NormalizationPath::Strict {
            warn!(
                case_number = %case.case_number,
                path = %path,
                "Model output was not a clean JSON object"
            );
        }

        let result = DecisionResult::new(verdict, self.metadata.clone());

        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.audit.record(&AuditRecord::from_result(
            &case.case_number,
            &result,
            latency_ms,
            path,
        ));

        Ok(result)
    }

    /// Liveness of the generation capability.
    pub async fn health_check(&self) -> bool {
        self.generator.health_check().await
    }
}

/// Builder for DecisionPipeline.
pub struct DecisionPipelineBuilder {
    retriever: Option<Arc<dyn PolicyRetriever>>,
    generator: Option<Arc<dyn Generator>>,
    audit: Arc<dyn AuditSink>,
    model_name: Option<String>,
    generation: GenerationConfig,
}

impl DecisionPipelineBuilder {
    /// Create a new builder. Audit defaults to [`TracingAuditSink`].
    pub fn new() -> Self {
        Self {
            retriever: None,
            generator: None,
            audit: Arc::new(TracingAuditSink),
            model_name: None,
            generation: GenerationConfig::default(),
        }
    }

    pub fn retriever(mut self, retriever: Arc<dyn PolicyRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Set the generation model identifier recorded on every result.
    pub fn model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = Some(model_name.into());
        self
    }

    pub fn generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    /// Build the pipeline.
    pub fn build(self) -> Result<DecisionPipeline, PipelineError> {
        let retriever = self
            .retriever
            .ok_or_else(|| PipelineError::NotConfigured("No retriever set".to_string()))?;
        let generator = self
            .generator
            .ok_or_else(|| PipelineError::NotConfigured("No generator set".to_string()))?;
        let model_name = self
            .model_name
            .ok_or_else(|| PipelineError::NotConfigured("No model name set".to_string()))?;

        Ok(DecisionPipeline {
            retriever,
            generator,
            audit: self.audit,
            metadata: DecisionMetadata::for_model(model_name),
            generation: self.generation,
        })
    }
}

impl Default for DecisionPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
