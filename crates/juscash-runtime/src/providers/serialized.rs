//! Bounded access to a single inference resource.
//!
//! A local model serves one generation at a time. [`SerializedGenerator`]
//! admits at most N concurrent calls; the rest wait in FIFO order on a
//! semaphore. Each admitted call is bounded by the configured timeout.

use super::{GenerationConfig, Generator, ProviderError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Generator wrapper that serializes access to the inner generator.
pub struct SerializedGenerator {
    inner: Arc<dyn Generator>,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
}

impl SerializedGenerator {
    /// Wrap `inner`, admitting `max_concurrent` calls at once (minimum one).
    pub fn new(inner: Arc<dyn Generator>, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            inner,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Calls currently allowed to start without waiting.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

#[async_trait]
impl Generator for SerializedGenerator {
    async fn generate(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<String, ProviderError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ProviderError::Unavailable("generation queue closed".to_string()))?;

        debug!(generator = self.inner.name(), "Generation admitted");

        match tokio::time::timeout(config.timeout, self.inner.generate(prompt, config)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    generator = self.inner.name(),
                    timeout = ?config.timeout,
                    "Generation timed out"
                );
                Err(ProviderError::Timeout(config.timeout))
            }
        }
    }

    async fn health_check(&self) -> bool {
        self.inner.health_check().await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
