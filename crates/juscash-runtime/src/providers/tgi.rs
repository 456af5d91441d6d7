//! Adapters for local Hugging Face inference servers.
//!
//! [`TgiGenerator`] speaks the text-generation-inference `/generate` API and
//! [`TeiEmbedder`] the text-embeddings-inference `/embed` API. Generation is
//! greedy and returns only the continuation, matching how the decision
//! prompt expects to be answered.

use super::{
    secrets::ApiCredential, Embedder, GenerationConfig, Generator, ProviderError,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
const EMBED_TIMEOUT: Duration = Duration::from_secs(60);

fn build_client() -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .build()
        .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))
}

fn trim_base(url: impl Into<String>) -> String {
    url.into().trim_end_matches('/').to_string()
}

fn map_send_error(e: reqwest::Error, timeout: Duration) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(timeout)
    } else {
        ProviderError::HttpError(e.to_string())
    }
}

/// Attach the bearer token, if one is configured.
fn authorize(
    request: reqwest::RequestBuilder,
    credential: &Option<ApiCredential>,
) -> reqwest::RequestBuilder {
    match credential {
        // Only exposed here, at the point of use
        Some(token) => request.bearer_auth(token.expose()),
        None => request,
    }
}

/// Error body returned by both servers.
#[derive(Debug, Deserialize)]
struct ServerError {
    error: String,
}

/// Turn a non-success response into a provider error.
async fn error_from_response(response: reqwest::Response) -> ProviderError {
    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return ProviderError::AuthError;
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ServerError>(&body)
        .map(|e| e.error)
        .unwrap_or(body);

    ProviderError::ApiError {
        status: status.as_u16(),
        message,
    }
}

/// Text generation over a TGI server.
pub struct TgiGenerator {
    base_url: String,
    credential: Option<ApiCredential>,
    client: reqwest::Client,
}

impl std::fmt::Debug for TgiGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TgiGenerator")
            .field("base_url", &self.base_url)
            .field("credential", &self.credential)
            .finish()
    }
}

impl TgiGenerator {
    pub fn new(
        base_url: impl Into<String>,
        credential: Option<ApiCredential>,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            base_url: trim_base(base_url),
            credential,
            client: build_client()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    inputs: &'a str,
    parameters: GenerateParameters,
}

#[derive(Debug, Serialize)]
struct GenerateParameters {
    max_new_tokens: u32,
    do_sample: bool,
    return_full_text: bool,
}

impl<'a> GenerateRequest<'a> {
    fn greedy(prompt: &'a str, config: &GenerationConfig) -> Self {
        Self {
            inputs: prompt,
            parameters: GenerateParameters {
                max_new_tokens: config.max_new_tokens,
                do_sample: false,
                return_full_text: false,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    generated_text: String,
}

/// Read the continuation out of a `/generate` response.
async fn read_generation(response: reqwest::Response) -> Result<String, ProviderError> {
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }

    let body: GenerateResponse = response
        .json()
        .await
        .map_err(|e| ProviderError::ParseError(e.to_string()))?;

    Ok(body.generated_text)
}

#[async_trait]
impl Generator for TgiGenerator {
    async fn generate(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<String, ProviderError> {
        let request = GenerateRequest::greedy(prompt, config);

        let response = authorize(
            self.client.post(format!("{}/generate", self.base_url)),
            &self.credential,
        )
        .timeout(config.timeout)
        .json(&request)
        .send()
        .await
        .map_err(|e| map_send_error(e, config.timeout))?;

        let text = read_generation(response).await?;
        debug!(chars = text.len(), "Generation received");
        Ok(text)
    }

    async fn health_check(&self) -> bool {
        authorize(
            self.client.get(format!("{}/health", self.base_url)),
            &self.credential,
        )
        .timeout(HEALTH_TIMEOUT)
        .send()
        .await
        .map(|r| r.status().is_success())
        .unwrap_or(false)
    }

    fn name(&self) -> &str {
        "tgi"
    }
}

/// Text embedding over a TEI server.
pub struct TeiEmbedder {
    base_url: String,
    credential: Option<ApiCredential>,
    client: reqwest::Client,
}

impl std::fmt::Debug for TeiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeiEmbedder")
            .field("base_url", &self.base_url)
            .field("credential", &self.credential)
            .finish()
    }
}

impl TeiEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        credential: Option<ApiCredential>,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            base_url: trim_base(base_url),
            credential,
            client: build_client()?,
        })
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [String],
}

/// Read one vector per input out of an `/embed` response.
async fn read_embeddings(
    response: reqwest::Response,
    expected: usize,
) -> Result<Vec<Vec<f32>>, ProviderError> {
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }

    let vectors: Vec<Vec<f32>> = response
        .json()
        .await
        .map_err(|e| ProviderError::ParseError(e.to_string()))?;

    if vectors.len() != expected {
        return Err(ProviderError::ParseError(format!(
            "expected {} embeddings, got {}",
            expected,
            vectors.len()
        )));
    }
    Ok(vectors)
}

#[async_trait]
impl Embedder for TeiEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let response = authorize(
            self.client.post(format!("{}/embed", self.base_url)),
            &self.credential,
        )
        .timeout(EMBED_TIMEOUT)
        .json(&EmbedRequest { inputs: texts })
        .send()
        .await
        .map_err(|e| map_send_error(e, EMBED_TIMEOUT))?;

        read_embeddings(response, texts.len()).await
    }

    fn name(&self) -> &str {
        "tei"
    }
}
