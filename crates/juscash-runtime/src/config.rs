//! Runtime configuration.
//!
//! Every setting comes from an environment variable with a default. Parsing
//! goes through a lookup function so tests can supply variables without
//! touching the process environment.

use crate::providers::{GenerationConfig, HF_TOKEN_ENV};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const ENV_GENERATION_MODEL: &str = "LOCAL_LLM_MODEL";
pub const ENV_EMBEDDING_MODEL: &str = "EMBEDDING_MODEL_NAME";
pub const ENV_GENERATOR_URL: &str = "JUSCASH_GENERATOR_URL";
pub const ENV_EMBEDDER_URL: &str = "JUSCASH_EMBEDDER_URL";
pub const ENV_EMBEDDING_MODEL_DIR: &str = "JUSCASH_EMBEDDING_MODEL_DIR";
pub const ENV_TOP_K: &str = "JUSCASH_TOP_K";
pub const ENV_MAX_NEW_TOKENS: &str = "JUSCASH_MAX_NEW_TOKENS";
pub const ENV_GENERATION_TIMEOUT: &str = "JUSCASH_GENERATION_TIMEOUT";
pub const ENV_MAX_CONCURRENT_GENERATIONS: &str = "JUSCASH_MAX_CONCURRENT_GENERATIONS";
pub const ENV_EMBEDDING_CACHE: &str = "JUSCASH_EMBEDDING_CACHE";

pub const DEFAULT_GENERATION_MODEL: &str = "google/gemma-2b-it";
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_GENERATOR_URL: &str = "http://localhost:8080";

/// Errors from loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Configuration for the decision runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Generation model identifier, recorded on every decision
    pub generation_model: String,

    /// Embedding model identifier
    pub embedding_model: String,

    /// Text-generation server base URL
    pub generator_url: String,

    /// Embedding server base URL. Takes precedence over the model directory.
    pub embedder_url: Option<String>,

    /// Directory holding `model.onnx` and `tokenizer.json` for in-process
    /// embeddings
    pub embedding_model_dir: Option<PathBuf>,

    /// Retrieval depth; `None` returns every rule
    pub top_k: Option<usize>,

    pub generation: GenerationConfig,

    /// Generations admitted concurrently against the inference server
    pub max_concurrent_generations: usize,

    /// Query-embedding cache capacity; zero disables the cache
    pub embedding_cache_entries: u64,

    /// Whether a server token is configured. The token itself is loaded
    /// separately and never stored here.
    pub has_token: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            generator_url: DEFAULT_GENERATOR_URL.to_string(),
            embedder_url: None,
            embedding_model_dir: None,
            top_k: None,
            generation: GenerationConfig::default(),
            max_concurrent_generations: 1,
            embedding_cache_entries: 1024,
            has_token: false,
        }
    }
}

impl RuntimeConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup.
    ///
    /// Unset or blank variables fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let top_k = match get(ENV_TOP_K) {
            Some(raw) => Some(parse_positive(ENV_TOP_K, &raw)?),
            None => None,
        };

        let max_new_tokens = match get(ENV_MAX_NEW_TOKENS) {
            Some(raw) => u32::try_from(parse_positive(ENV_MAX_NEW_TOKENS, &raw)?)
                .map_err(|e| invalid(ENV_MAX_NEW_TOKENS, &raw, e))?,
            None => defaults.generation.max_new_tokens,
        };

        let timeout = match get(ENV_GENERATION_TIMEOUT) {
            Some(raw) => parse_duration(ENV_GENERATION_TIMEOUT, &raw)?,
            None => defaults.generation.timeout,
        };

        let max_concurrent_generations = match get(ENV_MAX_CONCURRENT_GENERATIONS) {
            Some(raw) => parse_positive(ENV_MAX_CONCURRENT_GENERATIONS, &raw)?,
            None => defaults.max_concurrent_generations,
        };

        let embedding_cache_entries = match get(ENV_EMBEDDING_CACHE) {
            Some(raw) => raw.parse::<u64>().map_err(|e| invalid(ENV_EMBEDDING_CACHE, &raw, e))?,
            None => defaults.embedding_cache_entries,
        };

        let generator_url = match get(ENV_GENERATOR_URL) {
            Some(raw) => parse_url(ENV_GENERATOR_URL, raw)?,
            None => defaults.generator_url,
        };

        let embedder_url = match get(ENV_EMBEDDER_URL) {
            Some(raw) => Some(parse_url(ENV_EMBEDDER_URL, raw)?),
            None => None,
        };

        Ok(Self {
            generation_model: get(ENV_GENERATION_MODEL).unwrap_or(defaults.generation_model),
            embedding_model: get(ENV_EMBEDDING_MODEL).unwrap_or(defaults.embedding_model),
            generator_url,
            embedder_url,
            embedding_model_dir: get(ENV_EMBEDDING_MODEL_DIR).map(PathBuf::from),
            top_k,
            generation: GenerationConfig {
                max_new_tokens,
                timeout,
            },
            max_concurrent_generations,
            embedding_cache_entries,
            has_token: get(HF_TOKEN_ENV).is_some(),
        })
    }
}

fn invalid(key: &str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_positive(key: &str, raw: &str) -> Result<usize, ConfigError> {
    match raw.parse::<usize>() {
        Ok(0) => Err(invalid(key, raw, "must be at least 1")),
        Ok(n) => Ok(n),
        Err(e) => Err(invalid(key, raw, e)),
    }
}

fn parse_duration(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    match humantime::parse_duration(raw) {
        Ok(d) if d.is_zero() => Err(invalid(key, raw, "must be greater than zero")),
        Ok(d) => Ok(d),
        Err(e) => Err(invalid(key, raw, e)),
    }
}

fn parse_url(key: &str, raw: String) -> Result<String, ConfigError> {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        Ok(raw)
    } else {
        Err(invalid(key, &raw, "must start with http:// or https://"))
    }
}
