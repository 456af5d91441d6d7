//! In-process sentence embeddings on ONNX Runtime.
//!
//! Runs a sentence-transformers export (all-MiniLM-L6-v2 by default, 384
//! dimensions) with mean pooling over the attention mask. The model
//! directory must contain `model.onnx` and `tokenizer.json`.

use super::{l2_normalize, Embedder, ProviderError};
use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokenizers::Tokenizer;
use tracing::info;

/// Token limit of the MiniLM family.
const MAX_SEQUENCE_LENGTH: usize = 256;

struct SentenceModel {
    session: Session,
    tokenizer: Tokenizer,
    dim: usize,
}

/// Sentence embedder backed by an ONNX Runtime session.
///
/// Inference is CPU-bound, so batches run on the blocking pool. The session
/// needs exclusive access while running, so calls are serialized on a mutex.
pub struct OnnxEmbedder {
    model: Arc<Mutex<SentenceModel>>,
    model_dir: PathBuf,
    dim: usize,
}

impl std::fmt::Debug for OnnxEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbedder")
            .field("model_dir", &self.model_dir)
            .field("dim", &self.dim)
            .finish()
    }
}

impl OnnxEmbedder {
    /// Load a model from a directory holding `model.onnx` and `tokenizer.json`.
    pub fn load(model_dir: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let model_dir = model_dir.as_ref();
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        for path in [&model_path, &tokenizer_path] {
            if !path.exists() {
                return Err(ProviderError::NotConfigured(format!(
                    "{} not found",
                    path.display()
                )));
            }
        }

        let session = Session::builder()
            .map_err(load_error)?
            .commit_from_file(&model_path)
            .map_err(load_error)?;

        let dim = session
            .outputs()
            .first()
            .and_then(|output| infer_dim(output.dtype()))
            .unwrap_or(384);

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| ProviderError::NotConfigured(format!("load tokenizer: {}", e)))?;
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_SEQUENCE_LENGTH,
                ..Default::default()
            }))
            .map_err(|e| ProviderError::NotConfigured(format!("set truncation: {}", e)))?;
        tokenizer.with_padding(Some(tokenizers::PaddingParams::default()));

        info!(dim, model = %model_path.display(), "Loaded embedding model");

        Ok(Self {
            model: Arc::new(Mutex::new(SentenceModel {
                session,
                tokenizer,
                dim,
            })),
            model_dir: model_dir.to_path_buf(),
            dim,
        })
    }

    /// Embedding dimensionality (384 for all-MiniLM-L6-v2).
    pub fn dim(&self) -> usize {
        self.dim
    }
}

impl SentenceModel {
    fn embed_batch(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let batch_size = texts.len();
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| ProviderError::Unavailable(format!("tokenize: {}", e)))?;

        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        // Flat [batch_size, seq_len] inputs.
        let mut input_ids = vec![0i64; batch_size * seq_len];
        let mut attention_mask = vec![0i64; batch_size * seq_len];
        let mut token_type_ids = vec![0i64; batch_size * seq_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let offset = i * seq_len;
            for (j, &id) in encoding.get_ids().iter().enumerate() {
                input_ids[offset + j] = i64::from(id);
            }
            for (j, &mask) in encoding.get_attention_mask().iter().enumerate() {
                attention_mask[offset + j] = i64::from(mask);
            }
            for (j, &tid) in encoding.get_type_ids().iter().enumerate() {
                token_type_ids[offset + j] = i64::from(tid);
            }
        }

        let shape = [batch_size as i64, seq_len as i64];
        let ids = Tensor::from_array((shape, input_ids.into_boxed_slice())).map_err(inference)?;
        let mask = Tensor::from_array((shape, attention_mask.clone().into_boxed_slice()))
            .map_err(inference)?;
        let types =
            Tensor::from_array((shape, token_type_ids.into_boxed_slice())).map_err(inference)?;

        let outputs = self
            .session
            .run(ort::inputs![
                "input_ids" => ids,
                "attention_mask" => mask,
                "token_type_ids" => types,
            ])
            .map_err(inference)?;

        // Token embeddings: [batch_size, seq_len, dim].
        let (output_shape, output_data) =
            outputs[0].try_extract_tensor::<f32>().map_err(inference)?;
        let dims: &[i64] = output_shape;
        if dims.len() != 3 || dims[0] as usize != batch_size || dims[2] as usize != self.dim {
            return Err(ProviderError::ParseError(format!(
                "unexpected output shape {:?}, expected [{}, {}, {}]",
                dims, batch_size, seq_len, self.dim
            )));
        }
        let actual_seq_len = dims[1] as usize;

        let mut embeddings = Vec::with_capacity(batch_size);
        for i in 0..batch_size {
            let mut pooled = vec![0.0f32; self.dim];
            let mut token_count = 0.0f32;

            for j in 0..actual_seq_len.min(seq_len) {
                let mask_val = attention_mask[i * seq_len + j] as f32;
                if mask_val > 0.0 {
                    let offset = (i * actual_seq_len + j) * self.dim;
                    for (d, p) in pooled.iter_mut().enumerate() {
                        *p += output_data[offset + d] * mask_val;
                    }
                    token_count += mask_val;
                }
            }

            if token_count > 0.0 {
                for p in &mut pooled {
                    *p /= token_count;
                }
            }
            l2_normalize(&mut pooled);
            embeddings.push(pooled);
        }

        Ok(embeddings)
    }
}

fn load_error(e: impl std::fmt::Display) -> ProviderError {
    ProviderError::NotConfigured(format!("load ONNX model: {}", e))
}

fn inference(e: impl std::fmt::Display) -> ProviderError {
    ProviderError::Unavailable(format!("ONNX inference: {}", e))
}

/// Last dimension of the model output, when the graph declares it.
fn infer_dim(output_type: &ort::value::ValueType) -> Option<usize> {
    match output_type {
        ort::value::ValueType::Tensor { shape, .. } => shape
            .last()
            .and_then(|&d| if d > 0 { Some(d as usize) } else { None }),
        _ => None,
    }
}

#[async_trait]
impl Embedder for OnnxEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| ProviderError::Unavailable("embedding model poisoned".to_string()))?;
            model.embed_batch(&texts)
        })
        .await
        .map_err(|e| ProviderError::Unavailable(format!("embedding task: {}", e)))?
    }

    fn name(&self) -> &str {
        "onnx"
    }
}
