//! ONNX Runtime embedder for the multilingual corpus model.
//!
//! Loads a sentence-transformer exported to ONNX together with its
//! tokenizer, runs mean pooling over the token outputs and L2-normalizes
//! the result. This is the backend the offline pipeline uses to produce
//! the deployed index; the browser runtime runs the same model through
//! transformers.js, so both sides share pooling and normalization by
//! construction of the export.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use tokenizers::Tokenizer;

use crate::traits::Embedder;
use crate::vector::normalize;
use crate::{RagError, Result, EMBEDDING_DIM};

/// ONNX Runtime embedder.
///
/// The session is behind a mutex because ONNX Runtime sessions require
/// exclusive access per run; queries are short and sequential in the
/// pipeline, so contention is not a concern.
pub struct OnnxEmbedder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    dim: usize,
}

impl OnnxEmbedder {
    /// Loads the model and tokenizer from disk.
    pub fn new(model_path: impl AsRef<Path>, tokenizer_path: impl AsRef<Path>) -> Result<Self> {
        let session = Session::builder()
            .map_err(|e| RagError::EmbedderUnavailable(format!("session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| RagError::EmbedderUnavailable(format!("optimization level: {}", e)))?
            .with_intra_threads(4)
            .map_err(|e| RagError::EmbedderUnavailable(format!("thread count: {}", e)))?
            .commit_from_file(model_path.as_ref())
            .map_err(|e| {
                RagError::EmbedderUnavailable(format!(
                    "failed to load model {:?}: {}",
                    model_path.as_ref(),
                    e
                ))
            })?;

        let tokenizer = Tokenizer::from_file(tokenizer_path.as_ref()).map_err(|e| {
            RagError::EmbedderUnavailable(format!(
                "failed to load tokenizer {:?}: {}",
                tokenizer_path.as_ref(),
                e
            ))
        })?;

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            dim: EMBEDDING_DIM,
        })
    }

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| RagError::Embedding(format!("tokenization failed: {}", e)))?;

        let length = encoding.len();
        if length == 0 {
            return Err(RagError::Embedding("text tokenized to nothing".to_string()));
        }

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&x| x as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&x| x as i64)
            .collect();

        let ids_tensor = Value::from_array(([1, length], input_ids))
            .map_err(|e| RagError::Embedding(format!("input tensor: {}", e)))?;
        let mask_tensor = Value::from_array(([1, length], attention_mask.clone()))
            .map_err(|e| RagError::Embedding(format!("mask tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| RagError::EmbedderUnavailable("session poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![ids_tensor, mask_tensor])
            .map_err(|e| RagError::Embedding(format!("inference failed: {}", e)))?;

        let (shape, data) = outputs["last_hidden_state"]
            .try_extract_tensor::<f32>()
            .map_err(|e| RagError::Embedding(format!("output extraction failed: {}", e)))?;

        if shape.len() != 3 {
            return Err(RagError::Embedding(format!(
                "unexpected output shape {:?}",
                shape
            )));
        }
        let seq_len = shape[1] as usize;
        let hidden = shape[2] as usize;
        if hidden != self.dim {
            return Err(RagError::Embedding(format!(
                "model produced {}-dim hidden states, expected {}",
                hidden, self.dim
            )));
        }

        let hidden_states = Array2::from_shape_vec((seq_len, hidden), data.to_vec())
            .map_err(|e| RagError::Embedding(format!("output reshape failed: {}", e)))?;

        let mut pooled = mean_pool(&hidden_states, &attention_mask)?;
        normalize(&mut pooled);
        Ok(pooled)
    }
}

#[async_trait]
impl Embedder for OnnxEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_one(text)
    }
}

/// Mean over token vectors, weighted by the attention mask so padding does
/// not dilute the result.
fn mean_pool(hidden_states: &Array2<f32>, attention_mask: &[i64]) -> Result<Vec<f32>> {
    let (seq_len, hidden) = hidden_states.dim();
    if seq_len != attention_mask.len() {
        return Err(RagError::Embedding(format!(
            "sequence length mismatch: hidden {} vs mask {}",
            seq_len,
            attention_mask.len()
        )));
    }

    let mut summed = vec![0.0_f32; hidden];
    let mut count = 0.0_f32;
    for (i, &mask) in attention_mask.iter().enumerate() {
        if mask > 0 {
            for (j, value) in hidden_states.row(i).iter().enumerate() {
                summed[j] += value;
            }
            count += 1.0;
        }
    }

    if count == 0.0 {
        return Err(RagError::Embedding("all tokens masked".to_string()));
    }
    for value in summed.iter_mut() {
        *value /= count;
    }
    Ok(summed)
}
