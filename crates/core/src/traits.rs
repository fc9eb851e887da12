//! Trait surfaces for the external collaborators the core consumes.
//!
//! The embedding model, the generator and the blob transport are owned by
//! the host application (native CLI or browser shell). The core only ever
//! talks to them through these traits, which keeps the retrieval and
//! orchestration logic identical across deployments. The same embedder
//! implementation (same pooling, same normalization) must back both the
//! offline pipeline and the runtime; a mismatch silently invalidates every
//! similarity score.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Produces one L2-normalized embedding vector per input text.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embedding dimension, fixed for the lifetime of the embedder.
    fn dim(&self) -> usize;

    /// Embed a single text. The returned vector has length [`Self::dim`]
    /// and unit L2 norm (normalization happens inside the embedder).
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Sampling knobs passed through to the language model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_new_tokens: usize,
    pub top_k: usize,
    pub top_p: f32,
    pub repetition_penalty: f32,
    pub do_sample: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_new_tokens: 256,
            top_k: 50,
            top_p: 0.9,
            repetition_penalty: 1.1,
            do_sample: true,
        }
    }
}

/// Produces the continuation of a prompt, excluding the prompt itself.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String>;
}

/// Fetches an artifact blob by path (HTTP fetch in the browser, filesystem
/// read in native builds).
#[async_trait]
pub trait BlobFetcher: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>>;
}

/// Monotonic millisecond clock used for timing breakdowns.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> f64;
}

/// [`Clock`] backed by `std::time::Instant`.
pub struct SystemClock {
    origin: std::time::Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Token counting for prompt budgeting.
///
/// This is the generator-facing counter the prompt builder uses for history
/// truncation. The chunker deliberately does not use it; chunking has its
/// own character-based estimate so that offline artifacts never depend on a
/// tokenizer build.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Default counter: roughly one token per four characters.
pub struct HeuristicTokenCounter;

impl TokenCounter for HeuristicTokenCounter {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }
}
