//! Regula - Runtime core
//!
//! Client-side retrieval-augmented generation over a corpus of university
//! regulatory documents. This crate holds everything that runs on the end
//! user's device: index loading, exact vector search, query routing, prompt
//! assembly and the RAG orchestrator. The heavyweight collaborators
//! (embedding model, generator, blob transport) stay behind the traits in
//! [`traits`] so the same core serves both the native pipeline and the
//! browser build.

pub mod artifacts;
pub mod catalog;
pub mod category;
pub mod chunker;
pub mod embedding;
pub mod index;
pub mod pipeline;
pub mod prompt;
pub mod router;
pub mod traits;
pub mod types;
pub mod vector;

use thiserror::Error;

/// Result type for runtime core operations
pub type Result<T> = std::result::Result<T, RagError>;

/// Error types for runtime core operations
#[derive(Debug, Error)]
pub enum RagError {
    /// Malformed or inconsistent index artifact. Fatal at load time.
    #[error("Index corrupt: {0}")]
    IndexCorrupt(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Embedder unavailable: {0}")]
    EmbedderUnavailable(String),

    #[error("Generator unavailable: {0}")]
    GeneratorUnavailable(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Re-export the types most callers need.
pub use catalog::{CatalogStats, DocumentCatalog};
pub use category::CategoryId;
pub use chunker::{Chunker, ChunkerConfig};
pub use index::loader::{index_from_bytes, load_index};
pub use index::store::{Scoring, SearchFilter, VectorStore};
pub use index::VectorIndex;
pub use pipeline::{AnswerOptions, RagPipeline, RagResult, SourceRef};
pub use prompt::{ChatMessage, PromptBuilder, Role};
pub use router::{Mode, QueryRouter, RouterConfig, RoutingDecision};
pub use traits::{
    BlobFetcher, Clock, Embedder, GenerationConfig, Generator, HeuristicTokenCounter,
    SystemClock, TokenCounter,
};
pub use types::{
    Chunk, ChunkMetadata, DocKind, Document, EmbeddedChunk, Language, ScoredChunk,
};
pub use vector::{cosine_similarity, dot_product, l2_norm, normalize};

/// Embedding dimension of the shipped index (multilingual MiniLM-class model).
pub const EMBEDDING_DIM: usize = 768;

/// Tolerance for the unit-norm check on stored and query vectors.
pub const NORM_EPSILON: f32 = 1e-3;
