//! Index loading and validation.
//!
//! The runtime receives `embeddings.json.gz` through a [`BlobFetcher`],
//! decompresses it in memory and hoists the per-chunk embedding arrays into
//! one contiguous buffer. Validation is strict and fatal: the loader is the
//! single runtime component allowed to fail hard, and it runs at startup
//! where a corrupt artifact must stop the application rather than produce
//! silently wrong similarity scores.

use tracing::{debug, info, warn};

use crate::artifacts::{gunzip_bytes, EmbeddingsFile};
use crate::catalog::DocumentCatalog;
use crate::index::store::VectorStore;
use crate::index::VectorIndex;
use crate::traits::BlobFetcher;
use crate::vector::is_unit_norm;
use crate::{RagError, Result};

/// Fetches, decompresses and validates the index artifact.
pub async fn load_index(fetcher: &dyn BlobFetcher, path: &str) -> Result<VectorIndex> {
    let bytes = fetcher.fetch(path).await?;
    debug!(path, bytes = bytes.len(), "fetched index blob");
    index_from_bytes(&bytes)
}

/// Builds the index from gzip-compressed artifact bytes.
pub fn index_from_bytes(bytes: &[u8]) -> Result<VectorIndex> {
    let json = gunzip_bytes(bytes)?;
    let file: EmbeddingsFile = serde_json::from_slice(&json)
        .map_err(|e| RagError::IndexCorrupt(format!("embeddings file parse failed: {}", e)))?;
    index_from_file(file)
}

/// Builds the index from an already-parsed embeddings file.
pub fn index_from_file(file: EmbeddingsFile) -> Result<VectorIndex> {
    let dim = file.embedding_dim;
    if dim == 0 {
        return Err(RagError::IndexCorrupt("embedding_dim is zero".to_string()));
    }
    if file.total_chunks != file.chunks.len() {
        warn!(
            declared = file.total_chunks,
            actual = file.chunks.len(),
            "total_chunks does not match chunk array length"
        );
    }

    let mut chunks = Vec::with_capacity(file.chunks.len());
    let mut vectors = Vec::with_capacity(file.chunks.len() * dim);

    for (i, embedded) in file.chunks.into_iter().enumerate() {
        let chunk = embedded.chunk;
        if chunk.chunk_id.is_empty() || chunk.document_id.is_empty() || chunk.text.is_empty() {
            return Err(RagError::IndexCorrupt(format!(
                "chunk {} has empty chunk_id, document_id or text",
                i
            )));
        }
        if embedded.embedding.len() != dim {
            return Err(RagError::IndexCorrupt(format!(
                "chunk {} has embedding of length {}, expected {}",
                chunk.chunk_id,
                embedded.embedding.len(),
                dim
            )));
        }
        // The embedder contract promises unit vectors; verify instead of
        // trusting, otherwise dot-product scores stop being cosines.
        if !is_unit_norm(&embedded.embedding) {
            return Err(RagError::IndexCorrupt(format!(
                "chunk {} embedding is not L2-normalized",
                chunk.chunk_id
            )));
        }

        vectors.extend_from_slice(&embedded.embedding);
        chunks.push(chunk);
    }

    let catalog = DocumentCatalog::from_chunks(&chunks);
    let store = VectorStore::from_parts(dim, chunks, vectors)?;

    info!(
        chunks = store.len(),
        documents = catalog.len(),
        dim,
        model = %file.model,
        "index loaded"
    );

    Ok(VectorIndex::new(store, catalog, file.model, file.generated_at))
}
