//! Embedding driver: chunks through the embedder into the index artifact.
//!
//! Chunks are processed sequentially in small batches with a yield between
//! them; batching exists to bound peak memory and give the host a breather,
//! not for parallelism. A chunk whose embedding fails (or comes back with
//! the wrong shape) is logged and skipped -- the pipeline is loss-tolerant
//! here like everywhere else.

use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use regula_core::artifacts::{gzip_bytes, ChunksFile, EmbeddingsFile, ARTIFACT_VERSION};
use regula_core::traits::Embedder;
use regula_core::types::EmbeddedChunk;
use regula_core::vector::is_unit_norm;

use crate::{now_iso, Result};

/// Chunks per batch before yielding.
const BATCH_SIZE: usize = 10;
/// Pause between batches.
const BATCH_DELAY: Duration = Duration::from_secs(1);

/// Driver settings; tests shrink the delay to zero.
#[derive(Debug, Clone)]
pub struct EmbedConfig {
    pub model_name: String,
    pub batch_size: usize,
    pub batch_delay: Duration,
}

impl EmbedConfig {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            batch_size: BATCH_SIZE,
            batch_delay: BATCH_DELAY,
        }
    }
}

/// Embeds every chunk and assembles the embeddings artifact.
pub async fn run_embedding(
    chunks: &ChunksFile,
    embedder: &dyn Embedder,
    config: &EmbedConfig,
) -> Result<EmbeddingsFile> {
    let dim = embedder.dim();
    let mut embedded = Vec::with_capacity(chunks.chunks.len());
    let mut skipped = 0usize;

    for (batch_index, batch) in chunks.chunks.chunks(config.batch_size.max(1)).enumerate() {
        if batch_index > 0 {
            tokio::time::sleep(config.batch_delay).await;
        }

        for chunk in batch {
            let embedding = match embedder.embed(&chunk.text).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(chunk = %chunk.chunk_id, error = %e, "embedding failed, skipping");
                    skipped += 1;
                    continue;
                }
            };

            if embedding.len() != dim {
                warn!(
                    chunk = %chunk.chunk_id,
                    got = embedding.len(),
                    expected = dim,
                    "embedder returned wrong dimension, skipping"
                );
                skipped += 1;
                continue;
            }
            if !is_unit_norm(&embedding) {
                warn!(chunk = %chunk.chunk_id, "embedding not unit-norm, skipping");
                skipped += 1;
                continue;
            }

            embedded.push(EmbeddedChunk {
                chunk: chunk.clone(),
                embedding,
            });
        }

        info!(
            done = embedded.len(),
            total = chunks.chunks.len(),
            "embedding progress"
        );
    }

    if skipped > 0 {
        warn!(skipped, "chunks skipped during embedding");
    }

    Ok(EmbeddingsFile {
        version: ARTIFACT_VERSION.to_string(),
        generated_at: now_iso(),
        model: config.model_name.clone(),
        embedding_dim: dim,
        total_chunks: embedded.len(),
        config: chunks.config,
        chunks: embedded,
    })
}

/// Writes the artifact twice: pretty JSON for debugging, and a gzip stream
/// of the exact same bytes for deployment.
pub fn write_embeddings(file: &EmbeddingsFile, json_path: &Path, gz_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(file)?;
    crate::write_atomic(json_path, json.as_bytes())?;

    let compressed = gzip_bytes(json.as_bytes())?;
    crate::write_atomic(gz_path, &compressed)?;

    info!(
        uncompressed = json.len(),
        compressed = compressed.len(),
        "embeddings artifact written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use regula_core::category::CategoryId;
    use regula_core::chunker::ChunkerConfig;
    use regula_core::embedding::HashEmbedder;
    use regula_core::types::{Chunk, ChunkMetadata, Language};
    use regula_core::{RagError, Result as CoreResult};
    use async_trait::async_trait;

    fn chunk(i: usize) -> Chunk {
        Chunk {
            chunk_id: Chunk::compose_id("d1", i),
            document_id: "d1".into(),
            text: format!("Program text number {} about dormitory rules.", i),
            tokens: 8,
            chunk_index: i,
            category: CategoryId::Dormitories,
            language: Language::En,
            metadata: ChunkMetadata {
                document_title: "Dorm rules".into(),
                document_filename: "dorm.pdf".into(),
                source_url: "https://example.edu/dorm.pdf".into(),
            },
        }
    }

    fn chunks_file(count: usize) -> ChunksFile {
        ChunksFile {
            version: ARTIFACT_VERSION.into(),
            generated_at: now_iso(),
            config: ChunkerConfig::default(),
            total_chunks: count,
            chunks: (0..count).map(chunk).collect(),
        }
    }

    fn test_config() -> EmbedConfig {
        EmbedConfig {
            model_name: "hash-test".into(),
            batch_size: 4,
            batch_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_embeds_all_chunks() {
        let embedder = HashEmbedder::new(64, 42).unwrap();
        let file = run_embedding(&chunks_file(10), &embedder, &test_config())
            .await
            .unwrap();

        assert_eq!(file.total_chunks, 10);
        assert_eq!(file.embedding_dim, 64);
        assert_eq!(file.model, "hash-test");
        for embedded in &file.chunks {
            assert_eq!(embedded.embedding.len(), 64);
            assert!(is_unit_norm(&embedded.embedding));
        }
    }

    #[tokio::test]
    async fn test_deterministic_given_seeded_embedder() {
        let chunks = chunks_file(6);
        let a = run_embedding(&chunks, &HashEmbedder::new(64, 1).unwrap(), &test_config())
            .await
            .unwrap();
        let b = run_embedding(&chunks, &HashEmbedder::new(64, 1).unwrap(), &test_config())
            .await
            .unwrap();

        for (x, y) in a.chunks.iter().zip(b.chunks.iter()) {
            assert_eq!(x.embedding, y.embedding);
        }
    }

    #[tokio::test]
    async fn test_failing_chunks_are_skipped_not_fatal() {
        /// Fails on every second text.
        struct Flaky {
            inner: HashEmbedder,
        }

        #[async_trait]
        impl Embedder for Flaky {
            fn dim(&self) -> usize {
                self.inner.dim()
            }

            async fn embed(&self, text: &str) -> CoreResult<Vec<f32>> {
                if text.contains('3') || text.contains('7') {
                    Err(RagError::Embedding("synthetic failure".into()))
                } else {
                    self.inner.embed(text).await
                }
            }
        }

        let embedder = Flaky {
            inner: HashEmbedder::new(32, 0).unwrap(),
        };
        let file = run_embedding(&chunks_file(10), &embedder, &test_config())
            .await
            .unwrap();

        assert_eq!(file.total_chunks, 8);
        assert!(file.chunks.iter().all(|c| !c.chunk.text.contains('3')));
    }

    #[tokio::test]
    async fn test_written_gz_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = HashEmbedder::new(48, 9).unwrap();
        let file = run_embedding(&chunks_file(5), &embedder, &test_config())
            .await
            .unwrap();

        let json_path = dir.path().join("embeddings.json");
        let gz_path = dir.path().join("embeddings.json.gz");
        write_embeddings(&file, &json_path, &gz_path).unwrap();

        // The gz file is a gzip stream of the same JSON text.
        let json_bytes = std::fs::read(&json_path).unwrap();
        let gz_bytes = std::fs::read(&gz_path).unwrap();
        assert_eq!(
            regula_core::artifacts::gunzip_bytes(&gz_bytes).unwrap(),
            json_bytes
        );

        let index = regula_core::index_from_bytes(&gz_bytes).unwrap();
        assert_eq!(index.len(), 5);
        assert_eq!(index.model(), "hash-test");
    }
}
