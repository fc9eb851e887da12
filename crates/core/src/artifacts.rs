//! Wire shapes of the persisted pipeline artifacts.
//!
//! Four JSON files form the contract between the offline pipeline and the
//! runtime: `documents.json`, `chunks.json`, `embeddings.json` (plus its
//! gzip twin, the only one the runtime actually loads) and
//! `categories.json`. The structs here serialize to those exact shapes;
//! the in-memory index layout is free to differ and does.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::chunker::ChunkerConfig;
use crate::types::{Chunk, Document, EmbeddedChunk};
use crate::{RagError, Result};

/// Artifact format version stamped into every file.
pub const ARTIFACT_VERSION: &str = "1.0";

/// Per-category document count in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryCount {
    pub id: String,
    pub document_count: usize,
}

/// `documents.json` -- provenance manifest written by the fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsManifest {
    pub version: String,
    pub generated_at: String,
    pub source_url: String,
    pub total_documents: usize,
    pub downloaded: usize,
    pub failed: usize,
    pub categories: Vec<CategoryCount>,
    pub documents: Vec<Document>,
}

/// `chunks.json` -- chunker output, kept uncompressed for inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunksFile {
    pub version: String,
    pub generated_at: String,
    pub config: ChunkerConfig,
    pub total_chunks: usize,
    pub chunks: Vec<Chunk>,
}

/// `embeddings.json` / `embeddings.json.gz` -- the vector index artifact.
///
/// The gzip file is a plain gzip stream of the UTF-8 bytes of the same JSON
/// text, so either file deserializes identically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsFile {
    pub version: String,
    pub generated_at: String,
    /// Opaque embedding model identifier; informational only, but a
    /// mismatch with the runtime embedder invalidates every score.
    pub model: String,
    pub embedding_dim: usize,
    pub total_chunks: usize,
    pub config: ChunkerConfig,
    pub chunks: Vec<EmbeddedChunk>,
}

/// One entry of `categories.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub id: String,
    pub name_uk: String,
    pub name_en: String,
    pub icon: String,
    pub description_uk: String,
    pub description_en: String,
    pub document_count: usize,
}

/// `categories.json` -- taxonomy with per-category document counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoriesFile {
    pub version: String,
    pub generated_at: String,
    pub total_categories: usize,
    pub categories: Vec<CategoryEntry>,
}

/// Gzip-compresses UTF-8 JSON text for deployment.
pub fn gzip_bytes(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompresses a gzip artifact blob.
///
/// Malformed streams surface as [`RagError::IndexCorrupt`] because the only
/// gzip payload the runtime touches is the index itself.
pub fn gunzip_bytes(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| RagError::IndexCorrupt(format!("gzip decompression failed: {}", e)))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::CategoryId;
    use crate::types::{ChunkMetadata, DocKind, Language};

    fn sample_chunk(i: usize) -> Chunk {
        Chunk {
            chunk_id: Chunk::compose_id("doc1", i),
            document_id: "doc1".into(),
            text: format!("Chunk number {} text.", i),
            tokens: 6,
            chunk_index: i,
            category: CategoryId::Safety,
            language: Language::En,
            metadata: ChunkMetadata {
                document_title: "Safety rules".into(),
                document_filename: "safety.pdf".into(),
                source_url: "https://example.edu/safety.pdf".into(),
            },
        }
    }

    #[test]
    fn test_gzip_roundtrip() {
        let data = b"{\"version\":\"1.0\"}".repeat(50);
        let compressed = gzip_bytes(&data).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(gunzip_bytes(&compressed).unwrap(), data);
    }

    #[test]
    fn test_gunzip_rejects_garbage() {
        let result = gunzip_bytes(b"definitely not gzip");
        assert!(matches!(result, Err(RagError::IndexCorrupt(_))));
    }

    #[test]
    fn test_embeddings_file_shape() {
        let file = EmbeddingsFile {
            version: ARTIFACT_VERSION.into(),
            generated_at: "2025-09-01T10:00:00Z".into(),
            model: "paraphrase-multilingual-mpnet-base-v2".into(),
            embedding_dim: 3,
            total_chunks: 1,
            config: ChunkerConfig::default(),
            chunks: vec![EmbeddedChunk {
                chunk: sample_chunk(0),
                embedding: vec![1.0, 0.0, 0.0],
            }],
        };

        let value = serde_json::to_value(&file).unwrap();
        assert_eq!(value["version"], "1.0");
        assert_eq!(value["embedding_dim"], 3);
        // EmbeddedChunk flattens: chunk fields sit next to the vector.
        assert_eq!(value["chunks"][0]["chunk_id"], "doc1_chunk_0");
        assert_eq!(value["chunks"][0]["embedding"][0], 1.0);
        assert_eq!(value["chunks"][0]["metadata"]["document_filename"], "safety.pdf");

        let back: EmbeddingsFile = serde_json::from_value(value).unwrap();
        assert_eq!(back.chunks[0].chunk, file.chunks[0].chunk);
    }

    #[test]
    fn test_chunks_file_roundtrip() {
        let file = ChunksFile {
            version: ARTIFACT_VERSION.into(),
            generated_at: "2025-09-01T10:00:00Z".into(),
            config: ChunkerConfig::default(),
            total_chunks: 2,
            chunks: vec![sample_chunk(0), sample_chunk(1)],
        };
        let text = serde_json::to_string(&file).unwrap();
        let back: ChunksFile = serde_json::from_str(&text).unwrap();
        assert_eq!(back.total_chunks, 2);
        assert_eq!(back.chunks, file.chunks);
        assert_eq!(back.config, ChunkerConfig::default());
    }

    #[test]
    fn test_manifest_shape() {
        let manifest = DocumentsManifest {
            version: ARTIFACT_VERSION.into(),
            generated_at: "2025-09-01T10:00:00Z".into(),
            source_url: "https://example.edu/documents".into(),
            total_documents: 1,
            downloaded: 0,
            failed: 1,
            categories: vec![CategoryCount {
                id: "safety".into(),
                document_count: 1,
            }],
            documents: vec![Document {
                id: "deadbeef".into(),
                title: "Safety rules".into(),
                filename: "safety.pdf".into(),
                filepath: "safety/safety.pdf".into(),
                source_url: "https://example.edu/safety.pdf".into(),
                category: CategoryId::Safety,
                language: Language::En,
                kind: DocKind::Pdf,
                downloaded: false,
                download_error: Some("HTTP 404".into()),
                download_date: None,
            }],
        };

        let value = serde_json::to_value(&manifest).unwrap();
        assert_eq!(value["documents"][0]["download_error"], "HTTP 404");
        assert_eq!(value["categories"][0]["id"], "safety");
    }
}
