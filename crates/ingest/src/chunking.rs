//! Chunking stage: extracted text files into `chunks.json`.

use std::fs;
use std::path::Path;

use tracing::{info, warn};

use regula_core::artifacts::{ChunksFile, DocumentsManifest, ARTIFACT_VERSION};
use regula_core::chunker::{Chunker, ChunkerConfig};

use crate::{now_iso, Result};

/// Chunks every extracted document and assembles the chunks artifact.
pub fn run_chunking(
    manifest: &DocumentsManifest,
    text_root: &Path,
    config: ChunkerConfig,
) -> Result<ChunksFile> {
    let chunker = Chunker::new(config);
    let mut chunks = Vec::new();
    let mut chunked_documents = 0usize;

    for document in manifest.documents.iter().filter(|d| d.downloaded) {
        let text_path = crate::extractor::text_path_for(document, text_root);
        let text = match fs::read_to_string(&text_path) {
            Ok(text) => text,
            Err(e) => {
                warn!(document = %document.title, error = %e, "text file unreadable, skipping");
                continue;
            }
        };

        let document_chunks = chunker.chunk_document(document, &text);
        if document_chunks.is_empty() {
            // Legitimate for pathological input; logged, never fatal.
            warn!(document = %document.title, "document produced no chunks");
            continue;
        }

        chunked_documents += 1;
        chunks.extend(document_chunks);
    }

    info!(
        documents = chunked_documents,
        chunks = chunks.len(),
        "chunking pass complete"
    );

    Ok(ChunksFile {
        version: ARTIFACT_VERSION.to_string(),
        generated_at: now_iso(),
        config,
        total_chunks: chunks.len(),
        chunks,
    })
}

/// Writes the chunks artifact as pretty JSON.
pub fn write_chunks(file: &ChunksFile, out_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(file)?;
    crate::write_atomic(out_path, json.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use regula_core::artifacts::CategoryCount;
    use regula_core::category::CategoryId;
    use regula_core::types::{DocKind, Document, Language};

    fn manifest_with(documents: Vec<Document>) -> DocumentsManifest {
        let downloaded = documents.iter().filter(|d| d.downloaded).count();
        DocumentsManifest {
            version: ARTIFACT_VERSION.into(),
            generated_at: now_iso(),
            source_url: "https://example.edu/documents".into(),
            total_documents: documents.len(),
            downloaded,
            failed: documents.len() - downloaded,
            categories: vec![CategoryCount {
                id: "safety".into(),
                document_count: documents.len(),
            }],
            documents,
        }
    }

    fn document(id: &str, downloaded: bool) -> Document {
        Document {
            id: id.into(),
            title: format!("Document {}", id),
            filename: format!("{}.pdf", id),
            filepath: format!("safety/{}.pdf", id),
            source_url: format!("https://example.edu/{}.pdf", id),
            category: CategoryId::Safety,
            language: Language::En,
            kind: DocKind::Pdf,
            downloaded,
            download_error: None,
            download_date: None,
        }
    }

    /// ~40 sentences of ~12 tokens each; enough for several chunks.
    fn sample_text() -> String {
        (0..40)
            .map(|i| format!("Sentence number {} talks about workplace safety rules. ", i))
            .collect()
    }

    #[test]
    fn test_run_chunking_produces_contiguous_indices() {
        let dir = tempfile::tempdir().unwrap();
        let doc = document("d1", true);
        let text_path = crate::extractor::text_path_for(&doc, dir.path());
        crate::write_atomic(&text_path, sample_text().as_bytes()).unwrap();

        let manifest = manifest_with(vec![doc, document("missing", true), document("skip", false)]);
        let file = run_chunking(&manifest, dir.path(), ChunkerConfig::default()).unwrap();

        assert!(file.total_chunks > 0);
        assert_eq!(file.total_chunks, file.chunks.len());
        // Only d1 contributed; the unreadable and undownloaded ones skipped.
        for (i, chunk) in file.chunks.iter().enumerate() {
            assert_eq!(chunk.document_id, "d1");
            assert_eq!(chunk.chunk_index, i);
            assert_eq!(chunk.category, CategoryId::Safety);
        }
    }

    #[test]
    fn test_write_chunks_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let doc = document("d1", true);
        let text_path = crate::extractor::text_path_for(&doc, dir.path());
        crate::write_atomic(&text_path, sample_text().as_bytes()).unwrap();

        let manifest = manifest_with(vec![doc]);
        let file = run_chunking(&manifest, dir.path(), ChunkerConfig::default()).unwrap();

        let out = dir.path().join("chunks.json");
        write_chunks(&file, &out).unwrap();

        let back: ChunksFile =
            serde_json::from_slice(&fs::read(&out).unwrap()).unwrap();
        assert_eq!(back.total_chunks, file.total_chunks);
        assert_eq!(back.chunks, file.chunks);
    }

    #[test]
    fn test_rerun_is_byte_identical_modulo_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let doc = document("d1", true);
        let text_path = crate::extractor::text_path_for(&doc, dir.path());
        crate::write_atomic(&text_path, sample_text().as_bytes()).unwrap();

        let manifest = manifest_with(vec![doc]);
        let mut a = run_chunking(&manifest, dir.path(), ChunkerConfig::default()).unwrap();
        let mut b = run_chunking(&manifest, dir.path(), ChunkerConfig::default()).unwrap();

        a.generated_at.clear();
        b.generated_at.clear();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
