//! Core data model shared between the offline pipeline and the runtime.

use serde::{Deserialize, Serialize};

use crate::category::CategoryId;

/// Document language, detected from Cyrillic codepoints in the title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Uk,
    En,
}

impl Language {
    /// `uk` when the text contains any Cyrillic codepoint, `en` otherwise.
    pub fn detect(text: &str) -> Language {
        if text.chars().any(|c| ('\u{0400}'..='\u{04FF}').contains(&c)) {
            Language::Uk
        } else {
            Language::En
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Uk => "uk",
            Language::En => "en",
        }
    }
}

/// Source document payload format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocKind {
    Pdf,
    Docx,
    Doc,
    #[serde(other)]
    Unknown,
}

impl DocKind {
    pub fn from_extension(ext: &str) -> DocKind {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => DocKind::Pdf,
            "docx" => DocKind::Docx,
            "doc" => DocKind::Doc,
            _ => DocKind::Unknown,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DocKind::Pdf => "pdf",
            DocKind::Docx => "docx",
            DocKind::Doc => "doc",
            DocKind::Unknown => "bin",
        }
    }
}

/// Immutable record of one corpus document, produced by the fetcher and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable across pipeline runs (derived from the source URL).
    pub id: String,
    pub title: String,
    pub filename: String,
    /// Path of the downloaded payload relative to the corpus root.
    pub filepath: String,
    pub source_url: String,
    pub category: CategoryId,
    pub language: Language,
    #[serde(rename = "type")]
    pub kind: DocKind,
    pub downloaded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_date: Option<String>,
}

/// Minimal copy of document fields carried on every chunk so the runtime
/// can rebuild the catalog from the index artifact alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_title: String,
    pub document_filename: String,
    pub source_url: String,
}

/// A sentence-aligned text window of one document.
///
/// `chunk_id` is `{document_id}_chunk_{chunk_index}` with indices forming a
/// contiguous `0..n` prefix per document. The chunk's category and language
/// always equal its document's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub document_id: String,
    pub text: String,
    /// Estimated token count (chunker heuristic, not the model tokenizer).
    pub tokens: usize,
    pub chunk_index: usize,
    pub category: CategoryId,
    pub language: Language,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Canonical chunk id composition.
    pub fn compose_id(document_id: &str, chunk_index: usize) -> String {
        format!("{}_chunk_{}", document_id, chunk_index)
    }
}

/// A chunk together with its L2-normalized embedding vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// Search result: a chunk and its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub score: f32,
}
