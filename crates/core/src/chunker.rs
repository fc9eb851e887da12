//! Sentence-aligned text chunker.
//!
//! Splits normalized document text into overlapping windows of roughly
//! 200-300 estimated tokens. The token estimate is a fixed character
//! heuristic rather than a model tokenizer: chunking runs offline and its
//! output is part of the artifact contract, so it must be deterministic and
//! independent of any tokenizer build. Works the same for Ukrainian and
//! English text since it never looks at words, only sentence punctuation.

use serde::{Deserialize, Serialize};

use crate::category::CategoryId;
use crate::types::{Chunk, ChunkMetadata, Document};

/// Characters per estimated token. Sole authority for token accounting
/// inside the chunker.
const CHARS_PER_TOKEN: f64 = 3.5;

/// Chunking parameters. Persisted verbatim into the chunk and embedding
/// artifacts so a loaded index documents how it was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkerConfig {
    pub target_tokens: usize,
    pub overlap_tokens: usize,
    pub min_chunk_tokens: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            target_tokens: 250,
            overlap_tokens: 50,
            min_chunk_tokens: 100,
        }
    }
}

/// Sentence-aware chunker.
pub struct Chunker {
    config: ChunkerConfig,
}

/// Estimated token count: `ceil(chars / 3.5)`.
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() as f64 / CHARS_PER_TOKEN).ceil() as usize
}

/// Splits text into sentences on `.`, `!`, `?` followed by whitespace.
/// Sentences are trimmed; empty ones are dropped. No language-specific
/// logic: abbreviations split too, and that is acceptable for windowing.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some(&(_, next)) = chars.peek() {
                if next.is_whitespace() {
                    let end = i + c.len_utf8();
                    let sentence = text[start..end].trim();
                    if !sentence.is_empty() {
                        sentences.push(sentence);
                    }
                    start = end;
                }
            }
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    sentences
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(ChunkerConfig::default())
    }
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunks text into overlapping sentence-aligned segments.
    ///
    /// Sentences are appended to the current segment until the next one
    /// would push the estimate past `target_tokens`; the segment is then
    /// emitted and the next one is seeded with the last `overlap_tokens`
    /// space-separated words of its predecessor. The trailing segment is
    /// kept only if it reaches `min_chunk_tokens`, so pathological input
    /// (all sentences tiny) may legitimately produce zero chunks.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let sentences = split_sentences(text);
        if sentences.is_empty() {
            return Vec::new();
        }

        let mut segments = Vec::new();
        let mut current = String::new();
        let mut current_tokens = 0usize;

        for sentence in sentences {
            let sentence_tokens = estimate_tokens(sentence);

            if current.is_empty() {
                current.push_str(sentence);
                current_tokens = sentence_tokens;
                continue;
            }

            if current_tokens + sentence_tokens > self.config.target_tokens {
                let tail = overlap_tail(&current, self.config.overlap_tokens);
                segments.push(std::mem::take(&mut current));

                if tail.is_empty() {
                    current.push_str(sentence);
                } else {
                    current.push_str(&tail);
                    current.push(' ');
                    current.push_str(sentence);
                }
                current_tokens = estimate_tokens(&current);
            } else {
                current.push(' ');
                current.push_str(sentence);
                current_tokens += sentence_tokens;
            }
        }

        if !current.is_empty() && estimate_tokens(&current) >= self.config.min_chunk_tokens {
            segments.push(current);
        }

        segments
    }

    /// Chunks a document's extracted text into full [`Chunk`] records with
    /// contiguous indices and the document metadata copy.
    pub fn chunk_document(&self, document: &Document, text: &str) -> Vec<Chunk> {
        self.chunk_text(
            &document.id,
            text,
            document.category,
            document.language,
            ChunkMetadata {
                document_title: document.title.clone(),
                document_filename: document.filename.clone(),
                source_url: document.source_url.clone(),
            },
        )
    }

    /// Lower-level variant for callers without a full [`Document`] record.
    pub fn chunk_text(
        &self,
        document_id: &str,
        text: &str,
        category: CategoryId,
        language: crate::types::Language,
        metadata: ChunkMetadata,
    ) -> Vec<Chunk> {
        self.chunk(text)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, segment)| Chunk {
                chunk_id: Chunk::compose_id(document_id, chunk_index),
                document_id: document_id.to_string(),
                tokens: estimate_tokens(&segment),
                text: segment,
                chunk_index,
                category,
                language,
                metadata: metadata.clone(),
            })
            .collect()
    }
}

/// Last `n` space-separated words of `segment`, joined by single spaces.
/// This is word-level overlap, deliberately not the token estimator's unit.
fn overlap_tail(segment: &str, n: usize) -> String {
    if n == 0 {
        return String::new();
    }
    let words: Vec<&str> = segment.split_whitespace().collect();
    let start = words.len().saturating_sub(n);
    words[start..].join(" ")
}
