//! Exact top-K similarity search with metadata filters.
//!
//! An exhaustive scan over a contiguous row-major buffer. O(N·D) per query
//! and deliberately so: at corpus scale (a few thousand chunks) an exact
//! scan is faster than any index structure once cache behavior is counted,
//! and it makes results bit-for-bit deterministic, which approximate
//! structures cannot promise.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::category::CategoryId;
use crate::types::{Chunk, Language, ScoredChunk};
use crate::vector::ops::dot_unchecked;
use crate::vector::l2_norm;
use crate::{RagError, Result};

/// Scoring mode. With unit-norm vectors on both sides the two coincide;
/// `Dot` skips the magnitude division and is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scoring {
    #[default]
    Dot,
    Cosine,
}

/// Conjunctive equality filter over chunk metadata. Empty filter matches
/// every chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
}

impl SearchFilter {
    pub fn is_empty(&self) -> bool {
        self.category.is_none() && self.language.is_none() && self.document_id.is_none()
    }

    fn matches(&self, chunk: &Chunk) -> bool {
        if let Some(category) = self.category {
            if chunk.category != category {
                return false;
            }
        }
        if let Some(language) = self.language {
            if chunk.language != language {
                return false;
            }
        }
        if let Some(ref document_id) = self.document_id {
            if &chunk.document_id != document_id {
                return false;
            }
        }
        true
    }
}

/// Read-only store of embedded chunks with exact nearest-neighbor search.
///
/// Vectors live in one dense `N x dim` buffer for cache-friendly scans;
/// chunk records sit in a parallel array sharing the same storage order,
/// which is also the tie-break order for equal scores.
pub struct VectorStore {
    dim: usize,
    vectors: Vec<f32>,
    chunks: Vec<Chunk>,
    by_id: HashMap<String, usize>,
    by_document: HashMap<String, Vec<usize>>,
}

impl VectorStore {
    /// Builds a store from parallel chunk records and the flat vector
    /// buffer. The loader validates shapes before calling this.
    pub(crate) fn from_parts(dim: usize, chunks: Vec<Chunk>, vectors: Vec<f32>) -> Result<Self> {
        if vectors.len() != chunks.len() * dim {
            return Err(RagError::IndexCorrupt(format!(
                "vector buffer holds {} floats, expected {} ({} chunks x {} dims)",
                vectors.len(),
                chunks.len() * dim,
                chunks.len(),
                dim
            )));
        }

        let mut by_id = HashMap::with_capacity(chunks.len());
        let mut by_document: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, chunk) in chunks.iter().enumerate() {
            by_id.insert(chunk.chunk_id.clone(), i);
            by_document
                .entry(chunk.document_id.clone())
                .or_default()
                .push(i);
        }

        Ok(Self {
            dim,
            vectors,
            chunks,
            by_id,
            by_document,
        })
    }

    /// Empty store of the given dimension.
    pub fn empty(dim: usize) -> Self {
        Self {
            dim,
            vectors: Vec::new(),
            chunks: Vec::new(),
            by_id: HashMap::new(),
            by_document: HashMap::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// All chunk records in storage order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Chunk lookup by id.
    pub fn chunk_by_id(&self, chunk_id: &str) -> Option<&Chunk> {
        self.by_id.get(chunk_id).map(|&i| &self.chunks[i])
    }

    /// Embedding row for a chunk id.
    pub fn vector_by_id(&self, chunk_id: &str) -> Option<&[f32]> {
        self.by_id.get(chunk_id).map(|&i| self.row(i))
    }

    /// Chunks of one document in storage order (which is chunk order).
    pub fn chunks_for_document(&self, document_id: &str) -> Vec<&Chunk> {
        self.by_document
            .get(document_id)
            .map(|indices| indices.iter().map(|&i| &self.chunks[i]).collect())
            .unwrap_or_default()
    }

    fn row(&self, i: usize) -> &[f32] {
        &self.vectors[i * self.dim..(i + 1) * self.dim]
    }

    /// Exact top-K search.
    ///
    /// Returns at most `top_k` chunks in strictly decreasing score order;
    /// ties resolve to the earlier-stored chunk. An empty candidate set is
    /// an empty result, not an error.
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` if `top_k` is zero.
    /// * `DimensionMismatch` if the query length differs from the store's.
    pub fn search(
        &self,
        query: &[f32],
        top_k: usize,
        filter: &SearchFilter,
        scoring: Scoring,
    ) -> Result<Vec<ScoredChunk>> {
        if top_k == 0 {
            return Err(RagError::InvalidArgument(
                "top_k must be at least 1".to_string(),
            ));
        }
        if query.len() != self.dim {
            return Err(RagError::DimensionMismatch {
                expected: self.dim,
                actual: query.len(),
            });
        }

        let query_norm = l2_norm(query);

        // Bounded selection: `best` stays sorted by (score desc, storage
        // order asc), never exceeding top_k entries.
        let mut best: Vec<(f32, usize)> = Vec::with_capacity(top_k + 1);

        for (i, chunk) in self.chunks.iter().enumerate() {
            if !filter.matches(chunk) {
                continue;
            }

            let row = self.row(i);
            let score = match scoring {
                Scoring::Dot => dot_unchecked(query, row),
                Scoring::Cosine => {
                    let denom = query_norm * l2_norm(row);
                    if denom == 0.0 {
                        0.0
                    } else {
                        (dot_unchecked(query, row) / denom).clamp(-1.0, 1.0)
                    }
                }
            };

            if best.len() == top_k && score <= best[top_k - 1].0 {
                continue;
            }
            // Insert after any entry with score >= ours, so equal scores
            // keep their storage order.
            let pos = best.partition_point(|&(s, _)| s >= score);
            best.insert(pos, (score, i));
            best.truncate(top_k);
        }

        Ok(best
            .into_iter()
            .map(|(score, i)| ScoredChunk {
                chunk: self.chunks[i].clone(),
                score,
            })
            .collect())
    }
}
