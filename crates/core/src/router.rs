//! Query routing between grounded answering and free chat.
//!
//! A cheap pre-flight check: embed the query, look at the single best
//! similarity score in the index and decide whether the corpus has anything
//! to say. The router never fails -- any trouble with the embedder or the
//! store downgrades to free chat, because a chat answer beats an error
//! screen when the user just said hello.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::index::store::{Scoring, SearchFilter};
use crate::index::VectorIndex;
use crate::traits::Embedder;
use crate::types::ScoredChunk;

/// How a query will be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Answer grounded in retrieved sources.
    Rag,
    /// Free chat from the generator's own knowledge.
    General,
    /// Retrieval produced nothing usable.
    NoResults,
    /// A downstream failure was converted into a tagged result.
    Error,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Rag => "rag",
            Mode::General => "general",
            Mode::NoResults => "no_results",
            Mode::Error => "error",
        }
    }
}

/// Routing thresholds. Tunable at construction; nothing else reads them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Top score at or above this goes to grounded mode.
    pub high_threshold: f32,
    /// Top score below this is confidently off-corpus.
    pub low_threshold: f32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            high_threshold: 0.6,
            low_threshold: 0.4,
        }
    }
}

/// The routing verdict for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub mode: Mode,
    pub confidence: f32,
    pub reason: String,
    /// Top-scoring chunks, carried for diagnostics in the gray zone.
    pub top_chunks: Vec<ScoredChunk>,
}

impl RoutingDecision {
    fn general(confidence: f32, reason: impl Into<String>) -> Self {
        Self {
            mode: Mode::General,
            confidence,
            reason: reason.into(),
            top_chunks: Vec::new(),
        }
    }
}

/// Decides per query between grounded and free-chat answering.
pub struct QueryRouter {
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
    config: RouterConfig,
}

impl QueryRouter {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<VectorIndex>) -> Self {
        Self::with_config(embedder, index, RouterConfig::default())
    }

    pub fn with_config(
        embedder: Arc<dyn Embedder>,
        index: Arc<VectorIndex>,
        config: RouterConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            config,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Routes a query, optionally forced by the caller.
    pub async fn route(&self, query: &str, force: Option<Mode>) -> RoutingDecision {
        if let Some(mode) = force {
            return RoutingDecision {
                mode,
                confidence: 1.0,
                reason: "mode forced by caller".to_string(),
                top_chunks: Vec::new(),
            };
        }

        if self.index.is_empty() {
            return RoutingDecision::general(1.0, "index is empty");
        }

        let query_vector = match self.embedder.embed(query).await {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "router embedding failed, downgrading to general");
                return RoutingDecision::general(0.5, format!("embedding failed: {}", e));
            }
        };

        decide(&self.index, &query_vector, &self.config)
    }
}

/// Top-1 similarity decision, shared with callers that already hold a query
/// vector (the browser bindings embed on the JS side).
pub fn decide(index: &VectorIndex, query_vector: &[f32], config: &RouterConfig) -> RoutingDecision {
    if index.is_empty() {
        return RoutingDecision::general(1.0, "index is empty");
    }

    let results = match index
        .store()
        .search(query_vector, 1, &SearchFilter::default(), Scoring::Dot)
    {
        Ok(results) => results,
        Err(e) => {
            debug!(error = %e, "router search failed, downgrading to general");
            return RoutingDecision::general(0.5, format!("search failed: {}", e));
        }
    };

    let Some(top) = results.first() else {
        return RoutingDecision::general(1.0, "no candidates in index");
    };
    let score = top.score;

    if score >= config.high_threshold {
        RoutingDecision {
            mode: Mode::Rag,
            confidence: score,
            reason: format!("top score {:.3} at or above {:.2}", score, config.high_threshold),
            top_chunks: results,
        }
    } else if score >= config.low_threshold {
        RoutingDecision {
            mode: Mode::General,
            confidence: 1.0 - score,
            reason: format!(
                "top score {:.3} between {:.2} and {:.2}",
                score, config.low_threshold, config.high_threshold
            ),
            top_chunks: results,
        }
    } else {
        RoutingDecision::general(
            1.0,
            format!("top score {:.3} below {:.2}", score, config.low_threshold),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::ARTIFACT_VERSION;
    use crate::artifacts::EmbeddingsFile;
    use crate::category::CategoryId;
    use crate::chunker::ChunkerConfig;
    use crate::index::loader::index_from_file;
    use crate::types::{Chunk, ChunkMetadata, EmbeddedChunk, Language};
    use crate::vector::normalize;
    use crate::{RagError, Result};
    use async_trait::async_trait;

    /// Embedder returning a fixed vector, or failing on demand.
    struct FixedEmbedder {
        vector: Vec<f32>,
        fail: bool,
    }

    #[async_trait]
    impl Embedder for FixedEmbedder {
        fn dim(&self) -> usize {
            self.vector.len()
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            if self.fail {
                Err(RagError::EmbedderUnavailable("model not loaded".into()))
            } else {
                Ok(self.vector.clone())
            }
        }
    }

    fn axis_chunk(doc: &str, axis: usize) -> EmbeddedChunk {
        let mut embedding = vec![0.0_f32; 4];
        embedding[axis] = 1.0;
        EmbeddedChunk {
            chunk: Chunk {
                chunk_id: Chunk::compose_id(doc, 0),
                document_id: doc.into(),
                text: format!("text of {}", doc),
                tokens: 3,
                chunk_index: 0,
                category: CategoryId::Safety,
                language: Language::Uk,
                metadata: ChunkMetadata {
                    document_title: doc.into(),
                    document_filename: format!("{}.pdf", doc),
                    source_url: format!("https://example.edu/{}.pdf", doc),
                },
            },
            embedding,
        }
    }

    fn sample_index() -> Arc<VectorIndex> {
        let file = EmbeddingsFile {
            version: ARTIFACT_VERSION.into(),
            generated_at: "2025-09-01T10:00:00Z".into(),
            model: "test".into(),
            embedding_dim: 4,
            total_chunks: 3,
            config: ChunkerConfig::default(),
            chunks: vec![axis_chunk("a", 0), axis_chunk("b", 1), axis_chunk("c", 2)],
        };
        Arc::new(index_from_file(file).unwrap())
    }

    fn empty_index() -> Arc<VectorIndex> {
        let file = EmbeddingsFile {
            version: ARTIFACT_VERSION.into(),
            generated_at: "2025-09-01T10:00:00Z".into(),
            model: "test".into(),
            embedding_dim: 4,
            total_chunks: 0,
            config: ChunkerConfig::default(),
            chunks: vec![],
        };
        Arc::new(index_from_file(file).unwrap())
    }

    #[tokio::test]
    async fn test_high_score_routes_to_rag() {
        let router = QueryRouter::new(
            Arc::new(FixedEmbedder {
                vector: vec![1.0, 0.0, 0.0, 0.0],
                fail: false,
            }),
            sample_index(),
        );

        let decision = router.route("де знайти статут?", None).await;
        assert_eq!(decision.mode, Mode::Rag);
        assert!((decision.confidence - 1.0).abs() < 1e-6);
        assert_eq!(decision.top_chunks.len(), 1);
        assert_eq!(decision.top_chunks[0].chunk.document_id, "a");
    }

    #[tokio::test]
    async fn test_gray_zone_downgrades_with_chunks() {
        // Query at angle: top score lands at 0.55.
        let mut v = vec![0.55_f32, 0.0, 0.0, 0.0];
        let rest = (1.0_f32 - 0.55 * 0.55).sqrt();
        v[3] = rest;
        normalize(&mut v);

        let router = QueryRouter::new(
            Arc::new(FixedEmbedder { vector: v, fail: false }),
            sample_index(),
        );

        let decision = router.route("misc question", None).await;
        assert_eq!(decision.mode, Mode::General);
        assert!((decision.confidence - 0.45).abs() < 1e-2);
        assert!(!decision.top_chunks.is_empty());
    }

    #[tokio::test]
    async fn test_low_score_is_confident_general() {
        let mut v = vec![0.1_f32, 0.0, 0.0, 0.0];
        v[3] = (1.0_f32 - 0.01).sqrt();
        normalize(&mut v);

        let router = QueryRouter::new(
            Arc::new(FixedEmbedder { vector: v, fail: false }),
            sample_index(),
        );

        let decision = router.route("what is the weather", None).await;
        assert_eq!(decision.mode, Mode::General);
        assert!((decision.confidence - 1.0).abs() < 1e-6);
        assert!(decision.top_chunks.is_empty());
    }

    #[tokio::test]
    async fn test_forced_mode_short_circuits() {
        let router = QueryRouter::new(
            Arc::new(FixedEmbedder {
                vector: vec![1.0, 0.0, 0.0, 0.0],
                fail: true, // embedder would fail, but must not be called
            }),
            sample_index(),
        );

        let decision = router.route("anything", Some(Mode::Rag)).await;
        assert_eq!(decision.mode, Mode::Rag);
        assert!((decision.confidence - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_empty_index_always_general() {
        let router = QueryRouter::new(
            Arc::new(FixedEmbedder {
                vector: vec![1.0, 0.0, 0.0, 0.0],
                fail: false,
            }),
            empty_index(),
        );

        let decision = router.route("anything", None).await;
        assert_eq!(decision.mode, Mode::General);
        assert!((decision.confidence - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_embedder_failure_downgrades_to_general() {
        let router = QueryRouter::new(
            Arc::new(FixedEmbedder {
                vector: vec![1.0, 0.0, 0.0, 0.0],
                fail: true,
            }),
            sample_index(),
        );

        let decision = router.route("anything", None).await;
        assert_eq!(decision.mode, Mode::General);
        assert!((decision.confidence - 0.5).abs() < 1e-6);
        assert!(decision.reason.contains("embedding failed"));
    }

    #[tokio::test]
    async fn test_custom_thresholds() {
        let config = RouterConfig {
            high_threshold: 0.95,
            low_threshold: 0.9,
        };
        let router = QueryRouter::with_config(
            Arc::new(FixedEmbedder {
                vector: vec![1.0, 0.0, 0.0, 0.0],
                fail: false,
            }),
            sample_index(),
            config,
        );

        let decision = router.route("exact hit", None).await;
        assert_eq!(decision.mode, Mode::Rag);
    }

    #[test]
    fn test_decide_rejects_bad_vector_gracefully() {
        let index = sample_index();
        let decision = decide(&index, &[1.0, 0.0], &RouterConfig::default());
        assert_eq!(decision.mode, Mode::General);
        assert!((decision.confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_mode_serialization() {
        assert_eq!(serde_json::to_string(&Mode::NoResults).unwrap(), "\"no_results\"");
        assert_eq!(Mode::Rag.as_str(), "rag");
    }
}
