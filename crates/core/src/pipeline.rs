//! End-to-end RAG orchestration.
//!
//! One grounded query: embed, retrieve, build the grounded prompt, call the
//! generator, clean the completion, attribute sources. The pipeline
//! boundary never throws -- every failure path collapses into a tagged
//! [`RagResult`] with a bilingual notice, so the UI layer can always render
//! something without inspecting error internals. This is deliberately
//! different from the router, which downgrades errors to free chat instead.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::DocumentCatalog;
use crate::index::store::{Scoring, SearchFilter};
use crate::index::VectorIndex;
use crate::prompt::PromptBuilder;
use crate::router::Mode;
use crate::traits::{Clock, Embedder, GenerationConfig, Generator};
use crate::types::{Document, ScoredChunk};
use crate::Result;

/// Answer shown when retrieval finds nothing.
const NO_RESULTS_ANSWER: &str = "На жаль, у базі документів не знайдено релевантної інформації \
за вашим запитом. / Unfortunately, no relevant documents were found for your query.";

/// Answer shown when a downstream component fails.
const ERROR_ANSWER: &str = "Сталася помилка під час обробки запиту. Спробуйте ще раз. / \
An error occurred while processing your request. Please try again.";

/// Default number of chunks retrieved per query.
const DEFAULT_TOP_K: usize = 5;

/// A deduplicated source document attribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    pub document_id: String,
    pub title: String,
    pub filename: String,
    pub source_url: String,
    pub category: String,
    pub language: String,
    /// Score of the best-ranked chunk that cited this document.
    pub score: f32,
}

/// Timing breakdown of one query, in milliseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagTimings {
    pub embed_ms: f64,
    pub retrieve_ms: f64,
    pub generate_ms: f64,
    pub total_ms: f64,
}

/// Per-query counters alongside the timings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagMetadata {
    pub timings: RagTimings,
    pub chunk_count: usize,
    pub source_count: usize,
    pub avg_similarity: f32,
}

/// The complete outcome of one grounded query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagResult {
    pub mode: Mode,
    pub answer: String,
    pub retrieved: Vec<ScoredChunk>,
    pub sources: Vec<SourceRef>,
    pub metadata: RagMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Options for [`RagPipeline::answer`].
#[derive(Debug, Clone)]
pub struct AnswerOptions {
    pub top_k: usize,
    pub filter: SearchFilter,
    pub generation: GenerationConfig,
}

impl Default for AnswerOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            filter: SearchFilter::default(),
            generation: GenerationConfig::default(),
        }
    }
}

/// Retrieval-only result of [`RagPipeline::semantic_search`].
#[derive(Debug, Clone, Serialize)]
pub struct SemanticSearchResult {
    pub chunks: Vec<ScoredChunk>,
    pub documents: Vec<Document>,
}

/// Orchestrates embed, retrieve, generate and attribute for one query.
pub struct RagPipeline {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    index: Arc<VectorIndex>,
    clock: Arc<dyn Clock>,
    prompts: PromptBuilder,
}

impl RagPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        index: Arc<VectorIndex>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            embedder,
            generator,
            index,
            clock,
            prompts: PromptBuilder::default(),
        }
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Answers one grounded query. Never returns an error: failures come
    /// back as `mode = error` results.
    pub async fn answer(&self, query: &str, options: &AnswerOptions) -> RagResult {
        let started = self.clock.now_ms();
        let mut timings = RagTimings::default();

        let query_vector = match self.embedder.embed(query).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "query embedding failed");
                return self.error_result(e.to_string(), timings, started);
            }
        };
        timings.embed_ms = self.clock.now_ms() - started;

        let retrieve_started = self.clock.now_ms();
        let retrieved = match self.index.store().search(
            &query_vector,
            options.top_k,
            &options.filter,
            Scoring::Dot,
        ) {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "retrieval failed");
                return self.error_result(e.to_string(), timings, started);
            }
        };
        timings.retrieve_ms = self.clock.now_ms() - retrieve_started;

        if retrieved.is_empty() {
            timings.total_ms = self.clock.now_ms() - started;
            debug!(query_len = query.len(), "no chunks retrieved");
            return RagResult {
                mode: Mode::NoResults,
                answer: NO_RESULTS_ANSWER.to_string(),
                retrieved: Vec::new(),
                sources: Vec::new(),
                metadata: RagMetadata {
                    timings,
                    ..Default::default()
                },
                error: None,
            };
        }

        let source_texts: Vec<&str> = retrieved.iter().map(|r| r.chunk.text.as_str()).collect();
        let prompt = self.prompts.build_grounded_prompt(query, &source_texts);

        let generate_started = self.clock.now_ms();
        let raw = match self.generator.generate(&prompt, &options.generation).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "generation failed");
                return self.error_result(e.to_string(), timings, started);
            }
        };
        timings.generate_ms = self.clock.now_ms() - generate_started;

        let answer = self.prompts.extract_response(&raw);
        let sources = attribute_sources(&retrieved, self.index.catalog());

        let avg_similarity =
            retrieved.iter().map(|r| r.score).sum::<f32>() / retrieved.len() as f32;
        timings.total_ms = self.clock.now_ms() - started;

        RagResult {
            mode: Mode::Rag,
            answer,
            metadata: RagMetadata {
                chunk_count: retrieved.len(),
                source_count: sources.len(),
                avg_similarity,
                timings,
            },
            retrieved,
            sources,
            error: None,
        }
    }

    /// Embed + retrieve without generation.
    pub async fn semantic_search(
        &self,
        query: &str,
        top_k: usize,
        filter: &SearchFilter,
    ) -> Result<SemanticSearchResult> {
        let query_vector = self.embedder.embed(query).await?;
        let chunks = self
            .index
            .store()
            .search(&query_vector, top_k, filter, Scoring::Dot)?;

        let documents = dedup_documents(&chunks, self.index.catalog());
        Ok(SemanticSearchResult { chunks, documents })
    }

    /// Documents similar to the given one, using its first chunk's vector
    /// as a stand-in query. Returns at most `top_k` distinct documents,
    /// excluding the source, in first-occurrence order.
    pub fn find_similar_documents(&self, document_id: &str, top_k: usize) -> Result<Vec<Document>> {
        if top_k == 0 {
            return Err(crate::RagError::InvalidArgument(
                "top_k must be at least 1".to_string(),
            ));
        }
        let store = self.index.store();
        let chunks = store.chunks_for_document(document_id);
        let Some(first) = chunks.first() else {
            return Ok(Vec::new());
        };
        let Some(query_vector) = store.vector_by_id(&first.chunk_id) else {
            return Ok(Vec::new());
        };
        let query_vector = query_vector.to_vec();

        // Over-fetch: several chunks of the same document may dominate the
        // neighborhood.
        let results = store.search(
            &query_vector,
            top_k * 3,
            &SearchFilter::default(),
            Scoring::Dot,
        )?;

        let mut documents = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for result in &results {
            if result.chunk.document_id == document_id {
                continue;
            }
            if !seen.insert(result.chunk.document_id.clone()) {
                continue;
            }
            if let Some(doc) = self.index.catalog().by_id(&result.chunk.document_id) {
                documents.push(doc.clone());
            }
            if documents.len() == top_k {
                break;
            }
        }

        Ok(documents)
    }

    fn error_result(&self, error: String, mut timings: RagTimings, started: f64) -> RagResult {
        timings.total_ms = self.clock.now_ms() - started;
        RagResult {
            mode: Mode::Error,
            answer: ERROR_ANSWER.to_string(),
            retrieved: Vec::new(),
            sources: Vec::new(),
            metadata: RagMetadata {
                timings,
                ..Default::default()
            },
            error: Some(error),
        }
    }
}

/// First occurrence of each document in retrieval order, enriched from the
/// catalog. Public because the browser bindings attribute sources for
/// results whose generation happened on the JS side.
pub fn attribute_sources(retrieved: &[ScoredChunk], catalog: &DocumentCatalog) -> Vec<SourceRef> {
    let mut sources = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for result in retrieved {
        if !seen.insert(result.chunk.document_id.as_str()) {
            continue;
        }

        let source = match catalog.by_id(&result.chunk.document_id) {
            Some(doc) => SourceRef {
                document_id: doc.id.clone(),
                title: doc.title.clone(),
                filename: doc.filename.clone(),
                source_url: doc.source_url.clone(),
                category: doc.category.as_str().to_string(),
                language: doc.language.as_str().to_string(),
                score: result.score,
            },
            // Catalog and chunks come from the same artifact, but fall
            // back to the chunk's metadata copy rather than dropping the
            // attribution.
            None => SourceRef {
                document_id: result.chunk.document_id.clone(),
                title: result.chunk.metadata.document_title.clone(),
                filename: result.chunk.metadata.document_filename.clone(),
                source_url: result.chunk.metadata.source_url.clone(),
                category: result.chunk.category.as_str().to_string(),
                language: result.chunk.language.as_str().to_string(),
                score: result.score,
            },
        };
        sources.push(source);
    }

    sources
}

fn dedup_documents(chunks: &[ScoredChunk], catalog: &DocumentCatalog) -> Vec<Document> {
    let mut documents = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for result in chunks {
        if seen.insert(result.chunk.document_id.as_str()) {
            if let Some(doc) = catalog.by_id(&result.chunk.document_id) {
                documents.push(doc.clone());
            }
        }
    }
    documents
}
