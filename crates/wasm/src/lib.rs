//! WebAssembly bindings for the Regula runtime core.
//!
//! The browser shell owns the models: it embeds queries with
//! transformers.js and runs the generator itself, passing vectors and raw
//! completions across this boundary. What lives on the Rust side is the
//! loaded read-only index, exact search, routing, prompt assembly and
//! response cleanup.
//!
//! ## Usage
//!
//! ```javascript
//! import init, { RagRuntime, init_panic_hook } from './regula_wasm.js';
//!
//! await init();
//! init_panic_hook();
//!
//! const rag = new RagRuntime();
//! rag.load(new Uint8Array(await (await fetch('embeddings.json.gz')).arrayBuffer()));
//!
//! const queryVec = await embedder.embed(question);   // JS-side model
//! const decision = rag.route(queryVec);
//! if (decision.mode === 'rag') {
//!   const hits = rag.search(queryVec, 5, null);
//!   const prompt = rag.buildGroundedPrompt(question, hits);
//!   const raw = await generator.generate(prompt);    // JS-side model
//!   const answer = rag.extractResponse(raw);
//!   const sources = rag.sourcesFor(hits);
//! }
//! ```

use wasm_bindgen::prelude::*;

use regula_core::catalog::DocumentCatalog;
use regula_core::index::store::{Scoring, SearchFilter};
use regula_core::index::VectorIndex;
use regula_core::pipeline::attribute_sources;
use regula_core::prompt::{ChatMessage, PromptBuilder};
use regula_core::router::{decide, RouterConfig};
use regula_core::traits::HeuristicTokenCounter;
use regula_core::types::{Language, ScoredChunk};
use regula_core::{index_from_bytes, CategoryId};

/// Install the panic hook for readable stack traces in the console. Call
/// once after module init.
#[wasm_bindgen]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn parse_language(language: &str) -> Language {
    if language == "uk" {
        Language::Uk
    } else {
        Language::En
    }
}

/// The runtime surface exposed to TypeScript.
#[wasm_bindgen]
pub struct RagRuntime {
    index: Option<VectorIndex>,
    prompts: PromptBuilder,
    router_config: RouterConfig,
}

impl Default for RagRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl RagRuntime {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            index: None,
            prompts: PromptBuilder::default(),
            router_config: RouterConfig::default(),
        }
    }

    /// Loads the gzip index artifact. Fatal on corruption: the caller
    /// should surface the error and stop, not retry with a broken index.
    pub fn load(&mut self, bytes: &[u8]) -> Result<(), JsValue> {
        let index = index_from_bytes(bytes).map_err(js_err)?;
        self.index = Some(index);
        Ok(())
    }

    #[wasm_bindgen(js_name = isLoaded)]
    pub fn is_loaded(&self) -> bool {
        self.index.is_some()
    }

    /// Overrides the routing thresholds.
    #[wasm_bindgen(js_name = setRouterThresholds)]
    pub fn set_router_thresholds(&mut self, high: f32, low: f32) {
        self.router_config = RouterConfig {
            high_threshold: high,
            low_threshold: low,
        };
    }

    /// Exact top-K search. `filter` is `null` or
    /// `{ category?, language?, document_id? }`. Returns an array of
    /// scored chunks.
    pub fn search(
        &self,
        query_vector: Vec<f32>,
        top_k: usize,
        filter: JsValue,
    ) -> Result<JsValue, JsValue> {
        let index = self.index()?;

        let filter: SearchFilter = if filter.is_null() || filter.is_undefined() {
            SearchFilter::default()
        } else {
            serde_wasm_bindgen::from_value(filter)
                .map_err(|e| js_err(format!("invalid filter: {}", e)))?
        };

        let results = index
            .store()
            .search(&query_vector, top_k, &filter, Scoring::Dot)
            .map_err(js_err)?;

        serde_wasm_bindgen::to_value(&results).map_err(js_err)
    }

    /// Routing decision for an already-embedded query.
    pub fn route(&self, query_vector: Vec<f32>) -> Result<JsValue, JsValue> {
        let index = self.index()?;
        let decision = decide(index, &query_vector, &self.router_config);
        serde_wasm_bindgen::to_value(&decision).map_err(js_err)
    }

    /// Grounded prompt from search results (the array `search` returned).
    #[wasm_bindgen(js_name = buildGroundedPrompt)]
    pub fn build_grounded_prompt(
        &self,
        question: &str,
        results: JsValue,
    ) -> Result<String, JsValue> {
        let results: Vec<ScoredChunk> = serde_wasm_bindgen::from_value(results)
            .map_err(|e| js_err(format!("invalid results array: {}", e)))?;
        let texts: Vec<&str> = results.iter().map(|r| r.chunk.text.as_str()).collect();
        Ok(self.prompts.build_grounded_prompt(question, &texts))
    }

    /// Free-chat prompt from `[{role, content}]` history.
    #[wasm_bindgen(js_name = buildChatPrompt)]
    pub fn build_chat_prompt(&self, history: JsValue, new_message: &str) -> Result<String, JsValue> {
        let history: Vec<ChatMessage> = if history.is_null() || history.is_undefined() {
            Vec::new()
        } else {
            serde_wasm_bindgen::from_value(history)
                .map_err(|e| js_err(format!("invalid history: {}", e)))?
        };

        self.prompts
            .build_chat_prompt(&history, new_message, &HeuristicTokenCounter)
            .map_err(js_err)
    }

    /// Cleans a raw completion.
    #[wasm_bindgen(js_name = extractResponse)]
    pub fn extract_response(&self, raw: &str) -> String {
        self.prompts.extract_response(raw)
    }

    /// Deduplicated source attributions for search results, in retrieval
    /// order.
    #[wasm_bindgen(js_name = sourcesFor)]
    pub fn sources_for(&self, results: JsValue) -> Result<JsValue, JsValue> {
        let index = self.index()?;
        let results: Vec<ScoredChunk> = serde_wasm_bindgen::from_value(results)
            .map_err(|e| js_err(format!("invalid results array: {}", e)))?;
        let sources = attribute_sources(&results, index.catalog());
        serde_wasm_bindgen::to_value(&sources).map_err(js_err)
    }

    /// Document record by id, or `null`.
    #[wasm_bindgen(js_name = documentById)]
    pub fn document_by_id(&self, document_id: &str) -> Result<JsValue, JsValue> {
        let index = self.index()?;
        match index.catalog().by_id(document_id) {
            Some(document) => serde_wasm_bindgen::to_value(document).map_err(js_err),
            None => Ok(JsValue::NULL),
        }
    }

    /// Documents of one category id, in ingestion order.
    #[wasm_bindgen(js_name = documentsByCategory)]
    pub fn documents_by_category(&self, category_id: &str) -> Result<JsValue, JsValue> {
        let index = self.index()?;
        let documents = index
            .catalog()
            .by_category(CategoryId::parse(category_id));
        serde_wasm_bindgen::to_value(&documents).map_err(js_err)
    }

    /// Case-insensitive substring search over document titles and
    /// filenames. `language` is `"uk"`, `"en"` or empty for both.
    #[wasm_bindgen(js_name = searchDocuments)]
    pub fn search_documents(&self, query: &str, language: &str) -> Result<JsValue, JsValue> {
        let index = self.index()?;
        let language = if language.is_empty() {
            None
        } else {
            Some(parse_language(language))
        };
        let documents = index.catalog().search(query, language);
        serde_wasm_bindgen::to_value(&documents).map_err(js_err)
    }

    /// Localized category label, falling back to the id.
    #[wasm_bindgen(js_name = categoryName)]
    pub fn category_name(&self, category_id: &str, language: &str) -> String {
        match &self.index {
            Some(index) => index
                .catalog()
                .category_name(category_id, parse_language(language)),
            // Static taxonomy works without a loaded index too.
            None => DocumentCatalog::new(Vec::new())
                .category_name(category_id, parse_language(language)),
        }
    }

    /// Corpus counters: chunk count, document totals, per-category and
    /// per-language breakdowns.
    pub fn stats(&self) -> Result<JsValue, JsValue> {
        let index = self.index()?;
        let catalog_stats = index.catalog().stats();
        let stats = serde_json::json!({
            "total_chunks": index.len(),
            "embedding_dim": index.dim(),
            "model": index.model(),
            "generated_at": index.generated_at(),
            "documents": catalog_stats,
        });
        serde_wasm_bindgen::to_value(&stats).map_err(js_err)
    }

    fn index(&self) -> Result<&VectorIndex, JsValue> {
        self.index
            .as_ref()
            .ok_or_else(|| JsValue::from_str("index not loaded; call load() first"))
    }
}
