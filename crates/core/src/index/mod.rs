//! The runtime vector index.
//!
//! [`VectorStore`] answers exact top-K similarity queries over a dense
//! row-major buffer; [`loader`] builds it from the gzip index artifact and
//! derives the [`DocumentCatalog`] from chunk metadata. The index is a
//! read-only value: it is constructed once at startup, shared freely, and
//! has no mutation path.

pub mod loader;
pub mod store;

use crate::catalog::DocumentCatalog;
use crate::index::store::VectorStore;

/// Everything the runtime holds about the corpus: the searchable vectors
/// and the document catalog reconstructed from them.
pub struct VectorIndex {
    store: VectorStore,
    catalog: DocumentCatalog,
    model: String,
    generated_at: String,
}

impl VectorIndex {
    pub(crate) fn new(
        store: VectorStore,
        catalog: DocumentCatalog,
        model: String,
        generated_at: String,
    ) -> Self {
        Self {
            store,
            catalog,
            model,
            generated_at,
        }
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    pub fn catalog(&self) -> &DocumentCatalog {
        &self.catalog
    }

    /// Identifier of the embedding model the artifact was produced with.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn generated_at(&self) -> &str {
        &self.generated_at
    }

    pub fn dim(&self) -> usize {
        self.store.dim()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
