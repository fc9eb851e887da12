//! Constant-time document lookup.
//!
//! The runtime never ships `documents.json`; the catalog is reconstructed
//! from the metadata copy each chunk carries, in index storage order, which
//! preserves the ingestion insertion order.

use std::collections::HashMap;

use serde::Serialize;

use crate::category::CategoryId;
use crate::types::{Chunk, DocKind, Document, Language};

/// Immutable lookup structure over the corpus documents.
pub struct DocumentCatalog {
    documents: Vec<Document>,
    by_id: HashMap<String, usize>,
    by_category: HashMap<CategoryId, Vec<usize>>,
}

/// Corpus counters for the UI layer.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogStats {
    pub total_documents: usize,
    pub uk_documents: usize,
    pub en_documents: usize,
    pub by_category: HashMap<String, usize>,
}

impl DocumentCatalog {
    /// Builds a catalog from full document records, preserving order.
    pub fn new(documents: Vec<Document>) -> Self {
        let mut by_id = HashMap::with_capacity(documents.len());
        let mut by_category: HashMap<CategoryId, Vec<usize>> = HashMap::new();

        for (i, document) in documents.iter().enumerate() {
            by_id.entry(document.id.clone()).or_insert(i);
            by_category.entry(document.category).or_default().push(i);
        }

        Self {
            documents,
            by_id,
            by_category,
        }
    }

    /// Reconstructs document records from chunk metadata: the first chunk
    /// of each document (in storage order) contributes its record.
    pub fn from_chunks(chunks: &[Chunk]) -> Self {
        let mut documents = Vec::new();
        let mut seen: HashMap<&str, ()> = HashMap::new();

        for chunk in chunks {
            if seen.insert(chunk.document_id.as_str(), ()).is_some() {
                continue;
            }
            let filename = &chunk.metadata.document_filename;
            let kind = filename
                .rsplit_once('.')
                .map(|(_, ext)| DocKind::from_extension(ext))
                .unwrap_or(DocKind::Unknown);

            documents.push(Document {
                id: chunk.document_id.clone(),
                title: chunk.metadata.document_title.clone(),
                filename: filename.clone(),
                filepath: format!("{}/{}", chunk.category.as_str(), filename),
                source_url: chunk.metadata.source_url.clone(),
                category: chunk.category,
                language: chunk.language,
                kind,
                downloaded: true,
                download_error: None,
                download_date: None,
            });
        }

        Self::new(documents)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// All documents in ingestion order.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn by_id(&self, document_id: &str) -> Option<&Document> {
        self.by_id.get(document_id).map(|&i| &self.documents[i])
    }

    /// Documents of one category, in ingestion order.
    pub fn by_category(&self, category: CategoryId) -> Vec<&Document> {
        self.by_category
            .get(&category)
            .map(|indices| indices.iter().map(|&i| &self.documents[i]).collect())
            .unwrap_or_default()
    }

    /// Localized category label; unknown ids come back verbatim so the UI
    /// always has something to display.
    pub fn category_name(&self, category_id: &str, language: Language) -> String {
        if category_id == CategoryId::Uncategorized.as_str() {
            return CategoryId::Uncategorized.name(language).to_string();
        }
        let parsed = CategoryId::parse(category_id);
        if parsed == CategoryId::Uncategorized {
            category_id.to_string()
        } else {
            parsed.name(language).to_string()
        }
    }

    /// Case-insensitive substring search over titles and filenames.
    pub fn search(&self, query: &str, language: Option<Language>) -> Vec<&Document> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        self.documents
            .iter()
            .filter(|doc| language.map_or(true, |l| doc.language == l))
            .filter(|doc| {
                doc.title.to_lowercase().contains(&needle)
                    || doc.filename.to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn stats(&self) -> CatalogStats {
        let mut by_category: HashMap<String, usize> = HashMap::new();
        let mut uk = 0;
        let mut en = 0;

        for document in &self.documents {
            *by_category
                .entry(document.category.as_str().to_string())
                .or_insert(0) += 1;
            match document.language {
                Language::Uk => uk += 1,
                Language::En => en += 1,
            }
        }

        CatalogStats {
            total_documents: self.documents.len(),
            uk_documents: uk,
            en_documents: en,
            by_category,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkMetadata;

    fn document(id: &str, title: &str, category: CategoryId, language: Language) -> Document {
        Document {
            id: id.into(),
            title: title.into(),
            filename: format!("{}.pdf", id),
            filepath: format!("{}/{}.pdf", category.as_str(), id),
            source_url: format!("https://example.edu/{}.pdf", id),
            category,
            language,
            kind: DocKind::Pdf,
            downloaded: true,
            download_error: None,
            download_date: None,
        }
    }

    fn sample_catalog() -> DocumentCatalog {
        DocumentCatalog::new(vec![
            document("d1", "Статут університету", CategoryId::GeneralOperations, Language::Uk),
            document("d2", "Dormitory rules", CategoryId::Dormitories, Language::En),
            document("d3", "Правила гуртожитку", CategoryId::Dormitories, Language::Uk),
        ])
    }

    #[test]
    fn test_by_id() {
        let catalog = sample_catalog();
        assert_eq!(catalog.by_id("d2").unwrap().title, "Dormitory rules");
        assert!(catalog.by_id("missing").is_none());
    }

    #[test]
    fn test_by_category_preserves_order() {
        let catalog = sample_catalog();
        let dorm = catalog.by_category(CategoryId::Dormitories);
        assert_eq!(dorm.len(), 2);
        assert_eq!(dorm[0].id, "d2");
        assert_eq!(dorm[1].id, "d3");
        assert!(catalog.by_category(CategoryId::Safety).is_empty());
    }

    #[test]
    fn test_category_name_localized_and_fallback() {
        let catalog = sample_catalog();
        assert_eq!(catalog.category_name("dormitories", Language::En), "Dormitories");
        assert_eq!(catalog.category_name("dormitories", Language::Uk), "Гуртожитки");
        assert_eq!(
            catalog.category_name("uncategorized", Language::En),
            "Uncategorized"
        );
        // Unknown ids come back verbatim.
        assert_eq!(catalog.category_name("mystery", Language::En), "mystery");
    }

    #[test]
    fn test_search_case_insensitive() {
        let catalog = sample_catalog();
        let hits = catalog.search("DORMITORY", None);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "d2");

        // Cyrillic lowercasing works too.
        let hits = catalog.search("ГУРТОЖИТКУ", None);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "d3");
    }

    #[test]
    fn test_search_matches_filename() {
        let catalog = sample_catalog();
        let hits = catalog.search("d3.pdf", None);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_search_language_filter() {
        let catalog = sample_catalog();
        let hits = catalog.search("rules", Some(Language::Uk));
        assert!(hits.is_empty());
        let hits = catalog.search("rules", Some(Language::En));
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_search_empty_query() {
        let catalog = sample_catalog();
        assert!(catalog.search("   ", None).is_empty());
    }

    #[test]
    fn test_stats() {
        let catalog = sample_catalog();
        let stats = catalog.stats();
        assert_eq!(stats.total_documents, 3);
        assert_eq!(stats.uk_documents, 2);
        assert_eq!(stats.en_documents, 1);
        assert_eq!(stats.by_category["dormitories"], 2);
        assert_eq!(stats.by_category["general_operations"], 1);
    }

    #[test]
    fn test_from_chunks_dedups_documents() {
        let meta = ChunkMetadata {
            document_title: "Safety manual".into(),
            document_filename: "manual.docx".into(),
            source_url: "https://example.edu/manual.docx".into(),
        };
        let mut chunks = Vec::new();
        for i in 0..3 {
            chunks.push(Chunk {
                chunk_id: Chunk::compose_id("s1", i),
                document_id: "s1".into(),
                text: format!("part {}", i),
                tokens: 3,
                chunk_index: i,
                category: CategoryId::Safety,
                language: Language::En,
                metadata: meta.clone(),
            });
        }

        let catalog = DocumentCatalog::from_chunks(&chunks);
        assert_eq!(catalog.len(), 1);
        let doc = catalog.by_id("s1").unwrap();
        assert_eq!(doc.kind, DocKind::Docx);
        assert_eq!(doc.filepath, "safety/manual.docx");
        assert_eq!(doc.title, "Safety manual");
    }
}
