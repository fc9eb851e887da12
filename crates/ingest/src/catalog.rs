//! Category catalog builder: taxonomy plus per-category document counts.

use std::path::Path;

use regula_core::artifacts::{CategoriesFile, CategoryEntry, DocumentsManifest, ARTIFACT_VERSION};
use regula_core::category::{CategoryId, CATEGORY_ORDER};

use crate::{now_iso, Result};

/// Builds `categories.json` content from the manifest. The twelve fixed
/// categories are always present; the `uncategorized` fallback is appended
/// only when something actually landed in it.
pub fn build_categories(manifest: &DocumentsManifest) -> CategoriesFile {
    let count_for = |category: CategoryId| {
        manifest
            .documents
            .iter()
            .filter(|d| d.category == category)
            .count()
    };

    let mut categories: Vec<CategoryEntry> = CATEGORY_ORDER
        .iter()
        .map(|&category| entry(category, count_for(category)))
        .collect();

    let uncategorized = count_for(CategoryId::Uncategorized);
    if uncategorized > 0 {
        categories.push(entry(CategoryId::Uncategorized, uncategorized));
    }

    CategoriesFile {
        version: ARTIFACT_VERSION.to_string(),
        generated_at: now_iso(),
        total_categories: categories.len(),
        categories,
    }
}

fn entry(category: CategoryId, document_count: usize) -> CategoryEntry {
    CategoryEntry {
        id: category.as_str().to_string(),
        name_uk: category.name_uk().to_string(),
        name_en: category.name_en().to_string(),
        icon: category.icon().to_string(),
        description_uk: category.description_uk().to_string(),
        description_en: category.description_en().to_string(),
        document_count,
    }
}

/// Writes the categories artifact.
pub fn write_categories(file: &CategoriesFile, out_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(file)?;
    crate::write_atomic(out_path, json.as_bytes())
}
