//! Regula - Offline ingestion pipeline
//!
//! Turns an index page of regulatory documents into the artifact set the
//! runtime consumes: `documents.json`, `chunks.json`,
//! `embeddings.json(.gz)` and `categories.json`. The pipeline is
//! loss-tolerant end to end: a document that fails to download or extract
//! is recorded in the manifest and the batch moves on.

pub mod catalog;
pub mod chunking;
pub mod embed;
pub mod extractor;
pub mod fetcher;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

/// Error types for the offline pipeline
#[derive(Debug, Error)]
pub enum IngestError {
    /// A share-host URL whose shape none of the known patterns match.
    /// Reported, never guessed around.
    #[error("Unknown share link: {0}")]
    UnknownShareLink(String),

    #[error("Download failed for {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("Extraction failed for {path}: {reason}")]
    ExtractionFailed { path: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] regula_core::RagError),
}

/// Current UTC time as an ISO-8601 string for `generated_at` stamps.
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Atomic file write: temp file in the same directory, then rename. A
/// crash mid-write leaves the previous artifact intact.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        IngestError::Io(e)
    })?;
    Ok(())
}
