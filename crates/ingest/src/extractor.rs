//! Text extraction from downloaded payloads.
//!
//! PDF pages go through `lopdf` page by page; DOCX payloads are unzipped
//! and `word/document.xml` is streamed through `quick-xml`. Both paths end
//! in the same whitespace normalization so chunking sees uniform text
//! regardless of the source format. Legacy `.doc` binaries are not parsed;
//! they fail extraction and are recorded as such.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;
use tracing::{info, warn};

use regula_core::types::{DocKind, Document};
use regula_core::artifacts::DocumentsManifest;

use crate::{IngestError, Result};

/// Outcome of extracting one document.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedFile {
    pub document_id: String,
    pub path: PathBuf,
    pub words: usize,
    pub chars: usize,
}

/// Extraction pass summary.
#[derive(Debug, Default, Serialize)]
pub struct ExtractionReport {
    pub extracted: usize,
    pub failed: usize,
    pub files: Vec<ExtractedFile>,
}

/// Extracts text from one payload, dispatching on the recorded kind.
pub fn extract_document(document: &Document, payload_path: &Path) -> Result<String> {
    let raw = match document.kind {
        DocKind::Pdf => extract_pdf(payload_path)?,
        DocKind::Docx => extract_docx(payload_path)?,
        // Legacy .doc is OLE2, not zip; try the docx path so mislabeled
        // payloads still extract, and let real .doc files fail cleanly.
        DocKind::Doc => extract_docx(payload_path)?,
        DocKind::Unknown => {
            return Err(IngestError::ExtractionFailed {
                path: payload_path.display().to_string(),
                reason: "unknown payload format".to_string(),
            })
        }
    };

    let text = normalize_text(&raw);
    if text.is_empty() {
        return Err(IngestError::ExtractionFailed {
            path: payload_path.display().to_string(),
            reason: "no extractable text".to_string(),
        });
    }
    Ok(text)
}

/// PDF extraction: pages in order, each page's text items joined with
/// single spaces, each page terminated with a blank line.
fn extract_pdf(path: &Path) -> Result<String> {
    let document = lopdf::Document::load(path).map_err(|e| IngestError::ExtractionFailed {
        path: path.display().to_string(),
        reason: format!("pdf parse failed: {}", e),
    })?;

    let mut out = String::new();
    for (&page_number, _) in document.get_pages().iter() {
        // A single unreadable page should not sink the document.
        let page_text = match document.extract_text(&[page_number]) {
            Ok(text) => text,
            Err(e) => {
                warn!(page = page_number, error = %e, "page extraction failed");
                continue;
            }
        };
        let joined = page_text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !joined.is_empty() {
            out.push_str(&joined);
            out.push_str("\n\n");
        }
    }
    Ok(out)
}

/// DOCX extraction: read `word/document.xml` from the zip container and
/// collect text nodes, turning paragraph ends into newlines.
fn extract_docx(path: &Path) -> Result<String> {
    let file = fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| IngestError::ExtractionFailed {
        path: path.display().to_string(),
        reason: format!("not a zip container: {}", e),
    })?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| IngestError::ExtractionFailed {
            path: path.display().to_string(),
            reason: format!("word/document.xml missing: {}", e),
        })?
        .read_to_string(&mut xml)?;

    let mut reader = Reader::from_str(&xml);
    let mut out = String::new();
    loop {
        match reader.read_event() {
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|e| IngestError::ExtractionFailed {
                    path: path.display().to_string(),
                    reason: format!("xml entity error: {}", e),
                })?;
                out.push_str(&text);
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"w:p" => out.push('\n'),
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(IngestError::ExtractionFailed {
                    path: path.display().to_string(),
                    reason: format!("xml parse error: {}", e),
                })
            }
            _ => {}
        }
    }
    Ok(out)
}

/// Uniform whitespace normalization: per line, collapse whitespace runs to
/// single spaces and trim; then collapse runs of three or more newlines to
/// exactly two; then trim the whole text.
pub fn normalize_text(raw: &str) -> String {
    let per_line = raw
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n");

    let mut out = String::with_capacity(per_line.len());
    let mut newline_run = 0usize;
    for c in per_line.chars() {
        if c == '\n' {
            newline_run += 1;
            if newline_run <= 2 {
                out.push('\n');
            }
        } else {
            newline_run = 0;
            out.push(c);
        }
    }

    out.trim().to_string()
}

/// Extracts every downloaded document in the manifest, writing UTF-8 text
/// files under `{text_root}/{category}/{basename}.txt`.
pub fn run_extraction(
    manifest: &DocumentsManifest,
    payload_root: &Path,
    text_root: &Path,
) -> Result<ExtractionReport> {
    let mut report = ExtractionReport::default();

    for document in manifest.documents.iter().filter(|d| d.downloaded) {
        let payload_path = payload_root.join(&document.filepath);
        match extract_document(document, &payload_path) {
            Ok(text) => {
                let basename = document
                    .filename
                    .rsplit_once('.')
                    .map(|(stem, _)| stem)
                    .unwrap_or(&document.filename);
                let out_path = text_root
                    .join(document.category.as_str())
                    .join(format!("{}.txt", basename));
                crate::write_atomic(&out_path, text.as_bytes())?;

                report.extracted += 1;
                report.files.push(ExtractedFile {
                    document_id: document.id.clone(),
                    path: out_path,
                    words: text.split_whitespace().count(),
                    chars: text.chars().count(),
                });
            }
            Err(e) => {
                warn!(document = %document.title, error = %e, "extraction failed");
                report.failed += 1;
            }
        }
    }

    info!(
        extracted = report.extracted,
        failed = report.failed,
        "extraction pass complete"
    );
    Ok(report)
}

/// Text file path for a document, mirroring [`run_extraction`]'s layout.
pub fn text_path_for(document: &Document, text_root: &Path) -> PathBuf {
    let basename = document
        .filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(&document.filename);
    text_root
        .join(document.category.as_str())
        .join(format!("{}.txt", basename))
}
