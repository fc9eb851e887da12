//! Document discovery and download.
//!
//! Walks the university's document index page, assigns every recognized
//! link to the heading-delimited category it appears under, resolves
//! drive-style share links to direct downloads and fetches payloads one by
//! one with a politeness delay. Everything observed ends up in the
//! provenance manifest, including failures.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Url;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use regula_core::artifacts::{CategoryCount, DocumentsManifest, ARTIFACT_VERSION};
use regula_core::category::{CategoryId, CATEGORY_ORDER};
use regula_core::types::{DocKind, Document, Language};

use crate::{now_iso, IngestError, Result};

/// Inter-request delay; the host is a shared university server.
const REQUEST_DELAY: Duration = Duration::from_secs(1);

/// Maximum sanitized filename length in characters.
const MAX_FILENAME_CHARS: usize = 200;

fn heading_or_anchor() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<h[23][^>]*>(.*?)</h[23]>|<a[^>]+href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#)
            .expect("static pattern compiles")
    })
}

fn tag_stripper() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("static pattern compiles"))
}

/// How a discovered link will be downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkKind {
    /// URL with a document extension; downloadable as-is.
    Direct(DocKind),
    /// Drive-style share link; must be rewritten first.
    Share,
}

/// One document link found on the index page.
#[derive(Debug, Clone)]
pub struct DiscoveredDocument {
    pub title: String,
    pub source_url: String,
    pub category: CategoryId,
    pub kind: LinkKind,
}

/// Classifies a URL: document link, share link, or neither.
pub fn classify_link(url: &str) -> Option<LinkKind> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    if let Some((_, ext)) = path.rsplit_once('.') {
        let kind = DocKind::from_extension(ext);
        if kind != DocKind::Unknown {
            return Some(LinkKind::Direct(kind));
        }
    }
    if url.contains("drive.google.com") || url.contains("docs.google.com") {
        return Some(LinkKind::Share);
    }
    None
}

/// Rewrites a share link to its direct-download form.
///
/// Recognized shapes: `drive.google.com/file/d/{id}`, `open?id={id}` and
/// `docs.google.com/forms/d/{id}`. Anything else is an
/// [`IngestError::UnknownShareLink`] -- unknown shapes are reported, not
/// guessed at.
pub fn resolve_share_link(url: &str) -> Result<String> {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        [
            Regex::new(r"drive\.google\.com/file/d/([A-Za-z0-9_-]+)").expect("static pattern compiles"),
            Regex::new(r"open\?id=([A-Za-z0-9_-]+)").expect("static pattern compiles"),
            Regex::new(r"docs\.google\.com/forms/d/([A-Za-z0-9_-]+)").expect("static pattern compiles"),
        ]
    });

    for pattern in patterns {
        if let Some(captures) = pattern.captures(url) {
            let id = &captures[1];
            return Ok(format!(
                "https://drive.google.com/uc?export=download&id={}",
                id
            ));
        }
    }
    Err(IngestError::UnknownShareLink(url.to_string()))
}

/// Replaces filesystem-unsafe characters, collapses whitespace and caps
/// the length.
pub fn sanitize_filename(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            // Whitespace-class control characters fall through to the
            // collapse below; the rest become underscores.
            c if c.is_control() && !c.is_whitespace() => '_',
            c => c,
        })
        .collect();

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(MAX_FILENAME_CHARS).collect::<String>().trim().to_string()
}

/// Stable document id: first 16 hex chars of SHA-256 over the source URL.
pub fn document_id(source_url: &str) -> String {
    let digest = Sha256::digest(source_url.as_bytes());
    digest.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}

/// Guesses the payload format from its leading bytes. Share-link payloads
/// carry no extension, and assuming PDF would mislabel office documents.
pub fn sniff_kind(bytes: &[u8]) -> DocKind {
    if bytes.starts_with(b"%PDF") {
        DocKind::Pdf
    } else if bytes.starts_with(b"PK") {
        DocKind::Docx
    } else {
        DocKind::Unknown
    }
}

fn clean_fragment(fragment: &str) -> String {
    let stripped = tag_stripper().replace_all(fragment, " ");
    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Walks the index HTML in document order. Each H2/H3 heading advances the
/// category cursor through the fixed twelve-category list; anchors inherit
/// the current category. Returns the documents and the heading count so
/// the caller can flag a taxonomy drift.
pub fn discover_documents(html: &str, base: &Url) -> (Vec<DiscoveredDocument>, usize) {
    let mut documents = Vec::new();
    let mut headings_seen = 0usize;

    for captures in heading_or_anchor().captures_iter(html) {
        if captures.get(1).is_some() {
            headings_seen += 1;
            continue;
        }

        let (Some(href), Some(text)) = (captures.get(2), captures.get(3)) else {
            continue;
        };

        let Ok(url) = base.join(href.as_str()) else {
            continue;
        };
        let url = url.to_string();

        let Some(kind) = classify_link(&url) else {
            continue;
        };

        let title = clean_fragment(text.as_str());
        if title.is_empty() {
            continue;
        }

        let category = if headings_seen == 0 {
            CategoryId::Uncategorized
        } else {
            CATEGORY_ORDER[(headings_seen - 1) % CATEGORY_ORDER.len()]
        };

        documents.push(DiscoveredDocument {
            title,
            source_url: url,
            category,
            kind,
        });
    }

    (documents, headings_seen)
}

/// Fetcher configuration.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub index_url: String,
    /// Root directory for downloaded payloads.
    pub root: PathBuf,
    /// Inter-request delay; tests shrink it.
    pub delay: Duration,
}

impl FetchConfig {
    pub fn new(index_url: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            index_url: index_url.into(),
            root: root.into(),
            delay: REQUEST_DELAY,
        }
    }
}

/// Downloads the corpus and produces the documents manifest.
pub struct Fetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("regula-ingest/0.1")
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self { client, config })
    }

    /// Discovers, downloads and records every document on the index page.
    pub async fn run(&self) -> Result<DocumentsManifest> {
        let base = Url::parse(&self.config.index_url).map_err(|e| IngestError::DownloadFailed {
            url: self.config.index_url.clone(),
            reason: format!("invalid index URL: {}", e),
        })?;

        let html = self
            .client
            .get(base.clone())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let (discovered, headings) = discover_documents(&html, &base);
        if headings != CATEGORY_ORDER.len() {
            warn!(
                headings,
                expected = CATEGORY_ORDER.len(),
                "index page heading count drifted from the taxonomy"
            );
        }
        info!(documents = discovered.len(), headings, "index page parsed");

        let mut documents = Vec::with_capacity(discovered.len());
        for (i, entry) in discovered.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.delay).await;
            }
            documents.push(self.fetch_one(entry).await);
        }

        let downloaded = documents.iter().filter(|d| d.downloaded).count();
        let failed = documents.len() - downloaded;

        let mut categories: Vec<CategoryCount> = CATEGORY_ORDER
            .iter()
            .map(|&c| CategoryCount {
                id: c.as_str().to_string(),
                document_count: documents.iter().filter(|d| d.category == c).count(),
            })
            .collect();
        let uncategorized = documents
            .iter()
            .filter(|d| d.category == CategoryId::Uncategorized)
            .count();
        if uncategorized > 0 {
            categories.push(CategoryCount {
                id: CategoryId::Uncategorized.as_str().to_string(),
                document_count: uncategorized,
            });
        }

        Ok(DocumentsManifest {
            version: ARTIFACT_VERSION.to_string(),
            generated_at: now_iso(),
            source_url: self.config.index_url.clone(),
            total_documents: documents.len(),
            downloaded,
            failed,
            categories,
            documents,
        })
    }

    /// Downloads one document; failures are folded into the record.
    async fn fetch_one(&self, entry: &DiscoveredDocument) -> Document {
        let id = document_id(&entry.source_url);
        let safe_title = sanitize_filename(&entry.title);
        let language = Language::detect(&entry.title);
        let category_dir = self.config.root.join(entry.category.as_str());

        // Idempotence: an existing payload under any known extension means
        // a prior run already fetched this document.
        if let Some((kind, path)) = find_existing(&category_dir, &safe_title) {
            return self.record(entry, id, safe_title, language, kind, &path, true, None);
        }

        let resolved = match &entry.kind {
            LinkKind::Direct(_) => Ok(entry.source_url.clone()),
            LinkKind::Share => resolve_share_link(&entry.source_url),
        };

        let download_url = match resolved {
            Ok(url) => url,
            Err(e) => {
                warn!(url = %entry.source_url, error = %e, "share link not resolvable");
                let path = category_dir.join(format!("{}.bin", safe_title));
                return self.record(
                    entry,
                    id,
                    safe_title,
                    language,
                    DocKind::Unknown,
                    &path,
                    false,
                    Some(e.to_string()),
                );
            }
        };

        match self.download(&download_url).await {
            Ok(bytes) => {
                let kind = match entry.kind {
                    LinkKind::Direct(kind) => kind,
                    LinkKind::Share => sniff_kind(&bytes),
                };
                let path = category_dir.join(format!("{}.{}", safe_title, kind.extension()));
                if let Err(e) = crate::write_atomic(&path, &bytes) {
                    return self.record(
                        entry,
                        id,
                        safe_title,
                        language,
                        kind,
                        &path,
                        false,
                        Some(e.to_string()),
                    );
                }
                info!(title = %entry.title, bytes = bytes.len(), "downloaded");
                self.record(entry, id, safe_title, language, kind, &path, true, None)
            }
            Err(e) => {
                warn!(url = %download_url, error = %e, "download failed");
                let kind = match entry.kind {
                    LinkKind::Direct(kind) => kind,
                    LinkKind::Share => DocKind::Unknown,
                };
                let path = category_dir.join(format!("{}.{}", safe_title, kind.extension()));
                self.record(
                    entry,
                    id,
                    safe_title,
                    language,
                    kind,
                    &path,
                    false,
                    Some(e.to_string()),
                )
            }
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| IngestError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(response.bytes().await?.to_vec())
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &self,
        entry: &DiscoveredDocument,
        id: String,
        safe_title: String,
        language: Language,
        kind: DocKind,
        path: &Path,
        downloaded: bool,
        error: Option<String>,
    ) -> Document {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.{}", safe_title, kind.extension()));

        Document {
            id,
            title: entry.title.clone(),
            filename: filename.clone(),
            filepath: format!("{}/{}", entry.category.as_str(), filename),
            source_url: entry.source_url.clone(),
            category: entry.category,
            language,
            kind,
            downloaded,
            download_error: error,
            download_date: downloaded.then(now_iso),
        }
    }
}

/// Looks for a previously downloaded payload under any known extension.
fn find_existing(dir: &Path, safe_title: &str) -> Option<(DocKind, PathBuf)> {
    for kind in [DocKind::Pdf, DocKind::Docx, DocKind::Doc, DocKind::Unknown] {
        let candidate = dir.join(format!("{}.{}", safe_title, kind.extension()));
        if candidate.exists() {
            return Some((kind, candidate));
        }
    }
    None
}
