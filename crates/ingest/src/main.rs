//! `regula` -- offline ingestion CLI.
//!
//! Stages mirror the pipeline: `fetch` the corpus, `extract` text, `chunk`
//! it, `embed` the chunks into the deployable index, and build the
//! category `catalog`. `all` runs the lot in order. Artifacts land under
//! `{root}/index/`, payloads under `{root}/raw/`, text under
//! `{root}/texts/`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use regula_core::artifacts::{ChunksFile, DocumentsManifest};
use regula_core::chunker::ChunkerConfig;
use regula_core::embedding::HashEmbedder;
use regula_core::traits::Embedder;
use regula_core::EMBEDDING_DIM;
use regula_ingest::{catalog, chunking, embed, extractor, fetcher};

#[derive(Parser)]
#[command(name = "regula", version, about = "Offline ingestion pipeline for the regulatory corpus")]
struct Cli {
    /// Working directory for payloads, text and artifacts.
    #[arg(long, default_value = "data")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover and download the corpus from the index page.
    Fetch {
        #[arg(long)]
        index_url: String,
    },
    /// Extract plain text from downloaded payloads.
    Extract,
    /// Split extracted text into overlapping chunks.
    Chunk {
        #[arg(long, default_value_t = 250)]
        target_tokens: usize,
        #[arg(long, default_value_t = 50)]
        overlap_tokens: usize,
        #[arg(long, default_value_t = 100)]
        min_chunk_tokens: usize,
    },
    /// Embed chunks and write the compressed index artifact.
    Embed {
        /// Model identifier stamped into the artifact.
        #[arg(long, default_value = "hash-fnv1a-768")]
        model_name: String,
        /// Seed for the development hash embedder.
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// ONNX model path (requires the `onnx` build feature).
        #[arg(long)]
        onnx_model: Option<PathBuf>,
        /// Tokenizer path accompanying the ONNX model.
        #[arg(long)]
        tokenizer: Option<PathBuf>,
    },
    /// Build the category catalog with document counts.
    Catalog,
    /// Run every stage in order.
    All {
        #[arg(long)]
        index_url: String,
        #[arg(long, default_value = "hash-fnv1a-768")]
        model_name: String,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long)]
        onnx_model: Option<PathBuf>,
        #[arg(long)]
        tokenizer: Option<PathBuf>,
    },
}

struct Layout {
    raw: PathBuf,
    texts: PathBuf,
    index: PathBuf,
}

impl Layout {
    fn new(root: &Path) -> Self {
        Self {
            raw: root.join("raw"),
            texts: root.join("texts"),
            index: root.join("index"),
        }
    }

    fn manifest_path(&self) -> PathBuf {
        self.index.join("documents.json")
    }

    fn chunks_path(&self) -> PathBuf {
        self.index.join("chunks.json")
    }

    fn embeddings_path(&self) -> PathBuf {
        self.index.join("embeddings.json")
    }

    fn embeddings_gz_path(&self) -> PathBuf {
        self.index.join("embeddings.json.gz")
    }

    fn categories_path(&self) -> PathBuf {
        self.index.join("categories.json")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let layout = Layout::new(&cli.root);

    match cli.command {
        Commands::Fetch { index_url } => {
            run_fetch(&layout, &index_url).await?;
        }
        Commands::Extract => {
            run_extract(&layout)?;
        }
        Commands::Chunk {
            target_tokens,
            overlap_tokens,
            min_chunk_tokens,
        } => {
            run_chunk(
                &layout,
                ChunkerConfig {
                    target_tokens,
                    overlap_tokens,
                    min_chunk_tokens,
                },
            )?;
        }
        Commands::Embed {
            model_name,
            seed,
            onnx_model,
            tokenizer,
        } => {
            let embedder = build_embedder(seed, onnx_model.as_deref(), tokenizer.as_deref())?;
            run_embed(&layout, embedder.as_ref(), &model_name).await?;
        }
        Commands::Catalog => {
            run_catalog(&layout)?;
        }
        Commands::All {
            index_url,
            model_name,
            seed,
            onnx_model,
            tokenizer,
        } => {
            run_fetch(&layout, &index_url).await?;
            run_extract(&layout)?;
            run_chunk(&layout, ChunkerConfig::default())?;
            let embedder = build_embedder(seed, onnx_model.as_deref(), tokenizer.as_deref())?;
            run_embed(&layout, embedder.as_ref(), &model_name).await?;
            run_catalog(&layout)?;
        }
    }

    Ok(())
}

async fn run_fetch(layout: &Layout, index_url: &str) -> anyhow::Result<()> {
    let config = fetcher::FetchConfig::new(index_url, &layout.raw);
    let manifest = fetcher::Fetcher::new(config)?.run().await?;

    let json = serde_json::to_string_pretty(&manifest)?;
    regula_ingest::write_atomic(&layout.manifest_path(), json.as_bytes())?;

    println!(
        "Fetched {} documents ({} ok, {} failed) -> {}",
        manifest.total_documents,
        manifest.downloaded,
        manifest.failed,
        layout.manifest_path().display()
    );
    Ok(())
}

fn run_extract(layout: &Layout) -> anyhow::Result<()> {
    let manifest = load_manifest(layout)?;
    let report = extractor::run_extraction(&manifest, &layout.raw, &layout.texts)?;
    println!(
        "Extracted {} documents ({} failed) -> {}",
        report.extracted,
        report.failed,
        layout.texts.display()
    );
    Ok(())
}

fn run_chunk(layout: &Layout, config: ChunkerConfig) -> anyhow::Result<()> {
    let manifest = load_manifest(layout)?;
    let file = chunking::run_chunking(&manifest, &layout.texts, config)?;
    chunking::write_chunks(&file, &layout.chunks_path())?;
    println!(
        "Chunked into {} chunks -> {}",
        file.total_chunks,
        layout.chunks_path().display()
    );
    Ok(())
}

async fn run_embed(
    layout: &Layout,
    embedder: &dyn Embedder,
    model_name: &str,
) -> anyhow::Result<()> {
    let chunks: ChunksFile = serde_json::from_slice(
        &fs::read(layout.chunks_path())
            .with_context(|| format!("reading {}", layout.chunks_path().display()))?,
    )?;

    let config = embed::EmbedConfig::new(model_name);
    let file = embed::run_embedding(&chunks, embedder, &config).await?;
    embed::write_embeddings(&file, &layout.embeddings_path(), &layout.embeddings_gz_path())?;

    println!(
        "Embedded {} chunks ({}d) -> {}",
        file.total_chunks,
        file.embedding_dim,
        layout.embeddings_gz_path().display()
    );
    Ok(())
}

fn run_catalog(layout: &Layout) -> anyhow::Result<()> {
    let manifest = load_manifest(layout)?;
    let file = catalog::build_categories(&manifest);
    catalog::write_categories(&file, &layout.categories_path())?;
    println!(
        "Catalog with {} categories -> {}",
        file.total_categories,
        layout.categories_path().display()
    );
    Ok(())
}

fn load_manifest(layout: &Layout) -> anyhow::Result<DocumentsManifest> {
    let path = layout.manifest_path();
    let bytes = fs::read(&path)
        .with_context(|| format!("reading {} (run `regula fetch` first)", path.display()))?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn build_embedder(
    seed: u64,
    onnx_model: Option<&Path>,
    tokenizer: Option<&Path>,
) -> anyhow::Result<Box<dyn Embedder>> {
    match (onnx_model, tokenizer) {
        (Some(model), Some(tokenizer)) => {
            #[cfg(feature = "onnx")]
            {
                let embedder = regula_core::embedding::OnnxEmbedder::new(model, tokenizer)?;
                Ok(Box::new(embedder))
            }
            #[cfg(not(feature = "onnx"))]
            {
                let _ = (model, tokenizer);
                anyhow::bail!("this binary was built without the `onnx` feature")
            }
        }
        (None, None) => Ok(Box::new(HashEmbedder::new(EMBEDDING_DIM, seed)?)),
        _ => anyhow::bail!("--onnx-model and --tokenizer must be given together"),
    }
}
