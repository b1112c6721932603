//! Command-line entry point.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use gynassist::answer::{AzureOpenAiProvider, LlmProvider, StaticWebLookup, UnconfiguredProvider};
use gynassist::config::Settings;
use gynassist::document;
use gynassist::lifecycle::IndexLifecycleManager;
use gynassist::server::{self, AppState};
use gynassist::store::{AzureBlobStore, BlobStore, LocalBlobStore};
use gynassist::vector::FastEmbedProvider;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gynassist")]
#[command(about = "Retrieval-augmented gynecology assistant", version)]
struct Cli {
    /// Path to a configuration file (overrides discovery)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Build the reference-corpus index from a directory of PDFs and
    /// upload it to the configured store
    Provision {
        /// Directory containing the reference PDFs
        pdf_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => {
            Settings::init_config_file(force)
                .map_err(|e| anyhow::anyhow!("{e}"))
                .context("Failed to create configuration file")?;
            Ok(())
        }
        Commands::Serve => {
            let settings = load_settings(cli.config.as_deref())?;
            serve(settings).await
        }
        Commands::Provision { pdf_dir } => {
            let settings = load_settings(cli.config.as_deref())?;
            provision(settings, &pdf_dir).await
        }
    }
}

fn load_settings(path: Option<&std::path::Path>) -> Result<Settings> {
    let settings = match path {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .context("Failed to load configuration")?;
    Ok(settings)
}

/// Assemble the ordered blob sources: remote primary when configured, local
/// filesystem as fallback (and as the sole store in local-only mode).
fn build_sources(settings: &Settings) -> Result<Vec<Arc<dyn BlobStore>>> {
    let mut sources: Vec<Arc<dyn BlobStore>> = Vec::new();

    if settings.remote_store_configured() {
        let azure = AzureBlobStore::new(&settings.storage)
            .context("Failed to configure Azure blob store")?;
        sources.push(Arc::new(azure));
    } else {
        info!("no storage account configured, running in local-only mode");
    }

    sources.push(Arc::new(LocalBlobStore::new(
        settings.storage.local_root.clone(),
    )));
    Ok(sources)
}

fn build_manager(settings: &Settings) -> Result<Arc<IndexLifecycleManager>> {
    let embedder = FastEmbedProvider::new(
        &settings.semantic_search.model,
        &settings.semantic_search.model_cache_dir,
    )
    .context("Failed to initialize embedding model")?;
    let sources = build_sources(settings)?;

    Ok(Arc::new(IndexLifecycleManager::new(
        sources,
        Arc::new(embedder),
        settings.uploads.max_active,
    )))
}

async fn serve(settings: Settings) -> Result<()> {
    let lifecycle = build_manager(&settings)?;
    lifecycle.probe_sources().await;

    let corpus = lifecycle
        .load_corpus()
        .await
        .context("Failed while loading the reference corpus")?;
    if corpus.is_none() {
        warn!("serving without a reference corpus; general questions will rely on web context only");
    }

    let llm: Arc<dyn LlmProvider> = match AzureOpenAiProvider::new(&settings.openai) {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            warn!(error = %e, "language model not configured, answers will be degraded");
            Arc::new(UnconfiguredProvider)
        }
    };

    let state = Arc::new(AppState {
        lifecycle,
        corpus,
        llm,
        web: Arc::new(StaticWebLookup::new()),
        settings,
    });

    server::serve(state).await
}

async fn provision(settings: Settings, pdf_dir: &std::path::Path) -> Result<()> {
    if !pdf_dir.is_dir() {
        bail!("'{}' is not a directory", pdf_dir.display());
    }

    let lifecycle = build_manager(&settings)?;

    let mut all_chunks = Vec::new();
    let mut sources = 0usize;

    let mut entries = tokio::fs::read_dir(pdf_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_pdf = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            continue;
        }

        info!(file = %path.display(), "processing corpus document");
        let bytes = tokio::fs::read(&path).await?;
        let extracted = document::extract_text(bytes)
            .await
            .with_context(|| format!("Failed to extract '{}'", path.display()))?;

        match document::chunk_document(&extracted) {
            Ok(chunks) => {
                all_chunks.extend(chunks);
                sources += 1;
            }
            Err(e) => warn!(file = %path.display(), error = %e, "skipping document"),
        }
    }

    if all_chunks.is_empty() {
        bail!("no usable PDF documents found in '{}'", pdf_dir.display());
    }

    let record = lifecycle
        .provision_corpus(all_chunks)
        .await
        .context("Failed to build and upload the corpus index")?;

    println!(
        "Provisioned reference corpus from {sources} document(s): {} chunks, {} dimensions",
        record.chunk_count, record.dimension
    );
    Ok(())
}
