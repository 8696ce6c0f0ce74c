use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser as _;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

use docrag_core::config::Settings;
use docrag_embed::build_embedder;
use docrag_retrieval::{AnswerContext, RetrievalService};
use docrag_vector::{read_manifest, BuildSettings, IndexBuilder};

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = match cli.env.as_deref() {
        Some(env) => Settings::load_for_env(env)?,
        None => Settings::load()?,
    };

    match cli.command {
        Commands::Build { source, persist, limit } => handle_build(settings, source, persist, limit).await,
        Commands::Query { question, k, prompt } => handle_query(&settings, &question, k, prompt).await,
        Commands::Status => handle_status(&settings),
    }
}

async fn handle_build(
    mut settings: Settings,
    source: Option<PathBuf>,
    persist: Option<PathBuf>,
    limit: Option<usize>,
) -> Result<()> {
    if let Some(dir) = source {
        settings.index.source_directory = dir.to_string_lossy().into_owned();
    }
    if let Some(dir) = persist {
        settings.index.persist_directory = dir.to_string_lossy().into_owned();
    }
    if limit.is_some() {
        settings.index.max_documents = limit;
    }
    settings.validate()?;

    let build = BuildSettings::from_settings(&settings).with_progress(true);
    println!("Source directory: {}", build.source_directory.display());
    println!("Index directory:  {}", build.persist_directory.display());

    let embedder = build_embedder(&settings.embedding)?;
    let index = IndexBuilder::new(embedder, build)
        .build_index_async()
        .await
        .context("index build failed; the previous index was left untouched")?;
    println!("Indexed {} chunks with {} (dimension {})", index.len(), index.model(), index.dimension());
    Ok(())
}

async fn handle_query(settings: &Settings, question: &str, k: Option<usize>, prompt: bool) -> Result<()> {
    let embedder = build_embedder(&settings.embedding)?;
    let persist = settings.persist_directory();
    let service = RetrievalService::open(&persist, Arc::clone(&embedder))
        .with_context(|| format!("cannot open index at {}; run `docrag build` first", persist.display()))?
        .with_default_k(settings.retrieval.k);

    let hits = service.retrieve_async(question, k.unwrap_or(service.default_k())).await?;
    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (rank, hit) in hits.iter().enumerate() {
        println!("{}. {} (distance {:.4})", rank + 1, hit.source, hit.distance);
        println!("{}\n", hit.text.trim());
    }

    let answer = AnswerContext::from_hits(question, &hits);
    if prompt {
        println!("{}", answer.to_prompt());
    }
    println!("Sources: {}", answer.citations.join(", "));
    Ok(())
}

fn handle_status(settings: &Settings) -> Result<()> {
    let persist = settings.persist_directory();
    let manifest = read_manifest(&persist).with_context(|| format!("no index at {}", persist.display()))?;
    println!("Index:     {}", persist.display());
    println!("Model:     {}", manifest.model);
    println!("Dimension: {}", manifest.dimension);
    println!("Chunks:    {}", manifest.count);
    println!("Built at:  {}", manifest.created_at.to_rfc3339());

    if manifest.dimension != settings.embedding.dimension {
        warn!(
            persisted = manifest.dimension,
            configured = settings.embedding.dimension,
            "index dimension differs from the configured embedding dimension; rebuild before querying"
        );
    }
    Ok(())
}
