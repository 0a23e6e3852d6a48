//! Command line interface for document question answering.
//!
//! Pipeline settings come from the environment (a `.env` file is loaded when
//! present); see [`QaConfig::from_env`]. Service wiring reads `QDRANT_URL`
//! and `QDRANT_API_KEY` for storage, `EMBEDDINGS_URL`, `EMBEDDINGS_API_KEY`
//! (or `OPENAI_API_KEY`) and `EMBEDDING_DIMENSIONS` for the embedder, and
//! `LLM_API_KEY`, `LLM_BASE_URL` and `LLM_MODEL` for answer generation.

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

use docqa::{
    Document, IngestionPipeline, OpenAIChatModel, OpenAIEmbedder, QaConfig, QdrantIndex,
    QueryPipeline, Retriever, SourceMeta, VectorIndex,
};

const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

#[derive(Parser)]
#[command(name = "docqa", version, about = "Document question answering over a vector index")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest text files into the vector index.
    Ingest {
        /// Paths of text files to ingest.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Ask a question and stream a grounded answer.
    Ask {
        /// The question to answer.
        question: String,
    },
    /// Show the ranked chunks retrieved for a question.
    Search {
        /// The question to search with.
        question: String,
    },
    /// Delete the configured collection and everything in it.
    Clear {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = QaConfig::from_env()?;

    match cli.command {
        Command::Ingest { files } => ingest(config, files).await,
        Command::Ask { question } => ask(config, &question).await,
        Command::Search { question } => search(config, &question).await,
        Command::Clear { yes } => clear(config, yes).await,
    }
}

async fn ingest(config: QaConfig, files: Vec<PathBuf>) -> anyhow::Result<()> {
    let index = build_index()?;
    let embedder = build_embedder(&config)?;
    let pipeline =
        IngestionPipeline::builder().config(config).embedder(embedder).index(index).build()?;

    let mut documents = Vec::with_capacity(files.len());
    for path in &files {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let id = path.file_stem().and_then(|s| s.to_str()).unwrap_or("document").to_string();
        let mut document = Document::new(id, text);
        document.source = SourceMeta {
            filename: path.file_name().and_then(|s| s.to_str()).map(String::from),
            uploaded_at: Some(chrono::Utc::now()),
        };
        documents.push(document);
    }

    for report in pipeline.ingest_batch(&documents).await? {
        if report.skipped {
            println!("{}: skipped (no text)", report.document_id);
        } else {
            println!(
                "{}: {} chunk(s), {} character(s)",
                report.document_id, report.chunk_count, report.char_count
            );
        }
    }
    Ok(())
}

async fn ask(config: QaConfig, question: &str) -> anyhow::Result<()> {
    let index = build_index()?;
    let embedder = build_embedder(&config)?;
    let model = build_model()?;
    let pipeline = QueryPipeline::builder()
        .config(config)
        .embedder(embedder)
        .index(index)
        .model(model)
        .build()?;

    let mut answer = pipeline.answer(question).await?;
    let mut stdout = std::io::stdout();
    while let Some(segment) = answer.stream.next().await {
        print!("{}", segment?);
        stdout.flush()?;
    }
    println!();
    Ok(())
}

async fn search(config: QaConfig, question: &str) -> anyhow::Result<()> {
    let index = build_index()?;
    let embedder = build_embedder(&config)?;
    let retriever = Retriever::new(config, embedder, index);

    let results = retriever.search(question).await?;
    if results.is_empty() {
        println!("no results");
        return Ok(());
    }
    for (i, result) in results.iter().enumerate() {
        let preview: String = result.payload.text.chars().take(80).collect();
        println!(
            "{}. [score={:.4}] doc={} chunk={} {}",
            i + 1,
            result.score,
            result.payload.document_id,
            result.payload.chunk_index,
            preview
        );
    }
    Ok(())
}

async fn clear(config: QaConfig, yes: bool) -> anyhow::Result<()> {
    if !yes {
        anyhow::bail!(
            "this deletes the '{}' collection and everything in it; pass --yes to confirm",
            config.collection
        );
    }
    let index = build_index()?;
    index.delete_collection(&config.collection).await?;
    println!("collection '{}' deleted", config.collection);
    Ok(())
}

fn build_index() -> anyhow::Result<Arc<QdrantIndex>> {
    let url =
        std::env::var("QDRANT_URL").unwrap_or_else(|_| DEFAULT_QDRANT_URL.to_string());
    let index = match std::env::var("QDRANT_API_KEY") {
        Ok(key) if !key.is_empty() => QdrantIndex::with_api_key(&url, &key)?,
        _ => QdrantIndex::new(&url)?,
    };
    Ok(Arc::new(index))
}

fn build_embedder(config: &QaConfig) -> anyhow::Result<Arc<OpenAIEmbedder>> {
    let api_key = std::env::var("EMBEDDINGS_API_KEY")
        .or_else(|_| std::env::var("OPENAI_API_KEY"))
        .unwrap_or_default();
    let dimensions = match std::env::var("EMBEDDING_DIMENSIONS") {
        Ok(raw) => {
            raw.parse::<usize>().context("EMBEDDING_DIMENSIONS must be a positive integer")?
        }
        Err(_) => DEFAULT_EMBEDDING_DIMENSIONS,
    };
    let mut embedder = OpenAIEmbedder::new(api_key, &config.embedding_model, dimensions)?;
    if let Ok(url) = std::env::var("EMBEDDINGS_URL") {
        embedder = embedder.with_endpoint(url);
    }
    Ok(Arc::new(embedder))
}

fn build_model() -> anyhow::Result<Arc<OpenAIChatModel>> {
    let api_key =
        std::env::var("LLM_API_KEY").context("LLM_API_KEY must be set to generate answers")?;
    let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_LLM_MODEL.to_string());
    let chat = match std::env::var("LLM_BASE_URL") {
        Ok(base) if !base.is_empty() => OpenAIChatModel::compatible(api_key, base, model),
        _ => OpenAIChatModel::new(api_key, model),
    };
    Ok(Arc::new(chat))
}
