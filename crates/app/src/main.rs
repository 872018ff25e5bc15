use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use kb_retrieval_core::{
    ChromaStore, EngineConfig, IngestionOptions, KnowledgeBase, ReingestPolicy, SearchReport,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "kb", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Chroma base URL
    #[arg(long, env = "KB_CHROMA_URL", default_value = "http://localhost:8000")]
    chroma_url: String,

    /// Collection holding the chunks
    #[arg(long, env = "KB_COLLECTION", default_value = "knowledge_base")]
    collection: String,

    /// Upper bound in seconds on every vector store call
    #[arg(long, env = "KB_STORE_TIMEOUT_SECS", default_value = "30")]
    store_timeout_secs: u64,

    /// Results returned when a search does not say otherwise
    #[arg(long, env = "KB_TOP_K", default_value = "5")]
    top_k: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk a document (or every document in a folder) and index it.
    Ingest {
        /// A single .pdf, .txt or .md file.
        #[arg(long, conflicts_with = "folder", required_unless_present = "folder")]
        file: Option<PathBuf>,
        /// Folder scanned recursively for supported files.
        #[arg(long)]
        folder: Option<PathBuf>,
        /// Title; defaults to the file name without extension.
        #[arg(long, requires = "file")]
        title: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
        /// Explicit document id; a random one is assigned otherwise.
        #[arg(long, requires = "file")]
        document_id: Option<String>,
        /// Replace chunks already stored under the same document id.
        #[arg(long, default_value_t = false)]
        replace: bool,
        #[arg(long, default_value = "1000")]
        chunk_size: usize,
        #[arg(long, default_value = "200")]
        chunk_overlap: usize,
    },
    /// Search with vector similarity, falling back to keyword and text matching.
    Search {
        #[arg(long)]
        query: String,
        #[arg(long)]
        top_k: Option<usize>,
        /// Restrict results to these documents (repeatable).
        #[arg(long = "document-id")]
        document_ids: Vec<String>,
        /// Print the report as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List one document's chunks in order.
    Chunks {
        #[arg(long)]
        document_id: String,
    },
    /// List ingested documents, newest first.
    Documents,
    /// Show the collection's chunk count.
    Stats,
    /// Delete every chunk of a document.
    Delete {
        #[arg(long)]
        document_id: String,
    },
    /// Delete all chunks but keep the collection.
    Clear,
    /// Drop and recreate the collection.
    Reset {
        /// Required; without it nothing is touched.
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },
}

fn print_report(report: &SearchReport) {
    println!("{}", report.message());
    for (rank, result) in report.results.iter().enumerate() {
        println!(
            "[{}] score={:.4} method={} document_id={} chunk={}",
            rank + 1,
            result.similarity_score,
            result.source.method.as_str(),
            result.source.document_id,
            result.source.sequence_index
        );
        if !result.source.title.is_empty() {
            println!("  title={}", result.source.title);
        }
        if !result.source.matched_terms.is_empty() {
            println!("  matched={}", result.source.matched_terms.join(", "));
        }
        println!("  {}", result.content);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = EngineConfig::default()
        .with_store_timeout(Duration::from_secs(cli.store_timeout_secs));
    config.collection_name = cli.collection.clone();
    config.default_top_k = cli.top_k;
    let gateway = ChromaStore::from_config(&cli.chroma_url, &config)
        .with_context(|| format!("invalid chroma url {}", cli.chroma_url))?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        collection = %config.collection_name,
        "kb boot"
    );

    match cli.command {
        Command::Ingest {
            file,
            folder,
            title,
            description,
            document_id,
            replace,
            chunk_size,
            chunk_overlap,
        } => {
            let reingest_policy = if replace {
                ReingestPolicy::Replace
            } else {
                ReingestPolicy::Reject
            };
            let kb = KnowledgeBase::new(
                Arc::new(gateway),
                config.with_ingestion(IngestionOptions {
                    chunk_size,
                    chunk_overlap,
                    reingest_policy,
                }),
            );

            let reports = match (file, folder) {
                (Some(file), _) => {
                    let report = match document_id {
                        Some(id) => {
                            kb.pipeline()
                                .ingest_file_as(&id, &file, title.as_deref(), &description)
                                .await?
                        }
                        None => kb.ingest_file(&file, title.as_deref(), &description).await?,
                    };
                    vec![report]
                }
                (None, Some(folder)) => {
                    let outcome = kb.ingest_folder(&folder).await?;
                    for skipped in &outcome.skipped {
                        warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped source");
                    }
                    outcome.ingested
                }
                (None, None) => bail!("pass --file or --folder"),
            };

            for report in &reports {
                if let Some(warning) = &report.warning {
                    warn!(document_id = %report.document.document_id, "{warning}");
                }
                println!("{}", serde_json::to_string_pretty(report)?);
            }
        }
        Command::Search {
            query,
            top_k,
            document_ids,
            json,
        } => {
            let kb = KnowledgeBase::new(Arc::new(gateway), config);
            let scope = (!document_ids.is_empty()).then_some(document_ids.as_slice());
            let report = kb.search(&query, top_k, scope).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Command::Chunks { document_id } => {
            let kb = KnowledgeBase::new(Arc::new(gateway), config);
            for chunk in kb.catalog().document_chunks(&document_id).await? {
                println!(
                    "[{}] {} ({} chars, {})",
                    chunk.metadata.sequence_index,
                    chunk.id,
                    chunk.metadata.chunk_length,
                    chunk.metadata.language
                );
                println!("  {}", chunk.content);
            }
        }
        Command::Documents => {
            let kb = KnowledgeBase::new(Arc::new(gateway), config);
            let summaries = kb.catalog().document_summaries().await?;
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        Command::Stats => {
            let kb = KnowledgeBase::new(Arc::new(gateway), config);
            let stats = kb.catalog().stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Delete { document_id } => {
            let kb = KnowledgeBase::new(Arc::new(gateway), config);
            let report = kb.delete_document(&document_id).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Clear => {
            let kb = KnowledgeBase::new(Arc::new(gateway), config);
            let report = kb.clear_all().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Reset { confirm } => {
            let kb = KnowledgeBase::new(Arc::new(gateway), config);
            let report = kb.reset(confirm).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
