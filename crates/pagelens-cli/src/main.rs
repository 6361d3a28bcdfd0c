//! PageLens CLI - Command-line interface
//!
//! Usage:
//!   pagelens ingest <pdf>
//!   pagelens ingest-images <mapping.json>
//!   pagelens remove <name>
//!   pagelens search <query> [--top-k N] [--ordinal-key KEY]
//!   pagelens ask <question>
//!   pagelens stats
//!
//! Author: hephaex@gmail.com

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use pagelens_core::config::{AppConfig, LoggingConfig};
use pagelens_core::LlmClient;
use pagelens_ingest::{IngestReport, IngestionPipeline};
use pagelens_rag::{create_llm_client, ChatOrchestrator, PromptBuilder, RetrievalService};
use pagelens_vector::{
    create_embedding_provider, EmbeddingProvider, SharedDocumentStore, StorePaths,
};
use tracing_subscriber::EnvFilter;

const COLLECTION_NAME: &str = "pagelens";

#[derive(Parser)]
#[command(name = "pagelens")]
#[command(about = "Page-level PDF retrieval and chat")]
#[command(version)]
struct Cli {
    /// TOML configuration file (environment variables still take precedence)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a PDF, one record per page
    Ingest {
        /// Path to the PDF
        path: PathBuf,
    },
    /// Ingest image records from a mapping JSON file
    IngestImages {
        /// Path to the mapping file
        mapping: PathBuf,
    },
    /// Remove every record of a document
    Remove {
        /// Document name, e.g. guide.pdf
        name: String,
    },
    /// Find the documents most relevant to a query
    Search {
        query: String,

        /// Number of records to retrieve
        #[arg(long)]
        top_k: Option<usize>,

        /// Metadata key used to re-order results
        #[arg(long)]
        ordinal_key: Option<String>,
    },
    /// Ask a question answered from stored pages
    Ask { question: String },
    /// Show store statistics
    Stats,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?
            .with_env_override()?,
        None => AppConfig::from_env()?,
    };
    Ok(config)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Store and providers opened from configuration
struct Workspace {
    config: AppConfig,
    store: SharedDocumentStore,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Workspace {
    async fn open(config: AppConfig) -> anyhow::Result<Self> {
        let store = SharedDocumentStore::open(StorePaths::from(&config.store))
            .context("opening document store")?;
        let embedder: Arc<dyn EmbeddingProvider> =
            Arc::from(create_embedding_provider(&config.embedding)?);
        store.ensure_dimension(embedder.dimension()).await?;

        tracing::debug!(
            records = store.count().await,
            embedding = embedder.model_id(),
            "Workspace opened"
        );

        Ok(Self {
            config,
            store,
            embedder,
        })
    }

    fn pipeline(&self) -> IngestionPipeline {
        IngestionPipeline::new(self.store.clone(), Arc::clone(&self.embedder))
    }

    fn retrieval(&self) -> RetrievalService {
        RetrievalService::new(
            Arc::new(self.store.get_or_create_collection(COLLECTION_NAME)),
            Arc::clone(&self.embedder),
        )
    }

    fn chat(&self) -> anyhow::Result<ChatOrchestrator> {
        let llm: Arc<dyn LlmClient> =
            Arc::from(create_llm_client(&self.config.llm).context("configuring LLM")?);

        Ok(
            ChatOrchestrator::new(self.retrieval(), llm, self.store.clone())
                .with_top_k(self.config.retrieval.chat_top_k)
                .with_prompt(PromptBuilder::from_config(&self.config.llm)?),
        )
    }
}

fn print_report(report: &IngestReport) {
    if report.already_ingested {
        println!("{} is already ingested", report.document);
    } else {
        println!(
            "{}: {} records added, {} skipped, {} words",
            report.document, report.records_added, report.skipped, report.words
        );
        if let Some(title) = &report.title {
            println!("Title: {title}");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    init_tracing(&config.logging);

    let workspace = Workspace::open(config).await?;

    match cli.command {
        Commands::Ingest { path } => {
            let report = workspace.pipeline().ingest_pdf(&path).await?;
            print_report(&report);
        }
        Commands::IngestImages { mapping } => {
            let report = workspace.pipeline().ingest_image_mapping(&mapping).await?;
            print_report(&report);
        }
        Commands::Remove { name } => {
            let removed = workspace.pipeline().remove_document(&name).await?;
            if removed == 0 {
                bail!("no records found for {name}");
            }
            println!("Removed {removed} records of {name}");
        }
        Commands::Search {
            query,
            top_k,
            ordinal_key,
        } => {
            let retrieval_config = &workspace.config.retrieval;
            let top_k = top_k.unwrap_or(retrieval_config.top_k);
            let retrieval = workspace.retrieval();

            let documents = match ordinal_key.or_else(|| retrieval_config.ordinal_key.clone()) {
                Some(key) => {
                    retrieval
                        .find_relevant_documents_by_ordinal(&query, top_k, &key)
                        .await?
                }
                None => retrieval.find_relevant_documents(&query, top_k).await?,
            };

            if documents.is_empty() {
                println!("No matching documents");
            }
            for (rank, document) in documents.iter().enumerate() {
                println!("[{}] {}", rank + 1, document);
            }
        }
        Commands::Ask { question } => {
            let answer = workspace.chat()?.answer(&question).await?;
            println!("{}", answer.answer);
            if let (Some(document), Some(page)) = (&answer.source_document, answer.page) {
                println!("\nSource: {document}, page {page}");
            }
            for image in &answer.images {
                println!("Image: {image}");
            }
        }
        Commands::Stats => {
            let stats = serde_json::json!({
                "records": workspace.store.count().await,
                "dimension": workspace.store.dimension().await,
                "documents": workspace.pipeline().documents().await,
            });
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}
