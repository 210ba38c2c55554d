use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use docgraph_core::extractor::{DEFAULT_CHAT_ENDPOINT, DEFAULT_CHAT_MODEL};
use docgraph_core::{
    blocks_from_response, build_flat_sections, discover_pdf_files, get_hierarchical_representation,
    remove_duplicate_titles, AllowedRelationship, BuildMode, ChatEndpointConfig, ChatExtractor,
    GraphPipeline, GraphSchema, LayoutBlock, LayoutParser, LoaderOptions, Neo4jStore,
    PipelineOptions, PropertyFilter, Provider, SherpaClient, SummarizeOptions,
    DEFAULT_LAYOUT_API_URL,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docgraph", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Layout service endpoint
    #[arg(long, env = "SHERPA_API_URL", default_value = DEFAULT_LAYOUT_API_URL)]
    sherpa_api_url: String,

    /// OpenAI-compatible chat completions URL
    #[arg(long, env = "LLM_ENDPOINT", default_value = DEFAULT_CHAT_ENDPOINT)]
    llm_endpoint: String,

    /// Bearer token for the chat endpoint
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    llm_api_key: Option<String>,

    /// Chat model used for entity extraction
    #[arg(long, env = "LLM_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    llm_model: String,

    /// Neo4j HTTP URL
    #[arg(long, env = "NEO4J_URL", default_value = "http://localhost:7474")]
    neo4j_url: String,

    /// Neo4j database name
    #[arg(long, env = "NEO4J_DB", default_value = "neo4j")]
    neo4j_db: String,

    /// Neo4j username
    #[arg(long, env = "NEO4J_USER", default_value = "neo4j")]
    neo4j_user: String,

    /// Neo4j password
    #[arg(long, env = "NEO4J_PASSWORD", default_value = "password", hide_env_values = true)]
    neo4j_password: String,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild the header hierarchy of a layout JSON file.
    Hierarchy {
        /// Layout service reply or bare block array.
        #[arg(long)]
        input: PathBuf,
        /// Annotate nodes with document title and header markers.
        #[arg(long, default_value_t = false)]
        include_titles: bool,
    },
    /// Split a layout JSON file into flat sections.
    Flat {
        #[arg(long)]
        input: PathBuf,
        /// Source recorded in every section's metadata.
        #[arg(long, default_value = "")]
        source: String,
    },
    /// Remove title markers that repeat their parent key from any JSON file.
    Dedupe {
        #[arg(long)]
        input: PathBuf,
    },
    /// Send one PDF to the layout service and print the normalized blocks.
    Parse {
        #[arg(long)]
        file: PathBuf,
        #[command(flatten)]
        loader: LoaderArgs,
    },
    /// Parse PDFs, extract entities and write them to Neo4j.
    Ingest {
        /// PDF files or folders searched recursively.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[command(flatten)]
        loader: LoaderArgs,
        #[arg(long, value_enum, default_value_t = ModeArg::Flat)]
        mode: ModeArg,
        #[arg(long, default_value_t = false)]
        include_titles: bool,
        /// Write a cleaned copy of each PDF and parse that instead.
        #[arg(long, default_value_t = false)]
        sanitize: bool,
        /// Create the Neo4j database when it does not exist.
        #[arg(long, default_value_t = false)]
        create_database: bool,
        /// Node types the extractor may emit.
        #[arg(long, value_delimiter = ',')]
        allowed_nodes: Vec<String>,
        /// Relationship types, either `TYPE` or `Source:TYPE:Target`.
        #[arg(long, value_delimiter = ',')]
        allowed_relationships: Vec<String>,
        /// Node properties to keep (all are dropped when empty).
        #[arg(long, value_delimiter = ',')]
        node_properties: Vec<String>,
        /// Relationship properties to keep (all are dropped when empty).
        #[arg(long, value_delimiter = ',')]
        relationship_properties: Vec<String>,
        /// Extra instructions appended to the extraction and summary prompts.
        #[arg(long)]
        additional_prompt: Option<String>,
        /// Summarize the introduction and every record (reorganized mode).
        #[arg(long, default_value_t = false)]
        summarize_all: bool,
        /// Summarize for information extraction (reorganized mode).
        #[arg(long, default_value_t = false)]
        summarize_info: bool,
        /// Require a model for paragraph summaries (reorganized mode).
        #[arg(long, default_value_t = false)]
        summarize_paragraphs: bool,
    },
}

#[derive(clap::Args)]
struct LoaderArgs {
    #[arg(long, default_value = "llmsherpa")]
    provider: String,
    #[arg(long, default_value_t = false)]
    apply_ocr: bool,
    #[arg(long, default_value_t = false)]
    new_indent_parser: bool,
}

impl LoaderArgs {
    fn options(&self, api_url: &str) -> anyhow::Result<LoaderOptions> {
        self.provider.parse::<Provider>()?;
        Ok(LoaderOptions {
            api_url: api_url.to_string(),
            apply_ocr: self.apply_ocr,
            new_indent_parser: self.new_indent_parser,
        })
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Flat,
    Hierarchy,
    Reorganized,
}

impl ModeArg {
    fn build_mode(self, include_titles: bool, summarize: SummarizeOptions) -> BuildMode {
        match self {
            Self::Flat => BuildMode::Flat,
            Self::Hierarchy => BuildMode::Hierarchy { include_titles },
            Self::Reorganized => BuildMode::Reorganized {
                include_titles,
                summarize,
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "docgraph boot"
    );

    match &cli.command {
        Command::Hierarchy {
            input,
            include_titles,
        } => {
            let blocks = read_blocks(input)?;
            let tree = get_hierarchical_representation(&blocks, *include_titles)?;
            println!("{}", serde_json::to_string_pretty(&tree)?);
        }
        Command::Flat { input, source } => {
            let blocks = read_blocks(input)?;
            let sections = build_flat_sections(&blocks, source);
            info!(input = %input.display(), section_count = sections.len(), "built sections");
            println!("{}", serde_json::to_string_pretty(&sections)?);
        }
        Command::Dedupe { input } => {
            let value = read_json(input)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&remove_duplicate_titles(&value))?
            );
        }
        Command::Parse { file, loader } => {
            let client = SherpaClient::new(loader.options(&cli.sherpa_api_url)?);
            let blocks = client.parse_layout(file).await?;
            println!("{}", serde_json::to_string_pretty(&blocks)?);
        }
        Command::Ingest {
            paths,
            loader,
            mode,
            include_titles,
            sanitize,
            create_database,
            allowed_nodes,
            allowed_relationships,
            node_properties,
            relationship_properties,
            additional_prompt,
            summarize_all,
            summarize_info,
            summarize_paragraphs,
        } => {
            let files = collect_pdf_files(paths);
            let schema = GraphSchema {
                allowed_nodes: allowed_nodes.clone(),
                allowed_relationships: allowed_relationships
                    .iter()
                    .map(|raw| parse_allowed_relationship(raw))
                    .collect(),
                node_properties: property_filter(node_properties),
                relationship_properties: property_filter(relationship_properties),
            };

            let mut extractor = ChatExtractor::new(
                ChatEndpointConfig {
                    endpoint: cli.llm_endpoint.clone(),
                    api_key: cli.llm_api_key.clone(),
                    model: cli.llm_model.clone(),
                },
                schema,
            );
            if let Some(prompt) = additional_prompt {
                extractor = extractor.with_additional_prompt(prompt.as_str());
            }

            let summarize = SummarizeOptions {
                all: *summarize_all,
                info: *summarize_info,
                paragraphs: *summarize_paragraphs,
            };
            let summarizer = extractor.clone();

            let pipeline = GraphPipeline::new(
                SherpaClient::new(loader.options(&cli.sherpa_api_url)?),
                extractor,
                Neo4jStore::new(
                    &cli.neo4j_url,
                    &cli.neo4j_db,
                    &cli.neo4j_user,
                    &cli.neo4j_password,
                ),
                PipelineOptions {
                    mode: mode.build_mode(*include_titles, summarize),
                    sanitize: *sanitize,
                    create_database: *create_database,
                },
            )
            .with_summarizer(Box::new(summarizer));

            info!(file_count = files.len(), database = %cli.neo4j_db, "ingesting pdfs");
            let report = pipeline.ingest_files(&files).await?;

            if !report.skipped_files.is_empty() {
                warn!("skipped_files={}", report.skipped_files.len());
            }
            for skipped in &report.skipped_files {
                println!("skipped {}: {}", skipped.path.display(), skipped.reason);
            }
            println!(
                "{} pdf(s) loaded, {} node(s) and {} relationship(s) written at {}",
                report.loaded.len(),
                report.node_count(),
                report.relationship_count(),
                Utc::now().to_rfc3339()
            );
        }
    }

    Ok(())
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let raw = std::fs::read_to_string(path)
        .map_err(|error| anyhow::anyhow!("{}: {error}", path.display()))?;
    Ok(serde_json::from_str(&raw)?)
}

fn read_blocks(path: &Path) -> anyhow::Result<Vec<LayoutBlock>> {
    let payload = read_json(path)?;
    Ok(blocks_from_response(&payload)?)
}

fn collect_pdf_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(discover_pdf_files(path));
        } else {
            files.push(path.clone());
        }
    }
    files
}

fn parse_allowed_relationship(raw: &str) -> AllowedRelationship {
    let parts = raw.split(':').map(str::trim).collect::<Vec<_>>();
    match parts.as_slice() {
        [source, kind, target] => AllowedRelationship::Triple(
            (*source).to_string(),
            (*kind).to_string(),
            (*target).to_string(),
        ),
        _ => AllowedRelationship::Type(raw.trim().to_string()),
    }
}

fn property_filter(names: &[String]) -> PropertyFilter {
    match names {
        [] => PropertyFilter::Drop,
        [only] if only == "*" => PropertyFilter::Keep,
        names => PropertyFilter::Only(names.to_vec()),
    }
}
