//! # docctx CLI
//!
//! ```bash
//! docctx --config ./config/docctx.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docctx init` | Create the SQLite schema or the Qdrant collection |
//! | `docctx store` | Store one document (text or `--file`) |
//! | `docctx index <dir>` | Store every matching file under a directory |
//! | `docctx search "<query>"` | Semantic search |
//! | `docctx stats` | Knowledge-base statistics |
//! | `docctx grep "<query>"` | Search project files |
//! | `docctx serve mcp` | MCP server on stdio |
//! | `docctx serve http` | JSON HTTP tool API |
//! | `docctx tools` | List registered tools |
//!
//! Logs go to stderr (`RUST_LOG`, default `docctx=info`) so stdout stays
//! free for command output and the MCP transport.

use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use docctx::config::{self, Config};
use docctx::files::search::FileSearchOptions;
use docctx::ingest::{self, IndexRequest};
use docctx::mcp::{self, McpBridge};
use docctx::traits::{ToolContext, ToolRegistry};
use docctx::{migrate, server, tool_cmd};
use docctx_core::DocumentType;

/// docctx: documentation context and file tools for AI assistants.
#[derive(Parser)]
#[command(
    name = "docctx",
    about = "docctx: documentation context and file tools for AI assistants",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docctx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the configured vector store. Idempotent.
    Init,

    /// Store a single document.
    Store {
        /// Document text; omit when using --file.
        content: Option<String>,

        /// Read the document from a file (also used as the source path).
        #[arg(long)]
        file: Option<PathBuf>,

        /// Document type (unknown types are stored as `general`).
        #[arg(long = "type", default_value = "general")]
        doc_type: String,

        #[arg(long)]
        source_path: Option<String>,

        /// Comma-separated tags.
        #[arg(long)]
        tags: Option<String>,

        #[arg(long)]
        collection: Option<String>,
    },

    /// Store every matching file under a directory.
    Index {
        dir: PathBuf,

        /// Include globs relative to DIR (repeatable). Defaults to markdown and text files.
        #[arg(long = "include")]
        include: Vec<String>,

        #[arg(long = "type", default_value = "general")]
        doc_type: String,

        #[arg(long)]
        tags: Option<String>,

        #[arg(long)]
        collection: Option<String>,

        /// List the files that would be indexed without storing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Semantic search over stored documents.
    Search {
        query: String,

        #[arg(long = "type")]
        doc_type: Option<String>,

        /// Exact source path or path prefix.
        #[arg(long)]
        source_path: Option<String>,

        /// Maximum results (clamped to 1-50).
        #[arg(long, default_value_t = 10)]
        limit: i64,

        #[arg(long)]
        collection: Option<String>,
    },

    /// Show knowledge-base statistics.
    Stats {
        #[arg(long)]
        collection: Option<String>,
    },

    /// Search project files for text or a regular expression.
    Grep {
        query: String,

        /// File or directory relative to the project root.
        #[arg(long, default_value = ".")]
        path: String,

        /// File-name glob (repeatable).
        #[arg(long = "pattern")]
        patterns: Vec<String>,

        #[arg(long, default_value_t = 10)]
        depth: usize,

        /// Lines of context around each match.
        #[arg(long = "context", short = 'C', default_value_t = 0)]
        context_lines: usize,

        #[arg(long)]
        case_sensitive: bool,

        /// Treat the query as a regular expression.
        #[arg(long, short = 'e')]
        regex: bool,

        #[arg(long, default_value_t = 100)]
        max_per_file: usize,

        #[arg(long, default_value_t = 1000)]
        max_total: usize,

        /// Size filter such as "> 1K".
        #[arg(long)]
        size: Option<String>,
    },

    /// Start a server.
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },

    /// List registered tools.
    Tools {
        /// Print full tool info, including parameter schemas, as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ServeService {
    /// MCP server on stdin/stdout.
    Mcp,
    /// JSON HTTP tool API on `[server].bind`.
    Http,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docctx=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Insert `value` under `key` unless it is `None`.
fn put(params: &mut Map<String, Value>, key: &str, value: Option<String>) {
    if let Some(v) = value {
        params.insert(key.to_string(), Value::String(v));
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    // File tools work without a config file.
    let cfg = match &cli.command {
        Commands::Grep { .. } | Commands::Tools { .. } if !cli.config.exists() => Config::minimal(),
        _ => config::load_config(&cli.config)?,
    };

    match cli.command {
        Commands::Init => {
            migrate::run_init(&cfg).await?;
        }
        Commands::Store {
            content,
            file,
            doc_type,
            source_path,
            tags,
            collection,
        } => {
            let (content, source_path) = match (content, file) {
                (_, Some(file)) => {
                    let text = std::fs::read_to_string(&file)?;
                    let source = source_path.or_else(|| Some(file.display().to_string()));
                    (text, source)
                }
                (Some(text), None) => (text, source_path),
                (None, None) => anyhow::bail!("Provide document text or --file"),
            };
            let mut params = Map::new();
            params.insert("content".to_string(), Value::String(content));
            params.insert("type".to_string(), Value::String(doc_type));
            put(&mut params, "sourcePath", source_path);
            put(&mut params, "tags", tags);
            put(&mut params, "collection", collection);
            tool_cmd::run_tool(&cfg, "store", Value::Object(params)).await?;
        }
        Commands::Index {
            dir,
            include,
            doc_type,
            tags,
            collection,
            dry_run,
        } => {
            let include = if include.is_empty() {
                ingest::DEFAULT_INCLUDE.iter().map(|s| s.to_string()).collect()
            } else {
                include
            };
            let request = IndexRequest {
                dir,
                include,
                doc_type: doc_type.parse::<DocumentType>()?,
                tags,
                collection,
                dry_run,
            };
            ingest::run_index(&cfg, request).await?;
        }
        Commands::Search {
            query,
            doc_type,
            source_path,
            limit,
            collection,
        } => {
            let mut params = Map::new();
            params.insert("query".to_string(), Value::String(query));
            params.insert("limit".to_string(), json!(limit));
            put(&mut params, "type", doc_type);
            put(&mut params, "sourcePath", source_path);
            put(&mut params, "collection", collection);
            tool_cmd::run_tool(&cfg, "search", Value::Object(params)).await?;
        }
        Commands::Stats { collection } => {
            tool_cmd::run_stats(&cfg, collection).await?;
        }
        Commands::Grep {
            query,
            path,
            patterns,
            depth,
            context_lines,
            case_sensitive,
            regex,
            max_per_file,
            max_total,
            size,
        } => {
            let options = FileSearchOptions {
                patterns,
                depth,
                case_sensitive,
                regex,
                context_lines,
                max_matches_per_file: max_per_file,
                max_total_matches: max_total,
                size,
            };
            tool_cmd::run_grep(&cfg, &query, &path, options).await?;
        }
        Commands::Serve { service } => match service {
            ServeService::Mcp => {
                let ctx = ToolContext::from_config(Arc::new(cfg)).await?;
                let registry = ToolRegistry::with_builtins(ctx.rag_enabled());
                mcp::serve_stdio(McpBridge::new(ctx, Arc::new(registry))).await?;
            }
            ServeService::Http => {
                server::run_server(&cfg).await?;
            }
        },
        Commands::Tools { json } => {
            tool_cmd::list_tools(&cfg, json)?;
        }
    }

    Ok(())
}
