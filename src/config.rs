//! TOML configuration.
//!
//! Loaded once at startup by [`load_config`] and shared as `Arc<Config>`.
//! Optional sections fall back to their `Default`; the RAG section, when
//! enabled, must spell out chunking and vectorizer dimensions because
//! there are no built-in values for them.
//!
//! ```toml
//! [project]
//! root = "."
//! exclude = ["**/.env", "secrets/**"]
//!
//! [rag]
//! enabled = true
//! collection = "docs"
//!
//! [rag.store]
//! driver = "sqlite"
//! path = "data/docctx.sqlite"
//!
//! [rag.vectorizer]
//! platform = "openai"
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [rag.chunking]
//! chunk_size = 1000
//! overlap = 200
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::files::edit::OutOfRangePolicy;
use crate::files::ExcludeRegistry;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub rag: RagConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProjectConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Globs, relative to `root`, that file tools must not touch.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            exclude: Vec::new(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FilesConfig {
    #[serde(default)]
    pub out_of_range_lines: OutOfRangePolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RagConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub vectorizer: VectorizerConfig,
    pub chunking: Option<ChunkingConfig>,
}

/// An absent `[rag]` section means RAG is off.
impl Default for RagConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            collection: default_collection(),
            candidate_multiplier: default_candidate_multiplier(),
            store: StoreConfig::default(),
            vectorizer: VectorizerConfig::default(),
            chunking: None,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_collection() -> String {
    "docs".to_string()
}
fn default_candidate_multiplier() -> usize {
    docctx_core::retriever::DEFAULT_CANDIDATE_MULTIPLIER
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreDriver {
    #[default]
    Memory,
    Sqlite,
    Qdrant,
}

impl fmt::Display for StoreDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StoreDriver::Memory => "memory",
            StoreDriver::Sqlite => "sqlite",
            StoreDriver::Qdrant => "qdrant",
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default)]
    pub driver: StoreDriver,
    /// SQLite database file.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Qdrant base URL.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Environment variable holding the Qdrant API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            driver: StoreDriver::Memory,
            path: None,
            endpoint: None,
            api_key_env: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VectorizerPlatform {
    #[serde(rename = "openai")]
    OpenAi,
    Ollama,
    /// Offline feature hashing; deterministic, no network.
    Hashing,
    #[default]
    Disabled,
}

impl fmt::Display for VectorizerPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VectorizerPlatform::OpenAi => "openai",
            VectorizerPlatform::Ollama => "ollama",
            VectorizerPlatform::Hashing => "hashing",
            VectorizerPlatform::Disabled => "disabled",
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorizerConfig {
    #[serde(default)]
    pub platform: VectorizerPlatform,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override for the platform API.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            platform: VectorizerPlatform::Disabled,
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl VectorizerConfig {
    pub fn is_enabled(&self) -> bool {
        self.platform != VectorizerPlatform::Disabled
    }
}

fn default_batch_size() -> usize {
    docctx_core::indexer::DEFAULT_BATCH_SIZE
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7331".to_string()
}

impl Config {
    /// File tools only, rooted at the current directory.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Validate cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        ExcludeRegistry::new(&self.project.exclude).context("Invalid project.exclude")?;

        if !self.rag.enabled {
            return Ok(());
        }
        let rag = &self.rag;

        if rag.collection.trim().is_empty() {
            bail!("rag.collection must not be empty");
        }
        if rag.candidate_multiplier == 0 {
            bail!("rag.candidate_multiplier must be >= 1");
        }

        let chunking = rag
            .chunking
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("[rag.chunking] is required when rag is enabled"))?;
        if chunking.chunk_size == 0 {
            bail!("rag.chunking.chunk_size must be > 0");
        }
        if chunking.overlap >= chunking.chunk_size {
            bail!(
                "rag.chunking.overlap ({}) must be smaller than chunk_size ({})",
                chunking.overlap,
                chunking.chunk_size
            );
        }

        let vectorizer = &rag.vectorizer;
        if vectorizer.batch_size == 0 {
            bail!("rag.vectorizer.batch_size must be > 0");
        }
        if vectorizer.is_enabled() {
            if vectorizer.dims.unwrap_or(0) == 0 {
                bail!(
                    "rag.vectorizer.dims must be > 0 when platform is '{}'",
                    vectorizer.platform
                );
            }
            let needs_model = matches!(
                vectorizer.platform,
                VectorizerPlatform::OpenAi | VectorizerPlatform::Ollama
            );
            if needs_model && vectorizer.model.as_deref().unwrap_or("").trim().is_empty() {
                bail!(
                    "rag.vectorizer.model must be specified when platform is '{}'",
                    vectorizer.platform
                );
            }
        }

        let store = &rag.store;
        match store.driver {
            StoreDriver::Sqlite if store.path.is_none() => {
                bail!("rag.store.path is required for the sqlite driver")
            }
            StoreDriver::Qdrant if store.endpoint.is_none() => {
                bail!("rag.store.endpoint is required for the qdrant driver")
            }
            _ => {}
        }
        if store.timeout_secs == 0 {
            bail!("rag.store.timeout_secs must be > 0");
        }

        Ok(())
    }
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}
