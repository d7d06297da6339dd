//! `docctx index <dir>`: walk a directory and store every matching file.
//!
//! Each file becomes one [`Document`] whose `source_path` is the walked
//! path, so later searches can filter by directory prefix. Files that are
//! not UTF-8 or are empty are skipped; a failed file does not stop the walk.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};
use walkdir::WalkDir;

use docctx_core::models::parse_tags;
use docctx_core::{Document, DocumentType};

use crate::config::Config;
use crate::files::{build_globset, ExcludeRegistry};
use crate::rag::RagService;

pub const DEFAULT_INCLUDE: &[&str] = &["**/*.md", "**/*.txt"];

const DEFAULT_EXCLUDES: &[&str] = &["**/.git/**", "**/target/**", "**/node_modules/**"];

pub struct IndexRequest {
    pub dir: PathBuf,
    pub include: Vec<String>,
    pub doc_type: DocumentType,
    pub tags: Option<String>,
    pub collection: Option<String>,
    pub dry_run: bool,
}

/// Files under `dir` matching `include`, minus default and project excludes.
pub fn scan_dir(dir: &Path, include: &[String], excludes: &ExcludeRegistry) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("Directory does not exist: {}", dir.display());
    }
    let include_set = build_globset(include)?;
    let default_excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    let exclude_set = build_globset(&default_excludes)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(dir).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || excludes.is_excluded(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }
        files.push(path.to_path_buf());
    }
    Ok(files)
}

fn source_path_of(path: &Path) -> String {
    let display = path.to_string_lossy().replace('\\', "/");
    display.trim_start_matches("./").to_string()
}

pub async fn run_index(config: &Config, request: IndexRequest) -> Result<()> {
    let excludes = ExcludeRegistry::new(&config.project.exclude)?;
    let files = scan_dir(&request.dir, &request.include, &excludes)?;

    if request.dry_run {
        println!("Would index {} file(s):", files.len());
        for path in &files {
            println!("  {}", source_path_of(path));
        }
        return Ok(());
    }

    if !config.rag.enabled {
        bail!("RAG is disabled in the project configuration");
    }
    let rag = RagService::from_config(&config.rag).await?;
    let tags = request.tags.as_deref().map(parse_tags).unwrap_or_default();

    let start = Instant::now();
    let mut indexed = 0usize;
    let mut chunks = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;

    for path in &files {
        let source_path = source_path_of(path);
        let content = match std::fs::read_to_string(path) {
            Ok(content) if !content.trim().is_empty() => content,
            Ok(_) => {
                debug!(path = %source_path, "skipping empty file");
                skipped += 1;
                continue;
            }
            Err(e) => {
                warn!(path = %source_path, error = %e, "skipping unreadable file");
                skipped += 1;
                continue;
            }
        };

        let document = Document::new(content, request.doc_type)
            .with_source_path(Some(source_path.clone()))
            .with_tags(tags.clone());

        match rag.index(request.collection.as_deref(), &document).await {
            Ok(result) => {
                println!("  {} ({} chunks)", source_path, result.chunks_created);
                indexed += 1;
                chunks += result.chunks_created;
            }
            Err(e) => {
                eprintln!("  {} failed: {}", source_path, e);
                failed += 1;
            }
        }
    }

    println!(
        "Indexed {} file(s), {} chunk(s) into '{}' in {} ms ({} skipped, {} failed)",
        indexed,
        chunks,
        request
            .collection
            .as_deref()
            .unwrap_or(rag.default_collection()),
        start.elapsed().as_millis(),
        skipped,
        failed
    );

    if failed > 0 {
        bail!("{} file(s) failed to index", failed);
    }
    Ok(())
}
