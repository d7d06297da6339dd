//! CLI commands that run through the tool registry.
//!
//! `docctx store`, `search` and `stats` build the same parameters an MCP
//! client would send and call the registered tool, so the CLI and the
//! servers share one code path. `docctx grep` calls the search engine
//! directly and prints grep-style lines instead of JSON.

use anyhow::{bail, Result};
use serde_json::Value;
use std::sync::Arc;

use crate::config::Config;
use crate::files::search::{search_files, FileSearchOptions, FileSearchReport};
use crate::traits::{validate_params, ToolContext, ToolInfo, ToolRegistry};

/// Validate `params`, run tool `name`, and print its result.
pub async fn run_tool(config: &Config, name: &str, params: Value) -> Result<()> {
    let ctx = ToolContext::from_config(Arc::new(config.clone())).await?;
    let registry = ToolRegistry::with_builtins(ctx.rag_enabled());
    let Some(tool) = registry.find(name) else {
        if !ctx.rag_enabled() {
            bail!("'{}' requires RAG; enable [rag] in the configuration", name);
        }
        bail!("no tool registered with name: {}", name);
    };

    let params = validate_params(&tool.parameters_schema(), &params)?;
    let result = tool.execute(params, &ctx).await?;

    match result {
        Value::String(text) => println!("{}", text),
        Value::Object(ref map) if map.get("success") == Some(&Value::Bool(false)) => {
            let error = map.get("error").and_then(|e| e.as_str()).unwrap_or("failed");
            bail!("{}", error);
        }
        other => println!("{}", serde_json::to_string_pretty(&other)?),
    }
    Ok(())
}

/// `docctx stats`: the `manage` report, or just the flag when RAG is off.
pub async fn run_stats(config: &Config, collection: Option<String>) -> Result<()> {
    if !config.rag.enabled {
        println!("RAG enabled: false");
        return Ok(());
    }
    let mut params = serde_json::Map::new();
    params.insert("action".to_string(), Value::String("stats".to_string()));
    if let Some(collection) = collection {
        params.insert("collection".to_string(), Value::String(collection));
    }
    run_tool(config, "manage", Value::Object(params)).await
}

/// `docctx tools`: name, origin and description of every registered tool.
pub fn list_tools(config: &Config, json: bool) -> Result<()> {
    let registry = ToolRegistry::with_builtins(config.rag.enabled);
    if json {
        let tools: Vec<ToolInfo> = registry.tools().iter().map(|t| ToolInfo::of(t.as_ref())).collect();
        println!("{}", serde_json::to_string_pretty(&tools)?);
        return Ok(());
    }

    println!("{:<22} {:<10} {}", "TOOL", "ACCESS", "DESCRIPTION");
    for t in registry.tools() {
        let access = if t.read_only() { "read" } else { "write" };
        println!("{:<22} {:<10} {}", t.name(), access, t.description());
    }
    if !config.rag.enabled {
        println!();
        println!("RAG is disabled: store, search and manage are not registered.");
    }
    Ok(())
}

/// `docctx grep`: search project files and print `path:line:text` rows.
pub async fn run_grep(
    config: &Config,
    query: &str,
    path: &str,
    options: FileSearchOptions,
) -> Result<()> {
    let ctx = ToolContext::from_config(Arc::new(config.clone())).await?;
    let report = search_files(ctx.guard(), path, query, &options)?;
    print!("{}", render_report(&report));
    Ok(())
}

/// grep-style text: `:` after matching line numbers, `-` after context.
pub fn render_report(report: &FileSearchReport) -> String {
    let mut out = String::new();
    for file in &report.matches {
        for m in &file.matches {
            for c in &m.before {
                out.push_str(&format!("{}-{}-{}\n", file.path, c.line_number, c.text));
            }
            out.push_str(&format!("{}:{}:{}\n", file.path, m.line_number, m.line));
            for c in &m.after {
                out.push_str(&format!("{}-{}-{}\n", file.path, c.line_number, c.text));
            }
        }
    }
    out.push_str(&format!(
        "{} match(es) in {} file(s), {} scanned, {} skipped{}\n",
        report.total_matches,
        report.matches.len(),
        report.files_scanned,
        report.files_skipped,
        if report.truncated { " (truncated)" } else { "" }
    ));
    out
}
