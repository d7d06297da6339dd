//! Tool extension point shared by the MCP bridge, the HTTP server and the CLI.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 ToolRegistry                 │
//! │  ┌──────────────────┐  ┌──────────────────┐  │
//! │  │ RAG (if enabled) │  │ File tools       │  │
//! │  │ store / search / │  │ file-search      │  │
//! │  │ manage           │  │ file-*-content   │  │
//! │  └──────────────────┘  └──────────────────┘  │
//! └──────────────────────┬───────────────────────┘
//!                        ▼
//!          McpBridge (stdio) · HTTP /tools/{name}
//! ```
//!
//! Tools receive their parameters as a JSON object that already passed
//! [`validate_params`] against the tool's schema, with defaults filled in.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::config::Config;
use crate::files::{ExcludeRegistry, ProjectGuard};
use crate::rag::RagService;
use crate::tools;

// ═══════════════════════════════════════════════════════════════════════
// Tool Trait
// ═══════════════════════════════════════════════════════════════════════

/// A tool that MCP clients and HTTP callers can discover and invoke.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use anyhow::Result;
/// use serde_json::{json, Value};
/// use docctx::traits::{Tool, ToolContext};
///
/// pub struct RootTool;
///
/// #[async_trait]
/// impl Tool for RootTool {
///     fn name(&self) -> &str { "project-root" }
///     fn description(&self) -> &str { "Show the project root" }
///
///     fn parameters_schema(&self) -> Value {
///         json!({ "type": "object", "properties": {} })
///     }
///
///     async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
///         Ok(json!({ "root": ctx.guard().root().display().to_string() }))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Route path (`POST /tools/{name}`) and MCP tool name.
    fn name(&self) -> &str;

    /// One-line description for discovery.
    fn description(&self) -> &str;

    /// Built-in tools are marked with `"builtin": true` in `GET /tools/list`.
    fn is_builtin(&self) -> bool {
        false
    }

    /// Whether the tool leaves files and stores untouched.
    fn read_only(&self) -> bool {
        true
    }

    /// JSON Schema for the parameters: `type: "object"`, `properties`,
    /// optionally `required` and per-property `default`.
    fn parameters_schema(&self) -> Value;

    /// Execute with validated parameters.
    ///
    /// Errors become structured error results at the MCP and HTTP
    /// boundary; they never take the server down.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

// ═══════════════════════════════════════════════════════════════════════
// ToolContext
// ═══════════════════════════════════════════════════════════════════════

/// Shared state handed to every tool invocation.
#[derive(Clone)]
pub struct ToolContext {
    config: Arc<Config>,
    guard: Arc<ProjectGuard>,
    rag: Option<Arc<RagService>>,
}

impl ToolContext {
    pub fn new(config: Arc<Config>, guard: Arc<ProjectGuard>, rag: Option<Arc<RagService>>) -> Self {
        Self { config, guard, rag }
    }

    /// Build the project guard and, when `[rag]` is enabled, the RAG service.
    pub async fn from_config(config: Arc<Config>) -> Result<Self> {
        let excludes = ExcludeRegistry::new(&config.project.exclude)?;
        let guard = ProjectGuard::new(&config.project.root, excludes)?;
        let rag = if config.rag.enabled {
            Some(Arc::new(RagService::from_config(&config.rag).await?))
        } else {
            None
        };
        Ok(Self::new(config, Arc::new(guard), rag))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn guard(&self) -> &ProjectGuard {
        &self.guard
    }

    pub fn rag(&self) -> Result<&RagService> {
        match &self.rag {
            Some(rag) => Ok(rag),
            None => bail!("RAG is disabled in the project configuration"),
        }
    }

    pub fn rag_enabled(&self) -> bool {
        self.rag.is_some()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Parameter validation
// ═══════════════════════════════════════════════════════════════════════

/// Serializable tool info for `GET /tools/list` and `docctx tools`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub builtin: bool,
    pub parameters: Value,
}

impl ToolInfo {
    pub fn of(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            builtin: tool.is_builtin(),
            parameters: tool.parameters_schema(),
        }
    }
}

/// Check `params` against `schema` and inject defaults for absent properties.
///
/// Checks required fields, JSON types, and `enum` membership. Properties
/// not named in the schema are passed through untouched.
pub fn validate_params(schema: &Value, params: &Value) -> Result<Value> {
    let params_obj = match params {
        Value::Object(map) => map.clone(),
        Value::Null => serde_json::Map::new(),
        other => bail!("parameters must be a JSON object, got {}", json_type_name(other)),
    };

    let properties = schema
        .get("properties")
        .and_then(|p| p.as_object())
        .cloned()
        .unwrap_or_default();

    let required: Vec<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    for field in &required {
        if !params_obj.contains_key(*field) {
            bail!("missing required parameter: {}", field);
        }
    }

    let mut result = params_obj.clone();
    for (prop_name, prop_schema) in &properties {
        match params_obj.get(prop_name) {
            Some(value) => {
                if let Some(expected) = prop_schema.get("type").and_then(|t| t.as_str()) {
                    let type_ok = match expected {
                        "string" => value.is_string(),
                        "integer" => value.is_i64() || value.is_u64(),
                        "number" => value.is_number(),
                        "boolean" => value.is_boolean(),
                        "array" => value.is_array(),
                        "object" => value.is_object(),
                        _ => true,
                    };
                    if !type_ok {
                        bail!(
                            "parameter '{}' must be of type '{}', got {}",
                            prop_name,
                            expected,
                            json_type_name(value)
                        );
                    }
                }
                if let Some(allowed) = prop_schema.get("enum").and_then(|e| e.as_array()) {
                    if !allowed.contains(value) {
                        let names: Vec<String> = allowed.iter().map(|v| v.to_string()).collect();
                        bail!(
                            "parameter '{}' must be one of [{}], got {}",
                            prop_name,
                            names.join(", "),
                            value
                        );
                    }
                }
            }
            None => {
                if let Some(default) = prop_schema.get("default") {
                    result.insert(prop_name.clone(), default.clone());
                }
            }
        }
    }

    Ok(Value::Object(result))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Explicit name → tool mapping, populated at startup.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// File tools always; `store`, `search` and `manage` only with RAG enabled.
    pub fn with_builtins(rag_enabled: bool) -> Self {
        let mut registry = Self::new();
        if rag_enabled {
            registry.register(Box::new(tools::StoreTool));
            registry.register(Box::new(tools::SearchTool));
            registry.register(Box::new(tools::ManageTool));
        }
        registry.register(Box::new(tools::FileSearchTool));
        registry.register(Box::new(tools::FileDeleteContentTool));
        registry.register(Box::new(tools::FileInsertContentTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
