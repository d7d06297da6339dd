//! MCP JSON-RPC bridge over stdio.
//!
//! Every tool in the [`ToolRegistry`] is exposed through `list_tools` /
//! `call_tool`. Tool errors come back as `CallToolResult::error` with the
//! error message as text; only transport failures end [`serve_stdio`].
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "docctx": {
//!       "command": "docctx",
//!       "args": ["--config", "/path/to/docctx.toml", "serve", "mcp"]
//!     }
//!   }
//! }
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler, ServiceExt};
use serde_json::Value;
use tokio::io::{stdin, stdout};
use tracing::{debug, info};

use crate::traits::{validate_params, ToolContext, ToolRegistry};

/// Bridges the tool registry to the MCP protocol.
///
/// Cloned per session; everything inside is behind `Arc`.
#[derive(Clone)]
pub struct McpBridge {
    ctx: ToolContext,
    tools: Arc<ToolRegistry>,
}

impl McpBridge {
    pub fn new(ctx: ToolContext, tools: Arc<ToolRegistry>) -> Self {
        Self { ctx, tools }
    }

    fn to_mcp_tool(tool: &dyn crate::traits::Tool) -> Tool {
        let input_schema: Arc<serde_json::Map<String, Value>> = match tool.parameters_schema() {
            Value::Object(map) => Arc::new(map),
            _ => Arc::new(serde_json::Map::new()),
        };

        Tool {
            name: Cow::Owned(tool.name().to_string()),
            title: None,
            description: Some(Cow::Owned(tool.description().to_string())),
            input_schema,
            output_schema: None,
            annotations: Some(ToolAnnotations::new().read_only(tool.read_only())),
            execution: None,
            icons: None,
            meta: None,
        }
    }

    /// Validate and run one tool call, producing the MCP result content.
    pub async fn invoke(&self, name: &str, params: Value) -> Result<CallToolResult, McpError> {
        let tool = self.tools.find(name).ok_or_else(|| {
            McpError::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("no tool registered with name: {}", name),
                None,
            )
        })?;

        let params = match validate_params(&tool.parameters_schema(), &params) {
            Ok(params) => params,
            Err(e) => return Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        };

        debug!(tool = name, "mcp tool call");
        match tool.execute(params, &self.ctx).await {
            Ok(result) => Ok(CallToolResult::success(vec![Content::text(render(&result))])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        }
    }
}

/// Strings go out as-is; structured results as pretty JSON.
fn render(result: &Value) -> String {
    match result {
        Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    }
}

impl ServerHandler for McpBridge {
    fn get_info(&self) -> ServerInfo {
        let instructions = if self.ctx.rag_enabled() {
            "docctx: project documentation context. Use store to add documents, search to \
             retrieve relevant chunks, manage for knowledge-base stats, and the file-* tools \
             to search and edit project files."
        } else {
            "docctx: project file tools. Use file-search to find text and the file-*-content \
             tools to edit files line by line."
        };

        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "docctx".to_string(),
                title: Some("docctx".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(instructions.to_string()),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools: Vec<Tool> = self
            .tools
            .tools()
            .iter()
            .map(|t| Self::to_mcp_tool(t.as_ref()))
            .collect();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    fn get_tool(&self, name: &str) -> Option<Tool> {
        self.tools.find(name).map(Self::to_mcp_tool)
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let params = request
            .arguments
            .map(Value::Object)
            .unwrap_or(Value::Object(serde_json::Map::new()));
        self.invoke(&request.name, params).await
    }
}

/// Serve the bridge on stdin/stdout until the client disconnects.
pub async fn serve_stdio(bridge: McpBridge) -> anyhow::Result<()> {
    info!(tools = bridge.tools.len(), "starting MCP server on stdio");
    let server = bridge.serve((stdin(), stdout())).await?;
    let quit_reason = server.waiting().await?;
    info!(?quit_reason, "MCP server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::files::{ExcludeRegistry, ProjectGuard};
    use serde_json::json;
    use tempfile::TempDir;

    fn bridge(root: &std::path::Path) -> McpBridge {
        let guard = ProjectGuard::new(root, ExcludeRegistry::empty()).unwrap();
        let ctx = ToolContext::new(Arc::new(Config::minimal()), Arc::new(guard), None);
        McpBridge::new(ctx, Arc::new(ToolRegistry::with_builtins(false)))
    }

    fn text_of(result: &CallToolResult) -> String {
        result
            .content
            .iter()
            .filter_map(|c| c.as_text().map(|t| t.text.clone()))
            .collect()
    }

    #[test]
    fn test_render_string_and_json() {
        assert_eq!(render(&json!("plain")), "plain");
        assert!(render(&json!({ "success": true })).contains("\"success\": true"));
    }

    #[tokio::test]
    async fn test_invoke_file_search() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "alpha\nbeta\n").unwrap();
        let bridge = bridge(tmp.path());

        let result = bridge
            .invoke("file-search", json!({ "query": "beta" }))
            .await
            .unwrap();
        assert_ne!(result.is_error, Some(true));
        let body: Value = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["totalMatches"], 1);
    }

    #[tokio::test]
    async fn test_invoke_errors() {
        let tmp = TempDir::new().unwrap();
        let bridge = bridge(tmp.path());

        let missing = bridge.invoke("store", json!({})).await.unwrap_err();
        assert!(missing.message.contains("no tool registered"));

        let invalid = bridge.invoke("file-search", json!({})).await.unwrap();
        assert_eq!(invalid.is_error, Some(true));
        assert!(text_of(&invalid).contains("missing required parameter: query"));
    }
}
