//! JSON HTTP tool API.
//!
//! The same [`ToolRegistry`] the MCP bridge serves, reachable over HTTP for
//! scripts and browser clients.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/tools/list` | List all registered tools with schemas |
//! | `POST` | `/tools/{name}` | Call any registered tool by name |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "Query cannot be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `excluded` (403), `not_found` (404),
//! `timeout` (408); everything else is a 500 carrying the error's own code
//! (`network`, `store`, `configuration`, ...) or `tool_error`.
//!
//! File tools report their own failures inside a 200 result as
//! `{ "success": false, "error": ... }`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use docctx_core::Error;

use crate::config::Config;
use crate::traits::{validate_params, ToolContext, ToolInfo, ToolRegistry};

/// Shared state for every route handler.
#[derive(Clone)]
pub struct AppState {
    ctx: ToolContext,
    tools: Arc<ToolRegistry>,
}

impl AppState {
    pub fn new(ctx: ToolContext, tools: Arc<ToolRegistry>) -> Self {
        Self { ctx, tools }
    }
}

/// Router with all routes and a permissive CORS layer.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Bind to `[server].bind` and serve until the process is stopped.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let ctx = ToolContext::from_config(Arc::new(config.clone())).await?;
    let registry = ToolRegistry::with_builtins(ctx.rag_enabled());

    for t in registry.tools() {
        info!(tool = t.name(), "registered POST /tools/{}", t.name());
    }

    let app = build_router(AppState::new(ctx, Arc::new(registry)));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "HTTP tool server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn app_error(status: StatusCode, code: &str, message: impl Into<String>) -> AppError {
    AppError {
        status,
        code: code.to_string(),
        message: message.into(),
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    app_error(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn not_found(message: impl Into<String>) -> AppError {
    app_error(StatusCode::NOT_FOUND, "not_found", message)
}

/// Map a tool failure to a status using the typed error when there is one.
fn classify_tool_error(tool_name: &str, err: anyhow::Error) -> AppError {
    let message = err.to_string();
    let typed = err.chain().find_map(|e| e.downcast_ref::<Error>());

    let Some(typed) = typed else {
        if message.starts_with("Unknown action") {
            return bad_request(message);
        }
        warn!(tool = tool_name, error = %message, "tool failed");
        return app_error(StatusCode::INTERNAL_SERVER_ERROR, "tool_error", message);
    };

    let code = typed.code();
    let status = match code {
        "bad_request" => StatusCode::BAD_REQUEST,
        "excluded" => StatusCode::FORBIDDEN,
        "not_found" => StatusCode::NOT_FOUND,
        "timeout" => StatusCode::REQUEST_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!(tool = tool_name, code, error = %message, "tool failed");
    }
    app_error(status, code, message)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    let tools = state
        .tools
        .tools()
        .iter()
        .map(|t| ToolInfo::of(t.as_ref()))
        .collect();
    Json(ToolListResponse { tools })
}

// ============ POST /tools/{name} ============

/// Look up, validate, execute. Unknown tool → 404, bad parameters → 400.
async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(params): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let tool = state
        .tools
        .find(&name)
        .ok_or_else(|| not_found(format!("no tool registered with name: {}", name)))?;

    let validated_params = validate_params(&tool.parameters_schema(), &params)
        .map_err(|e| bad_request(e.to_string()))?;

    let result = tool
        .execute(validated_params, &state.ctx)
        .await
        .map_err(|e| classify_tool_error(&name, e))?;

    Ok(Json(serde_json::json!({ "result": result })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_typed_errors() {
        let err = classify_tool_error("search", Error::validation("Query cannot be empty").into());
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "bad_request");
        assert_eq!(err.message, "Query cannot be empty");

        let err = classify_tool_error("store", Error::Timeout("embedding request".into()).into());
        assert_eq!(err.status, StatusCode::REQUEST_TIMEOUT);

        let err = classify_tool_error(
            "store",
            Error::Indexing(Box::new(Error::Network("connection refused".into()))).into(),
        );
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, "network");
    }

    #[test]
    fn test_classify_untyped_errors() {
        let err = classify_tool_error("manage", anyhow::anyhow!("Unknown action: purge. Available actions: stats"));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err = classify_tool_error("x", anyhow::anyhow!("boom"));
        assert_eq!(err.code, "tool_error");
    }
}
