//! HTTP surface of the tool host.
//!
//! Two routes, per the wire protocol: `GET /tools` for discovery and
//! `POST /tools/{name}` for invocation. Each invocation runs in its own
//! task; a panicking tool implementation becomes a 500 error body, never a
//! dead host.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::tools::ToolRegistry;
use crate::validate::validate_arguments;
use wire::{ErrorBody, ToolDescriptor};

/// Build the host router over a fixed tool registry.
///
/// The registry is read-only once the router exists; concurrent requests
/// share it without coordination.
pub fn router(registry: Arc<ToolRegistry>) -> Router {
    Router::new()
        .route("/tools", get(list_tools))
        .route("/tools/{name}", post(invoke_tool))
        .with_state(registry)
}

/// Bind `addr` and serve the host until the process exits.
pub async fn serve(addr: SocketAddr, registry: Arc<ToolRegistry>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| Error::Bind { addr, source })?;
    tracing::info!(%addr, tools = registry.len(), "tool host listening");
    axum::serve(listener, router(registry))
        .await
        .map_err(Error::Serve)
}

async fn list_tools(State(registry): State<Arc<ToolRegistry>>) -> Json<Vec<ToolDescriptor>> {
    Json(registry.descriptors())
}

async fn invoke_tool(
    State(registry): State<Arc<ToolRegistry>>,
    Path(name): Path<String>,
    Json(args): Json<Value>,
) -> Response {
    let Some(tool) = registry.get(&name) else {
        tracing::warn!(tool = %name, "invocation of unknown tool");
        return error_response(StatusCode::NOT_FOUND, format!("unknown tool: {name}"));
    };

    if let Err(reason) = validate_arguments(&tool.parameters_schema(), &args) {
        tracing::warn!(tool = %name, %reason, "invalid arguments");
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("invalid arguments: {reason}"),
        );
    }

    tracing::debug!(tool = %name, "invoking");

    // The spawned task is the fault boundary: tool panics surface here as a
    // JoinError instead of unwinding through the connection handler.
    let handle = tokio::spawn(async move { tool.run(args).await });

    match handle.await {
        Ok(Ok(value)) => Json(value).into_response(),
        Ok(Err(e)) => {
            tracing::warn!(tool = %name, error = %e, "tool failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(join_error) => {
            let message = if join_error.is_panic() {
                format!("tool {name} panicked")
            } else {
                format!("tool {name} was cancelled")
            };
            tracing::error!(tool = %name, %message, "tool task died");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, message)
        }
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorBody::new(message))).into_response()
}
