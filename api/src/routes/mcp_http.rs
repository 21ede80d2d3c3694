use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use wrench_mcp_runtime::{RpcError, error_response, is_jsonrpc_message};

use crate::routes::tools::{call_request_from_value, execute_call};
use crate::state::AppState;

const MCP_PATH: &str = "/mcp";

pub fn router() -> Router<AppState> {
    Router::new().route(MCP_PATH, post(mcp_post).get(mcp_get))
}

async fn mcp_get() -> Response {
    StatusCode::METHOD_NOT_ALLOWED.into_response()
}

/// JSON-RPC endpoint. Bodies without `jsonrpc` and `method` are treated as
/// the bare `{tool, arguments}` call shape.
#[utoipa::path(
    post,
    path = "/mcp",
    request_body(content = Object, description = "JSON-RPC 2.0 request or batch, or a bare `{tool, arguments}` call"),
    responses(
        (status = 200, description = "JSON-RPC response or batch of responses"),
        (status = 202, description = "Notification accepted, no body"),
        (status = 401, description = "Missing or wrong shared secret", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "mcp"
)]
pub async fn mcp_post(State(state): State<AppState>, body: Bytes) -> Response {
    let incoming: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!(error = %err, "unparseable JSON-RPC body");
            return (
                StatusCode::OK,
                Json(error_response(Value::Null, RpcError::parse_error())),
            )
                .into_response();
        }
    };

    if !is_jsonrpc_message(&incoming) {
        return match call_request_from_value(incoming) {
            Ok(request) => execute_call(&state, request).await.into_response(),
            Err(err) => err.into_response(),
        };
    }

    let is_batch = incoming.is_array();
    let mut responses = state.mcp.handle_incoming_message(incoming).await;
    if responses.is_empty() {
        return StatusCode::ACCEPTED.into_response();
    }
    if !is_batch && responses.len() == 1 {
        return (StatusCode::OK, Json(responses.remove(0))).into_response();
    }
    (StatusCode::OK, Json(Value::Array(responses))).into_response()
}
