use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tools", get(list_tools))
        .route("/call", post(call_tool))
        .route("/mcp/tools", get(list_tools))
        .route("/mcp/call", post(call_tool))
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct CallRequest {
    /// Registered tool name
    pub tool: Option<String>,
    /// Tool arguments; unknown keys are ignored
    #[schema(value_type = Option<Object>)]
    pub arguments: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CallResponse {
    /// Upstream JSON, unmodified
    #[schema(value_type = Object)]
    pub result: Value,
}

/// List the tools enabled on this gateway.
#[utoipa::path(
    get,
    path = "/tools",
    responses(
        (status = 200, description = "Tool definitions as `{tools: [...]}`"),
        (status = 401, description = "Missing or wrong shared secret", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "tools"
)]
pub async fn list_tools(State(state): State<AppState>) -> Json<Value> {
    Json(state.dispatcher.tools_list_payload())
}

/// Invoke one tool and return the upstream result.
#[utoipa::path(
    post,
    path = "/call",
    request_body = CallRequest,
    responses(
        (status = 200, description = "Tool result", body = CallResponse),
        (status = 400, description = "Missing tool name", body = crate::error::ErrorBody),
        (status = 401, description = "Missing or wrong shared secret", body = crate::error::ErrorBody),
        (status = 500, description = "Dispatch failure", body = crate::error::ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "tools"
)]
pub async fn call_tool(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CallResponse>, AppError> {
    let request = parse_call_request(&body)?;
    execute_call(&state, request).await
}

/// An empty body is treated as `{}` so it reaches the tool-name check.
fn parse_call_request(body: &[u8]) -> Result<CallRequest, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CallRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid request body: {e}")))
}

pub(crate) fn call_request_from_value(value: Value) -> Result<CallRequest, AppError> {
    serde_json::from_value(value)
        .map_err(|e| AppError::BadRequest(format!("Invalid request body: {e}")))
}

pub(crate) async fn execute_call(
    state: &AppState,
    request: CallRequest,
) -> Result<Json<CallResponse>, AppError> {
    let tool = request
        .tool
        .filter(|tool| !tool.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing tool name".to_string()))?;
    let arguments = request.arguments.unwrap_or_default();

    let result = state.dispatcher.execute(&tool, &arguments).await?;
    Ok(Json(CallResponse { result }))
}
