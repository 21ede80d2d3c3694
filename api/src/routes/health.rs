use axum::{Json, Router, routing::get};
use serde::Serialize;
use wrench_mcp_runtime::MCP_SERVER_NAME;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(index))
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub server: String,
    pub version: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct IndexResponse {
    pub name: String,
    pub version: String,
    pub endpoints: Vec<String>,
}

/// Liveness only; upstream reachability is reported by `get_server_status`.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Gateway is running", body = HealthResponse)),
    tag = "system"
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        server: MCP_SERVER_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service index", body = IndexResponse)),
    tag = "system"
)]
pub async fn index() -> Json<IndexResponse> {
    let endpoints = ["/health", "/tools", "/call", "/mcp", "/api-doc/openapi.json"];
    Json(IndexResponse {
        name: "Flyin' Wrench MCP Server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: endpoints.iter().map(|e| e.to_string()).collect(),
    })
}
