use axum::{Json, Router, routing::get};
use utoipa::OpenApi;

use crate::routes;
use crate::state::AppState;

pub const OPENAPI_PATH: &str = "/api-doc/openapi.json";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Flyin' Wrench MCP Gateway",
        description = "Shop dashboard, Friday context and email tools exposed over REST and JSON-RPC."
    ),
    paths(
        routes::health::health_check,
        routes::health::index,
        routes::tools::list_tools,
        routes::tools::call_tool,
        routes::mcp_http::mcp_post,
    ),
    components(schemas(
        routes::health::HealthResponse,
        routes::health::IndexResponse,
        routes::tools::CallRequest,
        routes::tools::CallResponse,
        crate::error::ErrorBody,
    )),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            utoipa::openapi::security::SecurityScheme::Http(
                utoipa::openapi::security::Http::new(
                    utoipa::openapi::security::HttpAuthScheme::Bearer,
                ),
            ),
        );
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route(OPENAPI_PATH, get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
