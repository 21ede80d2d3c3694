//! HTTP surfaces of the gateway: REST (`/tools`, `/call`), JSON-RPC (`/mcp`),
//! health and the OpenAPI document.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use wrench_core::Dispatcher;

pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use config::ServerArgs;
pub use state::AppState;

use auth::{AuthPolicy, MissingSecret};
use middleware::request_id::{MakeRequestUuidV7, REQUEST_ID_HEADER};

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error(transparent)]
    Auth(#[from] MissingSecret),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// All routes with auth on the tool surfaces. CORS is added by [`serve`].
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .merge(routes::tools::router())
        .merge(routes::mcp_http::router())
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::require_secret,
        ));

    Router::new()
        .merge(routes::health::router())
        .merge(openapi::router())
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuidV7))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER)),
        )
        .with_state(state)
}

pub async fn serve(args: ServerArgs, dispatcher: Arc<Dispatcher>) -> Result<(), ServeError> {
    let auth = AuthPolicy::from_args(&args)?;
    let state = AppState::new(dispatcher, auth);
    let tools = state.dispatcher.registry().len();
    let dashboard = state.dispatcher.config().dashboard.base_url.clone();

    let app = router(state).layer(middleware::cors::build_cors_layer(
        args.cors_origins.as_deref(),
    ));

    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })?;
    tracing::info!(%addr, %dashboard, tools, "Flyin' Wrench MCP server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use wrench_core::config::{GatewayConfig, ServiceEndpoint, Tz};
    use wrench_core::fetch::{Fetch, FetchError, UpstreamRequest, UpstreamResponse};

    use super::*;

    struct StubFetch {
        status: u16,
        body: &'static str,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Fetch for StubFetch {
        async fn fetch(&self, request: UpstreamRequest) -> Result<UpstreamResponse, FetchError> {
            self.calls.lock().unwrap().push(request.url.to_string());
            Ok(UpstreamResponse {
                status: self.status,
                status_text: if self.status == 200 { "OK" } else { "Not Found" }.to_string(),
                body: self.body.as_bytes().to_vec(),
            })
        }
    }

    fn app_with(auth: AuthPolicy, status: u16, body: &'static str) -> (Router, Arc<StubFetch>) {
        let fetch = Arc::new(StubFetch {
            status,
            body,
            calls: Mutex::new(Vec::new()),
        });
        let config = Arc::new(GatewayConfig {
            dashboard: ServiceEndpoint::new("http://dash.local", None),
            context: Some(ServiceEndpoint::new(
                "http://friday.local",
                Some("ctx-key".to_string()),
            )),
            email: None,
            timezone: Tz::UTC,
            default_store_id: "satx".to_string(),
        });
        let dispatcher = Arc::new(Dispatcher::new(config, fetch.clone()));
        (router(AppState::new(dispatcher, auth)), fetch)
    }

    fn open_app(status: u16, body: &'static str) -> (Router, Arc<StubFetch>) {
        app_with(AuthPolicy::Disabled, status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request should build")
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request should build")
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should read");
        serde_json::from_slice(&bytes).expect("body should be JSON")
    }

    #[tokio::test]
    async fn health_and_index_are_public() {
        let (app, _) = app_with(AuthPolicy::SharedSecret(Arc::from("s3cret")), 200, "{}");

        let response = app.clone().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["server"], "flyin-wrench-mcp");

        let response = app.clone().oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["name"], "Flyin' Wrench MCP Server");

        let response = app.oneshot(get(openapi::OPENAPI_PATH)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let doc = body_json(response).await;
        assert!(doc["paths"]["/call"].is_object());
        assert!(doc["paths"]["/mcp"]["post"]["requestBody"].is_object());
    }

    #[tokio::test]
    async fn rest_lists_enabled_tools() {
        let (app, _) = open_app(200, "{}");
        for uri in ["/tools", "/mcp/tools"] {
            let response = app.clone().oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body = body_json(response).await;
            assert_eq!(body["tools"].as_array().unwrap().len(), 20);
        }
    }

    #[tokio::test]
    async fn rest_call_without_tool_is_400() {
        let (app, fetch) = open_app(200, "{}");
        let response = app.oneshot(post_json("/call", json!({}))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Missing tool name"})
        );
        assert!(fetch.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rest_call_with_empty_body_is_400() {
        let (app, _) = open_app(200, "{}");
        let request = Request::builder()
            .method("POST")
            .uri("/mcp/call")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Missing tool name"})
        );
    }

    #[tokio::test]
    async fn rest_call_returns_upstream_result() {
        let (app, fetch) = open_app(200, r#"{"orders":[1,2]}"#);
        let response = app
            .oneshot(post_json(
                "/call",
                json!({"tool": "get_open_repair_orders", "arguments": {"storeId": "austin"}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"result": {"orders": [1, 2]}})
        );
        assert_eq!(
            *fetch.calls.lock().unwrap(),
            vec!["http://dash.local/api/board/repair-orders?storeId=austin".to_string()]
        );
    }

    #[tokio::test]
    async fn rest_dispatch_failure_is_500() {
        let (app, fetch) = open_app(404, "{}");
        let response = app
            .oneshot(post_json("/call", json!({"tool": "get_scorecard"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Dashboard API error: 404 Not Found"})
        );
        assert_eq!(fetch.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_secret_is_rejected_before_dispatch() {
        let (app, fetch) = app_with(AuthPolicy::SharedSecret(Arc::from("s3cret")), 200, "{}");

        let response = app
            .clone()
            .oneshot(post_json("/call", json!({"tool": "get_workstations"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await, json!({"error": "Unauthorized"}));

        let response = app
            .clone()
            .oneshot(post_json(
                "/mcp",
                json!({"jsonrpc": "2.0", "method": "tools/list", "id": 1}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(fetch.calls.lock().unwrap().is_empty());

        let response = app
            .oneshot(post_json(
                "/call?token=s3cret",
                json!({"tool": "get_workstations"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(fetch.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn jsonrpc_tools_call_over_http() {
        let (app, _) = open_app(200, r#"{"stations":[]}"#);
        let response = app
            .oneshot(post_json(
                "/mcp",
                json!({"jsonrpc": "2.0", "method": "tools/call", "params": {"name": "get_workstations", "arguments": {}}, "id": 1}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({
                "jsonrpc": "2.0",
                "result": {"content": [{"type": "text", "text": "{\n  \"stations\": []\n}"}]},
                "id": 1
            })
        );
    }

    #[tokio::test]
    async fn jsonrpc_parse_error_and_notifications() {
        let (app, _) = open_app(200, "{}");

        let request = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["error"]["code"], -32700);

        let response = app
            .clone()
            .oneshot(post_json(
                "/mcp",
                json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let response = app
            .oneshot(post_json(
                "/mcp",
                json!([{"jsonrpc": "2.0", "method": "ping", "id": 7}]),
            ))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body.as_array().map(Vec::len), Some(1));
        assert_eq!(body[0]["id"], 7);
    }

    #[tokio::test]
    async fn bare_tool_shape_on_mcp_falls_back_to_rest() {
        let (app, _) = open_app(200, r#"{"ok":true}"#);
        let response = app
            .clone()
            .oneshot(post_json(
                "/mcp",
                json!({"tool": "get_friday", "arguments": {}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"result": {"ok": true}}));

        let response = app
            .oneshot(post_json("/mcp", json!({"arguments": {}})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Missing tool name"})
        );
    }
}
