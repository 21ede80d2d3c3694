use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

const CONNECTOR_ORIGINS: &[&str] = &["https://claude.ai", "https://chatgpt.com"];

/// Build the CORS layer from a comma-separated origin list.
///
/// - `None`: any origin, no credentials
/// - `Some(list)`: the listed origins plus the hosted connector origins
/// - Methods: GET, POST, OPTIONS
/// - Headers: Authorization, Content-Type and the two secret headers
pub fn build_cors_layer(origins: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            HeaderName::from_static("authorization"),
            HeaderName::from_static("content-type"),
            HeaderName::from_static("x-api-key"),
            HeaderName::from_static("x-oauth-client-secret"),
        ])
        .max_age(std::time::Duration::from_secs(3600));

    let Some(origins) = origins else {
        return layer.allow_origin(AllowOrigin::any());
    };

    let mut origin_values: Vec<String> = origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect();

    for connector_origin in CONNECTOR_ORIGINS {
        if !origin_values
            .iter()
            .any(|existing| existing.eq_ignore_ascii_case(connector_origin))
        {
            origin_values.push((*connector_origin).to_string());
        }
    }

    let origins: Vec<HeaderValue> = origin_values
        .into_iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();

    layer.allow_origin(origins).allow_credentials(true)
}
