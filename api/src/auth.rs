use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use wrench_core::auth::secret_matches;
use wrench_core::error::codes;

use crate::config::ServerArgs;
use crate::error::AppError;
use crate::state::AppState;

pub const OAUTH_CLIENT_SECRET_HEADER: &str = "x-oauth-client-secret";
pub const API_KEY_HEADER: &str = "x-api-key";
pub const TOKEN_QUERY_PARAM: &str = "token";

/// Access rule for the REST and JSON-RPC routes.
#[derive(Clone)]
pub enum AuthPolicy {
    SharedSecret(Arc<str>),
    /// Explicit bypass; only for deployments behind an authenticating proxy.
    Disabled,
}

#[derive(Debug, thiserror::Error)]
#[error(
    "MCP_AUTH_TOKEN is not set; configure a shared secret or pass --no-auth (MCP_AUTH_DISABLED=true) to serve without one"
)]
pub struct MissingSecret;

impl AuthPolicy {
    /// Refuses to build a policy when no secret is configured and the bypass
    /// was not requested.
    pub fn from_args(args: &ServerArgs) -> Result<Self, MissingSecret> {
        let secret = args
            .auth_token
            .as_deref()
            .map(str::trim)
            .filter(|secret| !secret.is_empty());

        match (secret, args.no_auth) {
            (_, true) => {
                if secret.is_some() {
                    tracing::warn!("MCP_AUTH_TOKEN ignored: authentication explicitly disabled");
                }
                tracing::warn!("authentication disabled; every caller can invoke tools");
                Ok(AuthPolicy::Disabled)
            }
            (Some(secret), false) => Ok(AuthPolicy::SharedSecret(Arc::from(secret))),
            (None, false) => Err(MissingSecret),
        }
    }

    /// Any one accepted slot carrying the secret is sufficient.
    pub fn permits(&self, headers: &HeaderMap, query: Option<&str>) -> bool {
        let AuthPolicy::SharedSecret(expected) = self else {
            return true;
        };
        presented_credentials(headers, query)
            .iter()
            .any(|presented| secret_matches(presented, expected))
    }
}

fn presented_credentials(headers: &HeaderMap, query: Option<&str>) -> Vec<String> {
    let mut credentials = Vec::with_capacity(4);

    if let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
    {
        credentials.push(token.trim().to_string());
    }

    for name in [OAUTH_CLIENT_SECRET_HEADER, API_KEY_HEADER] {
        if let Some(value) = headers.get(name).and_then(|value| value.to_str().ok()) {
            credentials.push(value.to_string());
        }
    }

    if let Some(query) = query {
        credentials.extend(
            url::form_urlencoded::parse(query.as_bytes())
                .filter(|(key, _)| key == TOKEN_QUERY_PARAM)
                .map(|(_, value)| value.into_owned()),
        );
    }

    credentials
}

/// Middleware for the protected routes. Runs before any dispatch.
pub async fn require_secret(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if state.auth.permits(req.headers(), req.uri().query()) {
        return next.run(req).await;
    }
    tracing::warn!(
        code = codes::UNAUTHORIZED,
        method = %req.method(),
        path = req.uri().path(),
        "rejected request without a valid shared secret"
    );
    AppError::Unauthorized.into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn secret_policy() -> AuthPolicy {
        AuthPolicy::SharedSecret(Arc::from("s3cret"))
    }

    #[test]
    fn each_slot_is_sufficient() {
        let policy = secret_policy();

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer s3cret"));
        assert!(policy.permits(&headers, None));

        let mut headers = HeaderMap::new();
        headers.insert(OAUTH_CLIENT_SECRET_HEADER, HeaderValue::from_static("s3cret"));
        assert!(policy.permits(&headers, None));

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("s3cret"));
        assert!(policy.permits(&headers, None));

        assert!(policy.permits(&HeaderMap::new(), Some("foo=bar&token=s3cret")));
    }

    #[test]
    fn wrong_or_missing_credentials_are_rejected() {
        let policy = secret_policy();
        assert!(!policy.permits(&HeaderMap::new(), None));
        assert!(!policy.permits(&HeaderMap::new(), Some("token=nope")));

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic s3cret"));
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("s3cre"));
        assert!(!policy.permits(&headers, None));
    }

    #[test]
    fn disabled_policy_permits_everything() {
        assert!(AuthPolicy::Disabled.permits(&HeaderMap::new(), None));
    }

    #[test]
    fn startup_requires_secret_or_explicit_bypass() {
        let args = ServerArgs::default();
        assert!(AuthPolicy::from_args(&args).is_err());

        let args = ServerArgs {
            auth_token: Some("   ".to_string()),
            ..ServerArgs::default()
        };
        assert!(AuthPolicy::from_args(&args).is_err());

        let args = ServerArgs {
            no_auth: true,
            ..ServerArgs::default()
        };
        assert!(matches!(
            AuthPolicy::from_args(&args),
            Ok(AuthPolicy::Disabled)
        ));

        let args = ServerArgs {
            auth_token: Some("s3cret".to_string()),
            ..ServerArgs::default()
        };
        assert!(matches!(
            AuthPolicy::from_args(&args),
            Ok(AuthPolicy::SharedSecret(_))
        ));
    }
}
