use axum::Json;
use axum::http::header::WWW_AUTHENTICATE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use wrench_core::DispatchError;

/// Error envelope of the REST surface: `{"error": message}`.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed request (400)
    #[error("{0}")]
    BadRequest(String),
    /// No valid shared secret in any accepted slot (401)
    #[error("Unauthorized")]
    Unauthorized,
    /// Tool invocation failed (500)
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Dispatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Dispatch(err) if err.is_client_error() => {
                tracing::warn!(code = err.code(), error = %err, "tool call rejected");
            }
            AppError::Dispatch(err) => {
                tracing::error!(code = err.code(), error = %err, "tool call failed");
            }
            AppError::BadRequest(message) => {
                tracing::debug!(%message, "bad request");
            }
            AppError::Unauthorized => {}
        }

        let mut response = (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response();
        if matches!(self, AppError::Unauthorized) {
            response.headers_mut().insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer realm=\"flyin-wrench-mcp\""),
            );
        }
        response
    }
}
