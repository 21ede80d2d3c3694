use thiserror::Error;

use crate::config::Service;

/// Failure of a single tool invocation. Every variant is terminal for the
/// request; nothing is retried.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Unknown tool: {name}")]
    UnknownTool {
        name: String,
        suggestion: Option<&'static str>,
    },
    #[error("Missing {field} parameter")]
    MissingArgument {
        tool: &'static str,
        field: &'static str,
    },
    #[error("Invalid {field} parameter: {reason}")]
    InvalidArgument {
        tool: &'static str,
        field: &'static str,
        reason: &'static str,
    },
    #[error("{} API error: {status} {status_text}", .service.label())]
    Upstream {
        service: Service,
        status: u16,
        status_text: String,
    },
    #[error("{} API request failed: {message}", .service.label())]
    Transport { service: Service, message: String },
}

impl DispatchError {
    /// Machine-readable code, stable across transports.
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::UnknownTool { .. } => codes::UNKNOWN_TOOL,
            DispatchError::MissingArgument { .. } => codes::MISSING_ARGUMENT,
            DispatchError::InvalidArgument { .. } => codes::INVALID_ARGUMENT,
            DispatchError::Upstream { .. } => codes::UPSTREAM_ERROR,
            DispatchError::Transport { .. } => codes::TRANSPORT_ERROR,
        }
    }

    pub fn docs_hint(&self) -> Option<String> {
        match self {
            DispatchError::UnknownTool {
                suggestion: Some(suggestion),
                ..
            } => Some(format!("Did you mean '{suggestion}'? Call tools/list for the full set.")),
            DispatchError::UnknownTool { .. } => {
                Some("Call tools/list for the available tools.".to_string())
            }
            DispatchError::MissingArgument { tool, field } => {
                Some(format!("'{tool}' requires a non-empty '{field}' argument."))
            }
            DispatchError::InvalidArgument { tool, field, .. } => {
                Some(format!("'{tool}' uses '{field}' as a path segment; '.' and '..' are not accepted."))
            }
            DispatchError::Upstream { .. } | DispatchError::Transport { .. } => None,
        }
    }

    /// Whether the failure was caused by the caller rather than an upstream.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            DispatchError::UnknownTool { .. }
                | DispatchError::MissingArgument { .. }
                | DispatchError::InvalidArgument { .. }
        )
    }
}

/// Error codes used across the gateway
pub mod codes {
    pub const UNKNOWN_TOOL: &str = "unknown_tool";
    pub const MISSING_ARGUMENT: &str = "missing_argument";
    pub const INVALID_ARGUMENT: &str = "invalid_argument";
    pub const UPSTREAM_ERROR: &str = "upstream_error";
    pub const TRANSPORT_ERROR: &str = "transport_error";
    pub const UNAUTHORIZED: &str = "unauthorized";
}
