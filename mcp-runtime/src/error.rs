use smm_core::error::codes;
use smm_core::{ConfigError, ErrorPayload};
use thiserror::Error;

use crate::client::HttpMethod;

/// Every failure the session builder, the dispatcher or the tool registry
/// can surface. Request-level variants carry the logical operation name
/// plus the method and resolved path (without the context path).
#[derive(Debug, Error)]
pub enum SmmError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("{operation}: authentication failed: {detail}")]
    Authentication {
        operation: String,
        status: Option<u16>,
        path: Option<String>,
        detail: String,
    },

    #[error("{operation}: {method} {path} refused, client is read-only")]
    ReadOnlyViolation {
        operation: String,
        method: HttpMethod,
        path: String,
    },

    #[error("{operation}: {method} {path} not found{}", .detail.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    NotFound {
        operation: String,
        method: HttpMethod,
        path: String,
        detail: Option<String>,
    },

    #[error("{operation}: {method} {path} rejected with HTTP {status}: {body}")]
    Request {
        operation: String,
        method: HttpMethod,
        path: String,
        status: u16,
        body: String,
    },

    #[error("{operation}: {method} {path} failed with HTTP {status}: {body}")]
    Service {
        operation: String,
        method: HttpMethod,
        path: String,
        status: u16,
        body: String,
    },

    #[error("{operation}: {method} {path}: {detail}")]
    Protocol {
        operation: String,
        method: HttpMethod,
        path: String,
        detail: String,
    },

    #[error("{operation}: {method} {path}: {message}")]
    Transport {
        operation: String,
        method: HttpMethod,
        path: String,
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("{operation}: {message}")]
    InvalidArgument {
        operation: String,
        field: Option<String>,
        message: String,
    },

    #[error("unknown tool '{0}'")]
    UnknownTool(String),
}

impl SmmError {
    pub fn invalid_argument(
        operation: impl Into<String>,
        field: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        SmmError::InvalidArgument {
            operation: operation.into(),
            field: field.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            SmmError::Configuration(_) => codes::CONFIGURATION_ERROR,
            SmmError::Authentication { .. } => codes::AUTHENTICATION_FAILED,
            SmmError::ReadOnlyViolation { .. } => codes::READ_ONLY_VIOLATION,
            SmmError::NotFound { .. } => codes::NOT_FOUND,
            SmmError::Request { .. } => codes::REQUEST_REJECTED,
            SmmError::Service { .. } => codes::SERVICE_ERROR,
            SmmError::Protocol { .. } => codes::PROTOCOL_ERROR,
            SmmError::Transport { .. } => codes::TRANSPORT_ERROR,
            SmmError::InvalidArgument { .. } => codes::VALIDATION_FAILED,
            SmmError::UnknownTool(_) => codes::UNKNOWN_TOOL,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            SmmError::Authentication { status, .. } => *status,
            SmmError::Request { status, .. } | SmmError::Service { status, .. } => Some(*status),
            SmmError::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    pub fn operation(&self) -> Option<&str> {
        match self {
            SmmError::Authentication { operation, .. }
            | SmmError::ReadOnlyViolation { operation, .. }
            | SmmError::NotFound { operation, .. }
            | SmmError::Request { operation, .. }
            | SmmError::Service { operation, .. }
            | SmmError::Protocol { operation, .. }
            | SmmError::Transport { operation, .. }
            | SmmError::InvalidArgument { operation, .. } => Some(operation),
            SmmError::Configuration(_) => None,
            SmmError::UnknownTool(name) => Some(name),
        }
    }

    /// Resolved request path, when a request was attempted or refused.
    pub fn path(&self) -> Option<&str> {
        match self {
            SmmError::Authentication { path, .. } => path.as_deref(),
            SmmError::ReadOnlyViolation { path, .. }
            | SmmError::NotFound { path, .. }
            | SmmError::Request { path, .. }
            | SmmError::Service { path, .. }
            | SmmError::Protocol { path, .. }
            | SmmError::Transport { path, .. } => Some(path),
            _ => None,
        }
    }

    fn method(&self) -> Option<HttpMethod> {
        match self {
            SmmError::ReadOnlyViolation { method, .. }
            | SmmError::NotFound { method, .. }
            | SmmError::Request { method, .. }
            | SmmError::Service { method, .. }
            | SmmError::Protocol { method, .. }
            | SmmError::Transport { method, .. } => Some(*method),
            _ => None,
        }
    }

    /// Process exit code for one-shot commands.
    /// 1 = client-side rejection, 2 = server-side failure, 3 = transport, 4 = usage/config.
    pub fn exit_code(&self) -> i32 {
        match self {
            SmmError::Configuration(_) | SmmError::UnknownTool(_) => 4,
            SmmError::Transport { .. } => 3,
            SmmError::Service { .. } | SmmError::Protocol { .. } => 2,
            SmmError::Authentication { .. }
            | SmmError::ReadOnlyViolation { .. }
            | SmmError::NotFound { .. }
            | SmmError::Request { .. }
            | SmmError::InvalidArgument { .. } => 1,
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        let mut payload = ErrorPayload::new(self.code(), self.to_string());
        if let Some(operation) = self.operation() {
            payload = payload.with_operation(operation);
        }
        match (self.method(), self.path()) {
            (Some(method), Some(path)) => payload = payload.with_request(method.as_str(), path),
            (None, Some(path)) => payload.path = Some(path.to_string()),
            _ => {}
        }
        if let Some(status) = self.status() {
            payload = payload.with_status(status);
        }
        if let SmmError::InvalidArgument {
            field: Some(field), ..
        } = self
        {
            payload = payload.with_field(field);
        }
        if let Some(hint) = self.docs_hint() {
            payload = payload.with_docs_hint(hint);
        }
        payload
    }

    fn docs_hint(&self) -> Option<&'static str> {
        match self {
            SmmError::Configuration(_) => Some(
                "Set KNOX_GATEWAY_URL and exactly one credential (KNOX_TOKEN, KNOX_COOKIE, KNOX_USER/KNOX_PASSWORD or KNOX_TOKEN_ENDPOINT/KNOX_PASSCODE_TOKEN), or pick one with --auth-mode.",
            ),
            SmmError::Authentication { .. } => Some(
                "The gateway rejected the credential. Refresh it and restart the server to build a new session.",
            ),
            SmmError::ReadOnlyViolation { .. } => {
                Some("Start the server with --read-only=false (SMM_READONLY=false) to allow write tools.")
            }
            SmmError::UnknownTool(_) => Some("Run `tools` or call tools/list for the catalog."),
            _ => None,
        }
    }
}
