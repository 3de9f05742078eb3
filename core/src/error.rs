use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Setup problems detected before any request leaves the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("gateway URL is required")]
    MissingGatewayUrl,

    #[error("invalid gateway URL '{url}': {reason}")]
    InvalidGatewayUrl { url: String, reason: String },

    #[error("request timeout must be a positive number of seconds")]
    InvalidTimeout,

    #[error("no usable credential provided")]
    NoCredential,

    #[error("ambiguous credentials: {} are all set, configure exactly one or pick an auth mode", .sources.join(", "))]
    AmbiguousCredential { sources: Vec<&'static str> },

    #[error("{kind} credential is incomplete: '{missing}' is not set")]
    IncompleteCredential {
        kind: &'static str,
        missing: &'static str,
    },

    #[error("{kind} credential is not usable: {reason}")]
    InvalidCredential { kind: &'static str, reason: String },

    #[error("unknown auth mode '{0}' (expected auto, token, cookie, basic or token-exchange)")]
    UnknownAuthMode(String),

    #[error("failed to load environment file '{path}': {reason}")]
    EnvFile { path: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
}

/// Structured error returned to tool hosts. Every failure names the
/// operation that produced it, plus the request coordinates when a
/// request was attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Machine-readable error code (see [`codes`])
    pub error: String,
    /// Human/agent-readable description of what went wrong
    pub message: String,
    /// Logical operation (tool) name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Resolved request path, without the context path prefix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Which argument caused the error (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Hint about how to recover
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_hint: Option<String>,
}

impl ErrorPayload {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            operation: None,
            method: None,
            path: None,
            status: None,
            field: None,
            docs_hint: None,
        }
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn with_request(mut self, method: impl Into<String>, path: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self.path = Some(path.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_docs_hint(mut self, docs_hint: impl Into<String>) -> Self {
        self.docs_hint = Some(docs_hint.into());
        self
    }
}

/// Error codes used across the tool surface
pub mod codes {
    pub const CONFIGURATION_ERROR: &str = "configuration_error";
    pub const AUTHENTICATION_FAILED: &str = "authentication_failed";
    pub const READ_ONLY_VIOLATION: &str = "read_only_violation";
    pub const NOT_FOUND: &str = "not_found";
    pub const REQUEST_REJECTED: &str = "request_rejected";
    pub const SERVICE_ERROR: &str = "service_error";
    pub const PROTOCOL_ERROR: &str = "protocol_error";
    pub const TRANSPORT_ERROR: &str = "transport_error";
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const UNKNOWN_TOOL: &str = "unknown_tool";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_omits_unset_fields() {
        let payload = ErrorPayload::new(codes::NOT_FOUND, "missing")
            .with_operation("get_topic_configs")
            .with_request("GET", "/topics/missing/configs")
            .with_status(404);

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            json!({
                "error": "not_found",
                "message": "missing",
                "operation": "get_topic_configs",
                "method": "GET",
                "path": "/topics/missing/configs",
                "status": 404
            })
        );
    }

    #[test]
    fn ambiguous_credential_lists_every_source() {
        let err = ConfigError::AmbiguousCredential {
            sources: vec!["token", "basic"],
        };
        assert!(err.to_string().contains("token, basic"));
    }
}
