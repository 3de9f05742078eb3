pub mod config;
pub mod credential;
pub mod error;

pub use config::{ClientOptions, DEFAULT_TIMEOUT_SECS, SessionConfig, normalize_context_path};
pub use credential::{AuthMode, CredentialKind, CredentialSources, GatewayCredential};
pub use error::{ConfigError, ErrorPayload};
