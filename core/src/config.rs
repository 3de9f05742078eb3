use std::time::Duration;

use url::Url;

use crate::credential::GatewayCredential;
use crate::error::ConfigError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Everything needed to build an authenticated gateway session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    gateway_url: String,
    credential: GatewayCredential,
    verify_tls: bool,
    timeout_secs: u64,
}

impl SessionConfig {
    /// Validates the gateway URL and strips any trailing slash.
    pub fn new(gateway_url: &str, credential: GatewayCredential) -> Result<Self, ConfigError> {
        let trimmed = gateway_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(ConfigError::MissingGatewayUrl);
        }

        let parsed = Url::parse(trimmed).map_err(|e| ConfigError::InvalidGatewayUrl {
            url: trimmed.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidGatewayUrl {
                url: trimmed.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        Ok(Self {
            gateway_url: trimmed.to_string(),
            credential,
            verify_tls: true,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        })
    }

    pub fn with_verify_tls(mut self, verify_tls: bool) -> Self {
        self.verify_tls = verify_tls;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Result<Self, ConfigError> {
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        self.timeout_secs = timeout_secs;
        Ok(self)
    }

    pub fn gateway_url(&self) -> &str {
        &self.gateway_url
    }

    pub fn credential(&self) -> &GatewayCredential {
        &self.credential
    }

    pub fn verify_tls(&self) -> bool {
        self.verify_tls
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Options for the service client layered on top of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Service base URL; defaults to the gateway URL.
    pub service_url: Option<String>,
    /// Prefix inserted between the base URL and every request path.
    pub context_path: Option<String>,
    /// Refuse non-safe methods before any network activity.
    pub read_only: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            service_url: None,
            context_path: None,
            read_only: true,
        }
    }
}

impl ClientOptions {
    pub fn with_context_path(mut self, context_path: Option<&str>) -> Self {
        self.context_path = context_path.and_then(normalize_context_path);
        self
    }

    pub fn with_service_url(mut self, service_url: Option<&str>) -> Self {
        self.service_url = service_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

/// `smm/` -> `/smm`, `/` -> none.
pub fn normalize_context_path(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("/{trimmed}"))
    }
}
