use std::fmt;
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, COOKIE, HeaderMap, HeaderValue, SET_COOKIE};
use reqwest::{Method, RequestBuilder, Url};
use serde_json::Value;
use smm_core::credential::KNOX_JWT_COOKIE;
use smm_core::{ConfigError, CredentialKind, GatewayCredential, SessionConfig};

use crate::error::SmmError;

/// Header Knox reads a passcode token from on its token endpoint.
pub const KNOX_PASSCODE_HEADER: &str = "X-Knox-Passcode";

const TOKEN_EXCHANGE_OPERATION: &str = "gateway_token_exchange";

/// What the session attaches to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthArtifact {
    BearerHeader,
    Cookie,
    Basic,
}

/// Turns a [`SessionConfig`] into an [`AuthenticatedSession`].
///
/// Only the token-exchange credential touches the network here; every other
/// form is local header state. Basic credentials are sent with the first real
/// request, there is no pre-flight login.
pub struct SessionBuilder {
    config: SessionConfig,
}

impl SessionBuilder {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    pub async fn authenticate(self) -> Result<AuthenticatedSession, SmmError> {
        let config = self.config;
        let kind = config.credential().kind();

        if !config.verify_tls() {
            tracing::warn!(
                gateway = %config.gateway_url(),
                "TLS certificate verification is disabled for this session"
            );
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut basic = None;
        let artifact = match config.credential() {
            GatewayCredential::BearerToken(token) => {
                headers.insert(AUTHORIZATION, bearer_header(token, kind)?);
                AuthArtifact::BearerHeader
            }
            GatewayCredential::SessionCookie(cookie) => {
                headers.insert(COOKIE, sensitive_header(cookie, kind)?);
                AuthArtifact::Cookie
            }
            GatewayCredential::BasicAuth { user, password } => {
                basic = Some((user.clone(), password.clone()));
                AuthArtifact::Basic
            }
            GatewayCredential::TokenExchange {
                token_endpoint,
                passcode_token,
            } => match exchange_passcode(&config, token_endpoint, passcode_token).await? {
                Exchanged::Bearer(header) => {
                    headers.insert(AUTHORIZATION, header);
                    AuthArtifact::BearerHeader
                }
                Exchanged::Cookie(header) => {
                    headers.insert(COOKIE, header);
                    AuthArtifact::Cookie
                }
            },
        };

        let http = client_builder(&config)
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::ClientBuild(e.to_string()))?;

        tracing::info!(
            gateway = %config.gateway_url(),
            strategy = kind.as_str(),
            artifact = ?artifact,
            verify_tls = config.verify_tls(),
            timeout_secs = config.timeout_secs(),
            "gateway session ready"
        );

        Ok(AuthenticatedSession {
            http,
            basic,
            kind,
            artifact,
            gateway_url: config.gateway_url().to_string(),
            timeout: config.timeout(),
        })
    }
}

/// Transport state built once and read-only afterwards. `reqwest::Client`
/// is `Send + Sync` and pools connections internally, so one session serves
/// concurrent requests without locking.
pub struct AuthenticatedSession {
    http: reqwest::Client,
    basic: Option<(String, String)>,
    kind: CredentialKind,
    artifact: AuthArtifact,
    gateway_url: String,
    timeout: Duration,
}

impl AuthenticatedSession {
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.http.request(method, url);
        match &self.basic {
            Some((user, password)) => request.basic_auth(user, Some(password)),
            None => request,
        }
    }

    pub fn strategy(&self) -> CredentialKind {
        self.kind
    }

    pub fn artifact(&self) -> AuthArtifact {
        self.artifact
    }

    pub fn gateway_url(&self) -> &str {
        &self.gateway_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl fmt::Debug for AuthenticatedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedSession")
            .field("gateway_url", &self.gateway_url)
            .field("strategy", &self.kind)
            .field("artifact", &self.artifact)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Header value obtained from the token endpoint, already validated.
enum Exchanged {
    Bearer(HeaderValue),
    Cookie(HeaderValue),
}

fn client_builder(config: &SessionConfig) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .timeout(config.timeout())
        .danger_accept_invalid_certs(!config.verify_tls())
}

/// Trade the passcode for a short-lived token or `hadoop-jwt` cookie.
async fn exchange_passcode(
    config: &SessionConfig,
    token_endpoint: &str,
    passcode_token: &str,
) -> Result<Exchanged, SmmError> {
    let url = token_endpoint_url(config.gateway_url(), token_endpoint)?;
    let path = url.path().to_string();
    let auth_error = |status: Option<u16>, detail: String| SmmError::Authentication {
        operation: TOKEN_EXCHANGE_OPERATION.to_string(),
        status,
        path: Some(path.clone()),
        detail,
    };

    let http = client_builder(config)
        .build()
        .map_err(|e| ConfigError::ClientBuild(e.to_string()))?;
    let mut passcode = HeaderValue::from_str(passcode_token).map_err(|_| {
        ConfigError::InvalidCredential {
            kind: CredentialKind::TokenExchange.as_str(),
            reason: "passcode token contains characters not allowed in a header".to_string(),
        }
    })?;
    passcode.set_sensitive(true);

    let response = http
        .get(url)
        .header(ACCEPT, "application/json")
        .header(KNOX_PASSCODE_HEADER, passcode)
        .send()
        .await
        .map_err(|e| auth_error(None, format!("token endpoint unreachable: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        tracing::warn!(status = status.as_u16(), "token exchange rejected by gateway");
        return Err(auth_error(
            Some(status.as_u16()),
            format!("token endpoint returned HTTP {}", status.as_u16()),
        ));
    }

    let jwt_cookie = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(knox_cookie_pair);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| auth_error(Some(status.as_u16()), format!("failed to read token response: {e}")))?;
    let access_token = serde_json::from_slice::<Value>(&bytes)
        .ok()
        .and_then(|body| {
            body.get("access_token")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .filter(|token| !token.trim().is_empty());

    // Values that cannot travel as a header count as no usable credential.
    let unusable = |what: &str| {
        auth_error(
            Some(status.as_u16()),
            format!("token endpoint returned {what} that cannot be sent as an HTTP header"),
        )
    };
    match (access_token, jwt_cookie) {
        (Some(token), _) => {
            tracing::info!("token exchange returned an access token");
            let header = bearer_header(&token, CredentialKind::TokenExchange)
                .map_err(|_| unusable("an access token"))?;
            Ok(Exchanged::Bearer(header))
        }
        (None, Some(cookie)) => {
            tracing::info!("token exchange returned a session cookie");
            let header = sensitive_header(&cookie, CredentialKind::TokenExchange)
                .map_err(|_| unusable("a session cookie"))?;
            Ok(Exchanged::Cookie(header))
        }
        (None, None) => Err(auth_error(
            Some(status.as_u16()),
            "token endpoint response carried neither access_token nor a hadoop-jwt cookie"
                .to_string(),
        )),
    }
}

/// Absolute endpoints are used as-is; relative ones hang off the gateway URL.
fn token_endpoint_url(gateway_url: &str, token_endpoint: &str) -> Result<Url, SmmError> {
    let raw = if token_endpoint.starts_with("http://") || token_endpoint.starts_with("https://") {
        token_endpoint.to_string()
    } else {
        format!("{gateway_url}/{}", token_endpoint.trim_start_matches('/'))
    };
    Url::parse(&raw).map_err(|e| {
        SmmError::Configuration(ConfigError::InvalidCredential {
            kind: CredentialKind::TokenExchange.as_str(),
            reason: format!("invalid token endpoint '{raw}': {e}"),
        })
    })
}

/// `hadoop-jwt=abc; Path=/; Secure` -> `hadoop-jwt=abc`
fn knox_cookie_pair(set_cookie: &str) -> Option<String> {
    let pair = set_cookie.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    (name.trim() == KNOX_JWT_COOKIE && !value.trim().is_empty()).then(|| pair.to_string())
}

fn bearer_header(token: &str, kind: CredentialKind) -> Result<HeaderValue, SmmError> {
    sensitive_header(&format!("Bearer {token}"), kind)
}

fn sensitive_header(value: &str, kind: CredentialKind) -> Result<HeaderValue, SmmError> {
    let mut header = HeaderValue::from_str(value).map_err(|_| ConfigError::InvalidCredential {
        kind: kind.as_str(),
        reason: "value contains characters not allowed in an HTTP header".to_string(),
    })?;
    header.set_sensitive(true);
    Ok(header)
}
