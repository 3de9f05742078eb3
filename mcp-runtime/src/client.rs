use std::fmt;
use std::time::{Duration, Instant};

use reqwest::{Method, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smm_core::{ClientOptions, ConfigError};

use crate::error::SmmError;
use crate::session::AuthenticatedSession;

const BODY_SNIPPET_MAX_CHARS: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// Methods a read-only client may send.
    pub fn is_safe(self) -> bool {
        matches!(self, HttpMethod::Get | HttpMethod::Head)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    fn to_reqwest(self) -> Method {
        match self {
            HttpMethod::Get => Method::GET,
            HttpMethod::Head => Method::HEAD,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical operation: a method, a path template and what gets bound into it.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    operation: String,
    method: HttpMethod,
    template: String,
    path_args: Vec<String>,
    query: Vec<(String, String)>,
    body: Option<Value>,
    deadline: Option<Duration>,
}

impl ApiRequest {
    pub fn new(operation: impl Into<String>, method: HttpMethod, template: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            method,
            template: template.into(),
            path_args: Vec::new(),
            query: Vec::new(),
            body: None,
            deadline: None,
        }
    }

    pub fn get(operation: impl Into<String>, template: impl Into<String>) -> Self {
        Self::new(operation, HttpMethod::Get, template)
    }

    /// Bound to the next `{placeholder}` in declaration order.
    pub fn path_arg(mut self, value: impl ToString) -> Self {
        self.path_args.push(value.to_string());
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Call-site deadline covering the send and the body read.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn json_body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn resolved_path(&self) -> Result<String, String> {
        resolve_path(&self.template, &self.path_args)
    }
}

/// The uniform call primitive every tool funnels through. Holds no state
/// besides the session it owns, so calls can be issued concurrently.
#[derive(Debug)]
pub struct ServiceClient {
    session: AuthenticatedSession,
    base_url: String,
    context_path: Option<String>,
    read_only: bool,
}

impl ServiceClient {
    pub fn new(session: AuthenticatedSession, options: &ClientOptions) -> Result<Self, SmmError> {
        let base_url = options
            .service_url
            .clone()
            .unwrap_or_else(|| session.gateway_url().to_string());
        let base_url = base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| ConfigError::InvalidGatewayUrl {
            url: base_url.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            session,
            base_url,
            context_path: options
                .context_path
                .as_deref()
                .and_then(smm_core::normalize_context_path),
            read_only: options.read_only,
        })
    }

    pub fn session(&self) -> &AuthenticatedSession {
        &self.session
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for an already-resolved path.
    pub fn url_for(&self, resolved_path: &str) -> String {
        format!(
            "{}{}{}",
            self.base_url,
            self.context_path.as_deref().unwrap_or(""),
            resolved_path
        )
    }

    /// Resolve, police, send once, classify.
    pub async fn invoke(&self, request: ApiRequest) -> Result<Value, SmmError> {
        let ApiRequest {
            operation,
            method,
            template,
            path_args,
            query,
            body,
            deadline,
        } = request;

        let path = resolve_path(&template, &path_args)
            .map_err(|message| SmmError::invalid_argument(&operation, Some("path"), message))?;

        if self.read_only && !method.is_safe() {
            tracing::warn!(operation = %operation, method = %method, path = %path, "read-only client refused request");
            return Err(SmmError::ReadOnlyViolation {
                operation,
                method,
                path,
            });
        }

        let mut url = Url::parse(&self.url_for(&path)).map_err(|e| {
            SmmError::invalid_argument(&operation, Some("path"), format!("invalid request URL: {e}"))
        })?;
        if !query.is_empty() {
            let mut qp = url.query_pairs_mut();
            for (k, v) in &query {
                qp.append_pair(k, v);
            }
        }

        let mut builder = self.session.request(method.to_reqwest(), url);
        if let Some(body) = &body {
            builder = builder.json(body);
        }

        let started = Instant::now();
        let exchange = async {
            let response = builder.send().await?;
            let status = response.status();
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let bytes = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, content_type, bytes))
        };

        let outcome = match deadline {
            Some(limit) => match tokio::time::timeout(limit, exchange).await {
                Ok(result) => result,
                Err(_) => {
                    let err = SmmError::Transport {
                        operation,
                        method,
                        path,
                        message: format!("deadline of {} ms elapsed", limit.as_millis()),
                        source: None,
                    };
                    tracing::warn!(error = %err, "request abandoned");
                    return Err(err);
                }
            },
            None => exchange.await,
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let (status, content_type, bytes) = match outcome {
            Ok(parts) => parts,
            Err(source) => {
                let err = SmmError::Transport {
                    message: transport_message(&source),
                    operation,
                    method,
                    path,
                    source: Some(source),
                };
                tracing::warn!(error = %err, elapsed_ms, "request failed");
                return Err(err);
            }
        };

        tracing::debug!(
            operation = %operation,
            method = %method,
            path = %path,
            status = status.as_u16(),
            elapsed_ms,
            "dispatch"
        );

        classify(
            &operation,
            method,
            &path,
            status,
            content_type.as_deref(),
            &bytes,
        )
        .inspect_err(|err| tracing::warn!(error = %err, "request classified as failure"))
    }
}

/// Substitute `{placeholder}` segments from `args` in order. Each argument is
/// percent-encoded so it stays a single path segment. Empty, `.` and `..`
/// values are refused since URL normalisation would drop or collapse them.
pub fn resolve_path(template: &str, args: &[String]) -> Result<String, String> {
    let mut resolved = String::with_capacity(template.len());
    let mut remaining = args.iter();
    let mut placeholders = 0usize;
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        resolved.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| format!("unclosed placeholder in path template '{template}'"))?;
        let name = &after[..close];
        placeholders += 1;
        let value = remaining
            .next()
            .ok_or_else(|| format!("missing value for path placeholder '{{{name}}}'"))?;
        if matches!(value.as_str(), "" | "." | "..") {
            return Err(format!(
                "value '{value}' for path placeholder '{{{name}}}' is not a usable path segment"
            ));
        }
        resolved.push_str(&urlencoding::encode(value));
        rest = &after[close + 1..];
    }
    resolved.push_str(rest);

    if args.len() != placeholders {
        return Err(format!(
            "path template '{template}' takes {placeholders} argument(s), got {}",
            args.len()
        ));
    }
    if !resolved.starts_with('/') {
        resolved.insert(0, '/');
    }
    Ok(resolved)
}

/// Map one HTTP exchange onto the error taxonomy.
pub fn classify(
    operation: &str,
    method: HttpMethod,
    path: &str,
    status: StatusCode,
    content_type: Option<&str>,
    body: &[u8],
) -> Result<Value, SmmError> {
    let code = status.as_u16();

    if status.is_success() {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        return serde_json::from_slice(body).map_err(|_| SmmError::Protocol {
            operation: operation.to_string(),
            method,
            path: path.to_string(),
            detail: format!(
                "expected JSON, got {}",
                content_type.unwrap_or("a body without content type")
            ),
        });
    }

    let snippet = body_snippet(body);
    match code {
        401 | 403 => Err(SmmError::Authentication {
            operation: operation.to_string(),
            status: Some(code),
            path: Some(path.to_string()),
            detail: if snippet.is_empty() {
                format!("gateway returned HTTP {code}")
            } else {
                format!("gateway returned HTTP {code}: {snippet}")
            },
        }),
        404 => Err(SmmError::NotFound {
            operation: operation.to_string(),
            method,
            path: path.to_string(),
            detail: None,
        }),
        400..=499 => Err(SmmError::Request {
            operation: operation.to_string(),
            method,
            path: path.to_string(),
            status: code,
            body: snippet,
        }),
        500..=599 => Err(SmmError::Service {
            operation: operation.to_string(),
            method,
            path: path.to_string(),
            status: code,
            body: snippet,
        }),
        _ => Err(SmmError::Protocol {
            operation: operation.to_string(),
            method,
            path: path.to_string(),
            detail: format!("unexpected HTTP status {code}"),
        }),
    }
}

fn body_snippet(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    match text.char_indices().nth(BODY_SNIPPET_MAX_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn transport_message(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("request timed out: {err}")
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        format!("transport error: {err}")
    }
}
