//! Shared wiremock fixtures for the runtime integration tests.

#![allow(dead_code)]

use serde_json::Value;
use smm_core::{ClientOptions, GatewayCredential, SessionConfig};
use smm_mcp_runtime::{AuthenticatedSession, ServiceClient, SessionBuilder};
use wiremock::{MockServer, Request};

pub const TEST_TOKEN: &str = "eyJhbGciOiJSUzI1NiJ9.test.sig";

pub fn bearer() -> GatewayCredential {
    GatewayCredential::BearerToken(TEST_TOKEN.to_string())
}

pub fn basic(user: &str, password: &str) -> GatewayCredential {
    GatewayCredential::BasicAuth {
        user: user.to_string(),
        password: password.to_string(),
    }
}

pub async fn session_for(base_url: &str, credential: GatewayCredential) -> AuthenticatedSession {
    let config = SessionConfig::new(base_url, credential).expect("valid session config");
    SessionBuilder::new(config)
        .authenticate()
        .await
        .expect("session should authenticate")
}

/// Client against the mock server with writes allowed.
pub async fn writable_client(server: &MockServer, credential: GatewayCredential) -> ServiceClient {
    client_with(server, credential, ClientOptions::default().with_read_only(false)).await
}

pub async fn client_with(
    server: &MockServer,
    credential: GatewayCredential,
    options: ClientOptions,
) -> ServiceClient {
    let session = session_for(&server.uri(), credential).await;
    ServiceClient::new(session, &options).expect("valid client options")
}

pub async fn recorded(server: &MockServer) -> Vec<Request> {
    server
        .received_requests()
        .await
        .expect("request recording is enabled")
}

pub fn header_value<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
    request.headers.get(name).and_then(|value| value.to_str().ok())
}

pub fn body_json(request: &Request) -> Value {
    serde_json::from_slice(&request.body).expect("request body is JSON")
}
