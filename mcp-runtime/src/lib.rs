use clap::{Args, Subcommand};
use serde_json::{Value, json};
use smm_core::{ClientOptions, SessionConfig};

pub mod args;
pub mod client;
pub mod error;
pub mod redact;
pub mod server;
pub mod session;
pub mod tools;

pub use args::ToolArgs;
pub use client::{ApiRequest, HttpMethod, ServiceClient};
pub use error::SmmError;
pub use server::McpServer;
pub use session::{AuthArtifact, AuthenticatedSession, SessionBuilder};
pub use tools::{ToolRegistry, ToolSpec};

use server::to_pretty_json;

/// Tool the `check` command calls to verify the session.
const CHECK_TOOL: &str = "get_brokers";

/// Finished configuration handed over by the binary.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub session: SessionConfig,
    pub client: ClientOptions,
}

#[derive(Subcommand, Debug, Clone)]
pub enum McpCommands {
    /// Serve the tool catalog as an MCP server over stdio
    Serve,
    /// Print the tool catalog as JSON (write tools hidden in read-only mode)
    Tools,
    /// Dispatch a single tool call and print the result
    Call(CallArgs),
    /// Authenticate against the gateway and call get_brokers
    Check,
}

#[derive(Args, Debug, Clone)]
pub struct CallArgs {
    /// Tool name, e.g. get_topic_offsets
    pub tool: String,
    /// Positional arguments in the tool's declaration order
    #[arg(value_name = "ARG")]
    pub positional: Vec<String>,
    /// Arguments as a JSON object (keyword) or array (positional)
    #[arg(long = "args", value_name = "JSON", conflicts_with = "positional")]
    pub json_args: Option<String>,
}

impl CallArgs {
    fn tool_args(&self) -> Result<ToolArgs, SmmError> {
        match &self.json_args {
            Some(raw) => {
                let value: Value = serde_json::from_str(raw).map_err(|e| {
                    SmmError::invalid_argument(&self.tool, Some("args"), format!("invalid JSON: {e}"))
                })?;
                ToolArgs::from_value(value)
                    .map_err(|message| SmmError::invalid_argument(&self.tool, Some("args"), message))
            }
            None => Ok(ToolArgs::Positional(
                self.positional.iter().cloned().map(Value::String).collect(),
            )),
        }
    }
}

/// Authenticate once and wrap the session in a client.
pub async fn connect(config: RuntimeConfig) -> Result<ServiceClient, SmmError> {
    let session = SessionBuilder::new(config.session).authenticate().await?;
    ServiceClient::new(session, &config.client)
}

/// Print the catalog without touching the gateway.
pub fn print_catalog(read_only: bool) -> i32 {
    let tools = ToolRegistry::standard().definitions(read_only);
    println!(
        "{}",
        to_pretty_json(&json!({ "read_only": read_only, "tools": tools }))
    );
    0
}

pub async fn run(config: RuntimeConfig, command: McpCommands) -> i32 {
    let registry = ToolRegistry::standard();

    match command {
        McpCommands::Tools => print_catalog(config.client.read_only),
        McpCommands::Serve => {
            let client = match connect(config).await {
                Ok(client) => client,
                Err(err) => return report_error(&err),
            };
            let server = McpServer::new(client, registry);
            match server.serve_stdio().await {
                Ok(()) => 0,
                Err(err) => {
                    let payload = json!({
                        "error": "mcp_server_error",
                        "message": err,
                    });
                    eprintln!("{}", to_pretty_json(&payload));
                    1
                }
            }
        }
        McpCommands::Call(call) => {
            let outcome = async {
                let args = call.tool_args()?;
                let client = connect(config).await?;
                registry.call(&client, &call.tool, args).await
            }
            .await;
            match outcome {
                Ok(data) => {
                    println!("{}", to_pretty_json(&redact::redact(data)));
                    0
                }
                Err(err) => report_error(&err),
            }
        }
        McpCommands::Check => {
            let gateway = config.session.gateway_url().to_string();
            let outcome = async {
                let client = connect(config).await?;
                let data = registry
                    .call(&client, CHECK_TOOL, ToolArgs::default())
                    .await?;
                Ok::<_, SmmError>((client, data))
            }
            .await;
            match outcome {
                Ok((client, data)) => {
                    let brokers = data.as_array().map(Vec::len);
                    let report = json!({
                        "status": "ok",
                        "gateway": gateway,
                        "service_url": client.base_url(),
                        "strategy": client.session().strategy(),
                        "read_only": client.is_read_only(),
                        "checked_with": CHECK_TOOL,
                        "broker_count": brokers,
                    });
                    println!("{}", to_pretty_json(&report));
                    0
                }
                Err(err) => report_error(&err),
            }
        }
    }
}

/// Log the failure, print its payload on stderr and map it to an exit code.
pub fn report_error(err: &SmmError) -> i32 {
    tracing::error!(error = %err, code = err.code(), "command failed");
    eprintln!("{}", to_pretty_json(&json!(err.to_payload())));
    err.exit_code()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_cli_args_stay_strings_for_binding() {
        let call = CallArgs {
            tool: "get_topic_content".to_string(),
            positional: vec!["orders".to_string(), "0".to_string()],
            json_args: None,
        };
        assert_eq!(
            call.tool_args().unwrap(),
            ToolArgs::Positional(vec![json!("orders"), json!("0")])
        );
    }

    #[test]
    fn json_args_accept_keyword_objects() {
        let call = CallArgs {
            tool: "get_topic_offsets".to_string(),
            positional: Vec::new(),
            json_args: Some(r#"{"topic_name":"orders"}"#.to_string()),
        };
        assert!(matches!(call.tool_args().unwrap(), ToolArgs::Keyword(_)));

        let broken = CallArgs {
            json_args: Some("{".to_string()),
            ..call
        };
        assert_eq!(broken.tool_args().unwrap_err().code(), "validation_failed");
    }
}
