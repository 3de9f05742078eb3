use std::path::PathBuf;

use clap::{ArgAction, Parser};
use clap::builder::BoolishValueParser;
use smm_core::{AuthMode, ClientOptions, ConfigError, CredentialSources, SessionConfig};
use smm_mcp_runtime::{McpCommands, RuntimeConfig, SmmError, print_catalog, report_error, run};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "smm-mcp",
    version,
    about = "Streams Messaging Manager tools behind a Knox gateway, served over MCP stdio"
)]
struct Cli {
    /// Load environment variables from this file instead of ./.env
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Knox gateway URL that fronts the SMM API
    #[arg(long, env = "KNOX_GATEWAY_URL", global = true)]
    gateway_url: Option<String>,

    /// SMM API base URL (defaults to the gateway URL)
    #[arg(long, env = "SMM_API_BASE", global = true)]
    service_url: Option<String>,

    /// Path prefix inserted before every API path
    #[arg(long, env = "SMM_PROXY_CONTEXT_PATH", global = true)]
    context_path: Option<String>,

    /// Credential form: auto, token, cookie, basic or token-exchange
    #[arg(long, env = "KNOX_AUTH_MODE", default_value = "auto", global = true)]
    auth_mode: AuthMode,

    /// Knox bearer token (JWT)
    #[arg(long, env = "KNOX_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Session cookie; a bare value is sent as hadoop-jwt=<value>
    #[arg(long, env = "KNOX_COOKIE", hide_env_values = true, global = true)]
    cookie: Option<String>,

    /// Username for HTTP Basic
    #[arg(long, env = "KNOX_USER", global = true)]
    user: Option<String>,

    /// Password for HTTP Basic
    #[arg(long, env = "KNOX_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Knox token endpoint for passcode exchange (absolute, or relative to the gateway)
    #[arg(long, env = "KNOX_TOKEN_ENDPOINT", global = true)]
    token_endpoint: Option<String>,

    /// Passcode token exchanged at the token endpoint
    #[arg(long, env = "KNOX_PASSCODE_TOKEN", hide_env_values = true, global = true)]
    passcode_token: Option<String>,

    /// Verify the gateway's TLS certificate
    #[arg(
        long,
        env = "KNOX_VERIFY_SSL",
        default_value = "true",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    verify_tls: bool,

    /// Per-request timeout in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECONDS", default_value_t = smm_core::DEFAULT_TIMEOUT_SECS, global = true)]
    timeout_seconds: u64,

    /// Refuse every non-GET/HEAD request and hide write tools
    #[arg(
        long,
        env = "SMM_READONLY",
        default_value = "true",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    read_only: bool,

    #[command(subcommand)]
    command: McpCommands,
}

impl Cli {
    fn credential_sources(&self) -> CredentialSources {
        CredentialSources {
            token: self.token.clone(),
            cookie: self.cookie.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            token_endpoint: self.token_endpoint.clone(),
            passcode_token: self.passcode_token.clone(),
        }
    }

    fn client_options(&self) -> ClientOptions {
        ClientOptions::default()
            .with_service_url(self.service_url.as_deref())
            .with_context_path(self.context_path.as_deref())
            .with_read_only(self.read_only)
    }

    fn runtime_config(&self) -> Result<RuntimeConfig, ConfigError> {
        let gateway_url = self
            .gateway_url
            .as_deref()
            .ok_or(ConfigError::MissingGatewayUrl)?;

        let sources = self.credential_sources();
        let ignored = sources.ignored(self.auth_mode);
        if !ignored.is_empty() {
            tracing::info!(
                auth_mode = ?self.auth_mode,
                ignored = ?ignored,
                "explicit auth mode ignores other configured credentials"
            );
        }
        let credential = sources.resolve(self.auth_mode)?;

        let session = SessionConfig::new(gateway_url, credential)?
            .with_verify_tls(self.verify_tls)
            .with_timeout_secs(self.timeout_seconds)?;

        Ok(RuntimeConfig {
            session,
            client: self.client_options(),
        })
    }
}

#[tokio::main]
async fn main() {
    let env_loaded = load_env(env_file_arg());

    // stdout carries the MCP channel, logs go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "smm_mcp=info,smm_mcp_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    if let Err(err) = env_loaded {
        std::process::exit(report_error(&SmmError::from(err)));
    }

    let cli = Cli::parse();
    if let Some(path) = &cli.env_file {
        tracing::debug!(path = %path.display(), "environment file applied");
    }

    if matches!(cli.command, McpCommands::Tools) {
        std::process::exit(print_catalog(cli.read_only));
    }

    let config = match cli.runtime_config() {
        Ok(config) => config,
        Err(err) => std::process::exit(report_error(&SmmError::from(err))),
    };

    let code = run(config, cli.command).await;
    std::process::exit(code);
}

/// A missing `./.env` is fine; an explicit `--env-file` has to load.
fn load_env(env_file: Option<PathBuf>) -> Result<(), ConfigError> {
    match env_file {
        Some(path) => dotenvy::from_path(&path)
            .map(|_| ())
            .map_err(|e| ConfigError::EnvFile {
                path: path.display().to_string(),
                reason: e.to_string(),
            }),
        None => {
            let _ = dotenvy::dotenv();
            Ok(())
        }
    }
}

/// `--env-file` has to be honoured before clap reads env fallbacks.
fn env_file_arg() -> Option<PathBuf> {
    let mut args = std::env::args_os().skip(1);
    while let Some(arg) = args.next() {
        let arg = arg.to_string_lossy().into_owned();
        if arg == "--env-file" {
            return args.next().map(PathBuf::from);
        }
        if let Some(path) = arg.strip_prefix("--env-file=") {
            return Some(PathBuf::from(path));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use smm_core::GatewayCredential;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["smm-mcp"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn flags_build_a_basic_auth_config() {
        let cli = parse(&[
            "--gateway-url",
            "https://host:443/ctx",
            "--auth-mode",
            "basic",
            "--user",
            "ibrooks",
            "--password",
            "secret",
            "--read-only",
            "false",
            "check",
        ]);
        let config = cli.runtime_config().unwrap();
        assert_eq!(config.session.gateway_url(), "https://host:443/ctx");
        assert_eq!(
            config.session.credential(),
            &GatewayCredential::BasicAuth {
                user: "ibrooks".into(),
                password: "secret".into()
            }
        );
        assert!(!config.client.read_only);
    }

    #[test]
    fn zero_timeout_is_a_configuration_error() {
        let cli = parse(&[
            "--gateway-url",
            "https://gw",
            "--auth-mode",
            "token",
            "--token",
            "jwt",
            "--timeout-seconds",
            "0",
            "check",
        ]);
        assert_eq!(cli.runtime_config().unwrap_err(), ConfigError::InvalidTimeout);
    }

    #[test]
    fn unreadable_env_file_is_a_configuration_error() {
        let err = load_env(Some(PathBuf::from("/nonexistent/smm-mcp/.env"))).unwrap_err();
        assert!(matches!(err, ConfigError::EnvFile { ref path, .. } if path == "/nonexistent/smm-mcp/.env"));
        assert_eq!(SmmError::from(err).exit_code(), 4);
    }

    #[test]
    fn env_file_flag_is_found_before_parsing() {
        let cli = parse(&["--env-file", "/tmp/smm.env", "tools"]);
        assert_eq!(cli.env_file, Some(PathBuf::from("/tmp/smm.env")));
    }
}
