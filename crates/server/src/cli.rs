//! Command-line interface for the `k-mcp` application.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Log verbosity for the server.
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive for the tracing env-filter.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter())
    }
}

/// Command-line interface for the `k-mcp` application.
#[derive(Debug, Parser)]
#[command(
    name = "k-mcp",
    about = "MCP server to interact with Kubernetes clusters",
    version = crate::version::VERSION
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available `k-mcp` commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Starts the MCP server over streamable HTTP.
    #[command(after_help = "\
Examples:
  # Run with defaults
  k-mcp run

  # Run with custom port and verbose logging
  k-mcp run --port=8080 --log-level=debug

  # Run with TLS configuration for the API servers
  k-mcp run --certificate-authority=/path/to/ca.crt --tls-server-name=my-server")]
    Run {
        /// Port for the streamable HTTP listener.
        #[arg(long, default_value_t = 8080)]
        port: u16,
        /// Log level.
        #[arg(long, value_enum, default_value_t = LogLevel::Info)]
        log_level: LogLevel,
        /// JWT audience identifying this server in incoming tokens.
        #[arg(long, default_value = "k-mcp")]
        audience: String,
        /// Skip TLS certificate verification when connecting to Kubernetes
        /// API servers.
        #[arg(long, default_value_t = false)]
        insecure: bool,
        /// Path to a PEM CA bundle for API-server TLS.
        #[arg(long)]
        certificate_authority: Option<PathBuf>,
        /// Server name to use for TLS (SNI override).
        #[arg(long)]
        tls_server_name: Option<String>,
    },
    /// Prints the version information.
    Version {
        /// Output format. One of: (json).
        #[arg(short = 'o', long = "output")]
        output: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn run_defaults() {
        let cli = Cli::try_parse_from(["k-mcp", "run"]).expect("run should parse");
        match cli.command {
            Commands::Run {
                port,
                log_level,
                audience,
                insecure,
                certificate_authority,
                tls_server_name,
            } => {
                assert_eq!(port, 8080);
                assert_eq!(log_level, LogLevel::Info);
                assert_eq!(audience, "k-mcp");
                assert!(!insecure);
                assert!(certificate_authority.is_none());
                assert!(tls_server_name.is_none());
            }
            other => panic!("expected run command, got {other:?}"),
        }
    }

    #[test]
    fn run_with_flags() {
        let cli = Cli::try_parse_from([
            "k-mcp",
            "run",
            "--port=9090",
            "--log-level=debug",
            "--audience=my-gateway",
            "--insecure",
            "--certificate-authority=/tmp/ca.crt",
            "--tls-server-name=override",
        ])
        .expect("run with flags should parse");
        match cli.command {
            Commands::Run {
                port,
                log_level,
                audience,
                insecure,
                certificate_authority,
                tls_server_name,
            } => {
                assert_eq!(port, 9090);
                assert_eq!(log_level, LogLevel::Debug);
                assert_eq!(audience, "my-gateway");
                assert!(insecure);
                assert_eq!(
                    certificate_authority.as_deref(),
                    Some(std::path::Path::new("/tmp/ca.crt"))
                );
                assert_eq!(tls_server_name.as_deref(), Some("override"));
            }
            other => panic!("expected run command, got {other:?}"),
        }
    }

    #[test]
    fn non_integer_port_is_rejected() {
        assert!(Cli::try_parse_from(["k-mcp", "run", "--port=eighty"]).is_err());
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        assert!(Cli::try_parse_from(["k-mcp", "run", "--log-level=verbose"]).is_err());
    }

    #[test]
    fn version_accepts_json_output() {
        let cli = Cli::try_parse_from(["k-mcp", "version", "-o", "json"])
            .expect("version should parse");
        match cli.command {
            Commands::Version { output } => assert_eq!(output.as_deref(), Some("json")),
            other => panic!("expected version command, got {other:?}"),
        }
    }
}
