//! Application entry point and the MCP gateway service.

use crate::cli::{Cli, Commands};
use crate::commands;
use crate::config::TlsOptions;
use crate::discovery::DiscoveryCache;
use anyhow::Result;
use clap::Parser;
use std::sync::Arc;

/// Immutable process-wide state shared by every session and request.
pub struct GatewayState {
    /// The MCP audience checked during token verification.
    pub audience: String,
    /// TLS profile for outbound API-server connections.
    pub tls: TlsOptions,
    /// On-disk discovery cache shared across clusters.
    pub discovery: DiscoveryCache,
}

impl GatewayState {
    pub fn new(audience: String, tls: TlsOptions, discovery: DiscoveryCache) -> Self {
        Self {
            audience,
            tls,
            discovery,
        }
    }
}

/// The MCP service handed to the streamable HTTP transport, one instance
/// per session. All state is shared and immutable; per-request state lives
/// on the stack of each tool call.
#[derive(Clone)]
pub struct KubeGateway {
    pub(crate) state: Arc<GatewayState>,
}

impl KubeGateway {
    pub fn new(state: Arc<GatewayState>) -> Self {
        Self { state }
    }
}

/// The main entry point for the `k-mcp` binary.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            port,
            log_level,
            audience,
            insecure,
            certificate_authority,
            tls_server_name,
        } => commands::run::handle_run_command(
            port,
            log_level,
            audience,
            insecure,
            certificate_authority,
            tls_server_name,
        ),
        Commands::Version { output } => commands::version::handle_version_command(output),
    }
}
