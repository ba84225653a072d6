//! Handler for the `run` command.

use crate::app::GatewayState;
use crate::cli::LogLevel;
use crate::clients::load_ca_bundle;
use crate::config::TlsOptions;
use crate::discovery::DiscoveryCache;
use crate::http_transport;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Handle the `run` command: validate startup inputs, build the immutable
/// gateway state, and serve until shutdown.
pub(crate) fn handle_run_command(
    port: u16,
    log_level: LogLevel,
    audience: String,
    insecure: bool,
    certificate_authority: Option<PathBuf>,
    tls_server_name: Option<String>,
) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level.as_filter())),
        )
        .init();

    // Fail fast on an unreadable or unparseable CA bundle.
    if let Some(ca_path) = &certificate_authority {
        load_ca_bundle(ca_path)?;
    }
    if insecure {
        tracing::warn!(
            target: "k_mcp::server",
            "using insecure TLS client config; this is not recommended for production"
        );
    }

    let tls = TlsOptions {
        certificate_authority,
        insecure_skip_verify: insecure,
        server_name: tls_server_name,
    };
    let state = Arc::new(GatewayState::new(audience, tls, DiscoveryCache::new()?));

    let runtime = Runtime::new()?;
    runtime.block_on(http_transport::serve(state, port))
}
