//! Public entry point for the `k-mcp` server crate.
//!
//! The gateway exposes a small MCP tool surface (`resource_list`,
//! `resource_get`, `resource_apply`) in front of one or more Kubernetes API
//! servers. Authentication is exclusively by bearer JWT: the token's
//! audience list names both this server and every target cluster, so one
//! tool call fans out across all of the caller's clusters.
//!
//! Modules:
//!
//! - `app`: CLI dispatch and the MCP gateway service.
//! - `clients`: per-cluster Kubernetes client construction.
//! - `discovery`: server resource discovery with an on-disk cache.
//! - `resolver`: loose resource names to fully qualified API resources.
//! - `tools`: the three tool handlers.
//! - `handler`: the MCP `ServerHandler` wiring.
//! - `http_transport`: routes, auth middleware, graceful shutdown.

mod app;
mod clients;
mod commands;
mod handler;
mod tools;

/// Command-line interface.
pub mod cli;
/// Outbound TLS configuration.
pub mod config;
/// Discovery cache and resource listing.
pub mod discovery;
/// Elicitation seam between handlers and the MCP session.
pub mod elicit;
/// HTTP routes and server lifecycle.
pub mod http_transport;
/// Resource name resolution.
pub mod resolver;
/// Signal handling for graceful shutdown.
pub mod signals;
/// Bearer token verification.
pub mod token;
/// Build version information.
pub mod version;

#[cfg(test)]
pub(crate) mod test_support;

pub use app::{run, GatewayState};
