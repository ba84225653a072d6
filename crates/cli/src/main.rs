//! Command-line entry point for `k-mcp`.
//!
//! This crate is the executable shell; all functionality lives in the
//! `k-mcp-server` crate.

fn main() -> anyhow::Result<()> {
    k_mcp_server::run()
}
