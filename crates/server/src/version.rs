//! Build version information for the `version` subcommand and the MCP
//! server implementation record.

use serde::Serialize;

/// Crate version as compiled.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version metadata reported by `k-mcp version`.
///
/// `git_commit` and `build_date` are stamped by CI through the
/// `K_MCP_GIT_COMMIT` / `K_MCP_BUILD_DATE` build environment; local builds
/// report `unknown`.
#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    pub version: &'static str,
    #[serde(rename = "gitCommit")]
    pub git_commit: &'static str,
    #[serde(rename = "buildDate")]
    pub build_date: &'static str,
}

/// Returns the version information for this build.
pub fn get() -> VersionInfo {
    VersionInfo {
        version: VERSION,
        git_commit: option_env!("K_MCP_GIT_COMMIT").unwrap_or("unknown"),
        build_date: option_env!("K_MCP_BUILD_DATE").unwrap_or("unknown"),
    }
}

impl std::fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "v{} (commit {}, built {})",
            self.version, self.git_commit, self.build_date
        )
    }
}
