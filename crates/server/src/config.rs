//! Process-wide TLS configuration for outbound API-server connections.
//!
//! Set once at startup from CLI flags and injected wherever cluster clients
//! are built; never mutated afterwards.

use std::path::PathBuf;

/// TLS profile applied to every outbound Kubernetes API-server connection.
///
/// When both flags are given, `insecure_skip_verify` wins over
/// `certificate_authority`.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// Path to a PEM CA bundle used to verify API-server certificates.
    pub certificate_authority: Option<PathBuf>,
    /// Skip certificate verification entirely.
    pub insecure_skip_verify: bool,
    /// Override the SNI server name presented during the handshake.
    pub server_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_secure() {
        let tls = TlsOptions::default();
        assert!(!tls.insecure_skip_verify);
        assert!(tls.certificate_authority.is_none());
        assert!(tls.server_name.is_none());
    }
}
