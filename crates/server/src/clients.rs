//! Per-cluster Kubernetes client construction.
//!
//! Clients are built per tool invocation from the caller's bearer token and
//! one of the API server URLs derived from it. The process-wide
//! [`TlsOptions`] supply the trust profile; discovery caching keeps repeat
//! construction cheap, and connection pooling happens in the HTTP stack
//! underneath.

use crate::config::TlsOptions;
use anyhow::{Context, Result};
use kube::Client;
use secrecy::SecretString;
use std::path::Path;

/// User agent presented to API servers, and the server-side-apply field
/// manager.
pub const USER_AGENT: &str = "k-mcp";

/// Builds a dynamic client for `api_server_url` authenticating with the
/// caller's bearer token.
pub fn build_cluster_client(
    tls: &TlsOptions,
    bearer_token: &str,
    api_server_url: &str,
) -> Result<Client> {
    let cluster_url: http::Uri = api_server_url
        .parse()
        .with_context(|| format!("invalid api server url {api_server_url:?}"))?;

    let mut config = kube::Config::new(cluster_url);
    config.auth_info.token = Some(SecretString::from(bearer_token.to_string()));
    config.accept_invalid_certs = tls.insecure_skip_verify;
    config.tls_server_name = tls.server_name.clone();
    if let Some(ca_path) = &tls.certificate_authority {
        config.root_cert = Some(load_ca_bundle(ca_path)?);
    }

    let client = kube::client::ClientBuilder::try_from(config)
        .with_context(|| format!("failed to build client for {api_server_url}"))?
        .with_layer(&tower_http::set_header::SetRequestHeaderLayer::overriding(
            http::header::USER_AGENT,
            http::HeaderValue::from_static(USER_AGENT),
        ))
        .build();
    Ok(client)
}

/// Reads a PEM CA bundle into the DER certificates `kube::Config` expects.
pub fn load_ca_bundle(path: &Path) -> Result<Vec<Vec<u8>>> {
    let data = std::fs::read(path)
        .with_context(|| format!("failed to read CA certificate from {}", path.display()))?;
    let mut reader = std::io::Cursor::new(data);
    let certs: Vec<Vec<u8>> = rustls_pemfile::certs(&mut reader)
        .map(|cert| cert.map(|c| c.as_ref().to_vec()))
        .collect::<std::io::Result<_>>()
        .with_context(|| format!("failed to parse CA certificate from {}", path.display()))?;
    anyhow::ensure!(
        !certs.is_empty(),
        "no certificates found in {}",
        path.display()
    );
    Ok(certs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // Self-signed test certificate, syntactically valid PEM.
    const TEST_CERT: &str = "-----BEGIN CERTIFICATE-----\n\
MIIBhTCCASugAwIBAgIQIRi6zePL6mKjOipn+dNuaTAKBggqhkjOPQQDAjASMRAw\n\
DgYDVQQKEwdBY21lIENvMB4XDTE3MTAyMDE5NDMwNloXDTE4MTAyMDE5NDMwNlow\n\
EjEQMA4GA1UEChMHQWNtZSBDbzBZMBMGByqGSM49AgEGCCqGSM49AwEHA0IABD0d\n\
7VNhbWvZLWPuj/RtHFjvtJBEwOkhbN/BnnE8rnZR8+sbwnc/KhCk3FhnpHZnQz7B\n\
5aETbbIgmuvewdjvSBSjYzBhMA4GA1UdDwEB/wQEAwICpDATBgNVHSUEDDAKBggr\n\
BgEFBQcDATAPBgNVHRMBAf8EBTADAQH/MCkGA1UdEQQiMCCCDmxvY2FsaG9zdDo1\n\
NDUzgg4xMjcuMC4wLjE6NTQ1MzAKBggqhkjOPQQDAgNIADBFAiEA2zpJEPQyz6/l\n\
Wf86aX6PepsntZv2GYlA5UpabfT2EZICICpJ5h/iI+i341gBmLiAFQOyTDT+/wQc\n\
6MF9+Yw1Yy0t\n\
-----END CERTIFICATE-----\n";

    #[test]
    fn loads_pem_ca_bundle() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(TEST_CERT.as_bytes()).expect("write cert");

        let certs = load_ca_bundle(file.path()).expect("bundle should parse");
        assert_eq!(certs.len(), 1);
        assert!(!certs[0].is_empty());
    }

    #[test]
    fn rejects_missing_ca_file() {
        let err = load_ca_bundle(Path::new("/nonexistent/ca.crt")).expect_err("should fail");
        assert!(err.to_string().contains("failed to read CA certificate"));
    }

    #[test]
    fn rejects_pem_without_certificates() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(b"not a certificate").expect("write junk");

        assert!(load_ca_bundle(file.path()).is_err());
    }

    #[test]
    fn rejects_invalid_api_server_url() {
        let tls = TlsOptions::default();
        assert!(build_cluster_client(&tls, "token", "http://exa mple").is_err());
    }

    #[tokio::test]
    async fn builds_client_for_valid_url() {
        let tls = TlsOptions {
            insecure_skip_verify: true,
            ..Default::default()
        };
        assert!(build_cluster_client(&tls, "token", "https://127.0.0.1:6443").is_ok());
    }
}
