//! HTTP surface: `/mcp` (bearer-gated streamable HTTP) and `/health`.
//!
//! The `/mcp` route is wrapped outside-in by bearer-token enforcement and
//! request logging. Token verification happens once per request here; the
//! derived [`TokenContext`] rides the request extensions into the MCP
//! handler so tools never re-parse the token.

use crate::app::{GatewayState, KubeGateway};
use crate::token::verify_token;
use anyhow::{Context, Result};
use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// How long outstanding requests get to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Builds the application router.
pub fn router(state: Arc<GatewayState>) -> Router {
    let audience: Arc<str> = state.audience.clone().into();

    let session_manager = Arc::new(LocalSessionManager::default());
    let service_state = state.clone();
    let mcp_service = StreamableHttpService::new(
        move || Ok(KubeGateway::new(service_state.clone())),
        session_manager,
        StreamableHttpServerConfig::default(),
    );

    // Layer order: bearer auth outermost, then request logging, then the
    // MCP handler.
    let mcp_routes = Router::new()
        .route_service("/mcp", mcp_service)
        .layer(axum::middleware::from_fn(request_logging_middleware))
        .layer(axum::middleware::from_fn(move |req, next| {
            let audience = audience.clone();
            async move { bearer_auth_middleware(audience, req, next).await }
        }));

    Router::new().route("/health", get(health)).merge(mcp_routes)
}

/// Starts the server and blocks until shutdown.
pub async fn serve(state: Arc<GatewayState>, port: u16) -> Result<()> {
    let app = router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let handle = axum_server::Handle::new();

    tracing::info!(target: "k_mcp::server", %addr, "starting streamable HTTP server");

    let server = axum_server::bind(addr)
        .handle(handle.clone())
        .serve(app.into_make_service());
    let mut server_task = tokio::spawn(server);

    tokio::select! {
        result = &mut server_task => {
            result.context("server task panicked")?.context("HTTP server error")?;
        }
        _ = crate::signals::shutdown_signal() => {
            tracing::info!(target: "k_mcp::server", "shutting down HTTP server gracefully");
            handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
            if let Err(e) = server_task
                .await
                .context("server task panicked")?
                .context("HTTP server shutdown error")
            {
                tracing::error!(target: "k_mcp::server", error = %e, "HTTP server shutdown error");
                return Err(e);
            }
        }
    }

    tracing::info!(target: "k_mcp::server", "HTTP server shutdown complete");
    Ok(())
}

async fn health() -> impl IntoResponse {
    let now = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    Json(json!({"status": "healthy", "time": now}))
}

/// Verifies the bearer token and attaches the derived [`TokenContext`] to
/// the request. Failures answer 401 with a `WWW-Authenticate` challenge per
/// the MCP authorization convention.
async fn bearer_auth_middleware(audience: Arc<str>, mut req: Request, next: Next) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let Some(token) = token else {
        tracing::debug!(target: "k_mcp::http::auth", "missing or malformed Authorization header");
        return unauthorized("missing bearer token");
    };

    match verify_token(token, &audience) {
        Ok(context) => {
            tracing::debug!(
                target: "k_mcp::http::auth",
                clusters = context.api_server_urls.len(),
                "bearer token verified"
            );
            req.extensions_mut().insert(context);
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!(target: "k_mcp::http::auth", error = %e, "bearer token rejected");
            unauthorized(&e.to_string())
        }
    }
}

fn unauthorized(description: &str) -> Response {
    let challenge = format!(
        "Bearer error=\"invalid_token\", error_description=\"{}\"",
        description.replace('"', "'")
    );
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, challenge)],
        "Invalid or missing bearer token",
    )
        .into_response()
}

async fn request_logging_middleware(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    tracing::debug!(target: "k_mcp::http", %method, path, "[REQUEST]");

    let response = next.run(req).await;

    tracing::debug!(
        target: "k_mcp::http",
        %method,
        path,
        status = response.status().as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        "[RESPONSE]"
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use tower::ServiceExt;

    fn guarded_test_router(audience: &str) -> Router {
        let audience: Arc<str> = audience.into();
        Router::new()
            .route("/test", get(|| async { "OK" }))
            .layer(axum::middleware::from_fn(move |req, next| {
                let audience = audience.clone();
                async move { bearer_auth_middleware(audience, req, next).await }
            }))
    }

    fn mint_token(aud: serde_json::Value) -> String {
        use jsonwebtoken::{encode, EncodingKey, Header};
        let exp = OffsetDateTime::now_utc().unix_timestamp() + 3600;
        encode(
            &Header::default(),
            &json!({"exp": exp, "aud": aud}),
            &EncodingKey::from_secret(b"test-secret"),
        )
        .expect("encode token")
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized_with_challenge() {
        let app = guarded_test_router("k-mcp");
        let req = Request::builder()
            .uri("/test")
            .body(Body::empty())
            .expect("request");

        let response = app.oneshot(req).await.expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let challenge = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .expect("challenge header")
            .to_str()
            .expect("header text");
        assert!(challenge.starts_with("Bearer error=\"invalid_token\""));
    }

    #[tokio::test]
    async fn garbage_token_is_unauthorized() {
        let app = guarded_test_router("k-mcp");
        let req = Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, "Bearer not-a-jwt")
            .body(Body::empty())
            .expect("request");

        let response = app.oneshot(req).await.expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn token_without_cluster_audiences_is_unauthorized() {
        let app = guarded_test_router("k-mcp");
        let token = mint_token(json!(["k-mcp"]));
        let req = Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .expect("request");

        let response = app.oneshot(req).await.expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn valid_token_passes_through() {
        let app = guarded_test_router("k-mcp");
        let token = mint_token(json!(["https://c1", "k-mcp"]));
        let req = Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .expect("request");

        let response = app.oneshot(req).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn basic_auth_is_rejected() {
        let app = guarded_test_router("k-mcp");
        let req = Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
            .body(Body::empty())
            .expect("request");

        let response = app.oneshot(req).await.expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
