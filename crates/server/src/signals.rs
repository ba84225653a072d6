//! Signal handling for graceful shutdown.

/// Resolves when the process receives an interrupt, hangup, or terminate
/// signal. On non-unix targets only ctrl-c is watched.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut interrupt =
            signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        let mut terminate =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut hangup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");

        tokio::select! {
            _ = interrupt.recv() => tracing::info!(target: "k_mcp::server", signal = "SIGINT", "received signal"),
            _ = terminate.recv() => tracing::info!(target: "k_mcp::server", signal = "SIGTERM", "received signal"),
            _ = hangup.recv() => tracing::info!(target: "k_mcp::server", signal = "SIGHUP", "received signal"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!(target: "k_mcp::server", signal = "ctrl-c", "received signal");
    }
}
