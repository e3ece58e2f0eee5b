//! Shutdown signal handling.
//!
//! Resolves when the process is asked to stop (SIGINT, or SIGTERM on Unix)
//! so the binary can leave the watch loop cleanly.

use tracing::{debug, warn};

/// Signal that requested the shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// Ctrl-C / SIGINT
    Interrupt,
    /// SIGTERM
    Terminate,
}

/// Wait until a shutdown signal arrives.
pub async fn wait_for_shutdown() -> ShutdownSignal {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                debug!("Installed SIGTERM and SIGINT handlers");
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => ShutdownSignal::Interrupt,
                    _ = terminate.recv() => ShutdownSignal::Terminate,
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler, only SIGINT stops the process");
                wait_for_interrupt().await
            }
        }
    }

    #[cfg(not(unix))]
    {
        wait_for_interrupt().await
    }
}

async fn wait_for_interrupt() -> ShutdownSignal {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C, waiting forever");
        std::future::pending::<()>().await;
    }
    ShutdownSignal::Interrupt
}
