//! Graceful shutdown coordination.
//!
//! One coordinator per process: it owns the root `CancellationToken` that
//! every request-scoped token is derived from, listens for SIGTERM/SIGINT,
//! and bounds the drain of in-flight requests with a total timeout.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Total maximum drain time after the signal before giving up on
    /// stragglers.
    pub total_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            total_timeout: Duration::from_secs(45),
        }
    }
}

impl ShutdownConfig {
    pub fn with_total_timeout(mut self, timeout_secs: u64) -> Self {
        self.total_timeout = Duration::from_secs(timeout_secs);
        self
    }
}

pub struct ShutdownCoordinator {
    config: ShutdownConfig,
    token: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new(config: ShutdownConfig) -> Self {
        Self {
            config,
            token: CancellationToken::new(),
        }
    }

    /// Root token; request-scoped tokens are children of this one so a
    /// process shutdown cancels every in-flight enumeration.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Resolve when SIGTERM/SIGINT arrives (or the token is cancelled
    /// programmatically, e.g. from tests), leaving the token cancelled.
    pub async fn wait_for_signal(&self) {
        let token = self.token.clone();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
                        _ = sigterm.recv() => info!("received SIGTERM"),
                        _ = token.cancelled() => {}
                    }
                }
                Err(error) => {
                    warn!(%error, "failed to install SIGTERM handler");
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
                        _ = token.cancelled() => {}
                    }
                }
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("received ctrl-c"),
                _ = token.cancelled() => {}
            }
        }

        self.token.cancel();
    }

    /// Run the server future to completion. Once the token is cancelled the
    /// remaining drain is bounded by the configured budget; stragglers are
    /// abandoned with a warning rather than holding the process open.
    pub async fn supervise(
        self: &Arc<Self>,
        server: impl Future<Output = std::io::Result<()>>,
    ) -> Result<()> {
        tokio::pin!(server);
        tokio::select! {
            result = &mut server => {
                result?;
            }
            _ = self.token.cancelled() => {
                info!(
                    drain_secs = self.config.total_timeout.as_secs(),
                    "shutting down, draining in-flight requests"
                );
                match timeout(self.config.total_timeout, &mut server).await {
                    Ok(result) => result?,
                    Err(_) => warn!(
                        total_secs = self.config.total_timeout.as_secs(),
                        "shutdown budget exceeded, abandoning stragglers"
                    ),
                }
            }
        }
        Ok(())
    }
}
