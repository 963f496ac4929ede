pub mod auth;
pub mod commands;
pub mod config;
pub mod endpoints;
pub mod envelope;
pub mod error;
pub mod health;
pub mod ident;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod query;
pub mod server;
pub mod shutdown;
pub mod state;
pub mod store;
pub mod upsert;
pub mod utils;

pub use config::{CliArgs, ServerConfig};
pub use error::{OcpiError, OcpiStatus};
pub use logging::{LoggingConfig, init_logging};
pub use server::build_router;
pub use shutdown::{ShutdownConfig, ShutdownCoordinator};
pub use state::AppState;

use anyhow::Result;
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::net::TcpListener;

pub async fn run_server(config: ServerConfig) -> Result<()> {
    let config = Arc::new(config);

    let shutdown_config =
        ShutdownConfig::default().with_total_timeout(config.graceful_shutdown_timeout_secs);
    let coordinator = Arc::new(ShutdownCoordinator::new(shutdown_config));

    let state = Arc::new(AppState::new(config.clone(), coordinator.token())?);

    tracing::info!(
        bind = %config.http_bind_address,
        access_bindings = state.bindings().len(),
        open_modules = ?config.open_modules,
        allow_downgrades = config.allow_downgrades,
        "starting OCPI party server",
    );
    if state.bindings().is_empty() && config.open_modules.is_empty() {
        tracing::warn!("no access bindings provisioned and no open modules: every request will be denied");
    }

    let router = build_router(state.clone());
    let listener = TcpListener::bind(config.http_bind_address).await?;
    let actual_addr = listener.local_addr()?;
    tracing::info!(bind = %actual_addr, "listening");

    let signal_coordinator = coordinator.clone();
    let server = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            signal_coordinator.wait_for_signal().await;
        })
        .into_future();

    coordinator.supervise(server).await?;
    tracing::info!(requests = state.request_count(), "server stopped");
    Ok(())
}
