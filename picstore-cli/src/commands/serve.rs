//! HTTP server command

use anyhow::{Context, Result};
use console::style;
use picstore::config::PicstoreConfig;
use picstore::handlers::router;
use picstore::state::AppState;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Serve uploads and static artifacts until interrupted
pub struct ServeCommand {
    config: PicstoreConfig,
}

impl ServeCommand {
    /// Create a new command instance
    pub const fn new(config: PicstoreConfig) -> Self {
        Self { config }
    }

    /// Execute the command
    pub async fn execute(self) -> Result<()> {
        let store = self
            .config
            .build_store()
            .context("Failed to prepare storage directories")?;

        if self.config.storage.reconcile_on_start {
            let report = store.reconcile().await.context("Startup reconcile failed")?;
            if !report.is_noop() {
                warn!(?report, "Repaired artifacts from an interrupted run");
            }
        }

        let shutdown = CancellationToken::new();
        let state = AppState::new(Arc::new(store), &self.config)
            .context("Failed to build HTTP client")?
            .with_shutdown(shutdown.clone());

        let address = self.config.bind_address();
        let listener = tokio::net::TcpListener::bind(&address)
            .await
            .with_context(|| format!("Failed to bind {address}"))?;

        println!(
            "{} {}",
            style("Listening on").green().bold(),
            style(format!("http://{address}")).cyan().underlined()
        );
        info!(%address, "Server started");

        axum::serve(listener, router(state))
            .with_graceful_shutdown(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Shutdown requested");
                }
                shutdown.cancel();
            })
            .await
            .context("Server error")?;

        Ok(())
    }
}
