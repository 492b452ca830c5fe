//! Server setup and lifecycle management

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::routes::{build_router, AppState, ENRICH_ROUTE};
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Enrichment server
pub struct Server {
    config: ServiceConfig,
    state: AppState,
}

impl Server {
    /// Build the scoring client and pipeline. Fails before binding if any
    /// setting or credential is unusable.
    pub fn new(config: ServiceConfig) -> Result<Self, ServiceError> {
        let state = AppState::bootstrap(&config)?;
        Ok(Self { config, state })
    }

    /// Serve until Ctrl+C or SIGTERM, letting in-flight requests finish.
    pub async fn run(self) -> Result<(), ServiceError> {
        let addr = self.config.server.listen_addr;
        let app = build_router(self.state, &self.config.server);

        let listener = TcpListener::bind(addr).await?;
        info!(
            addr = %listener.local_addr()?,
            route = ENRICH_ROUTE,
            mode = ?self.config.output.mode,
            "enricher listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("enricher shut down");
        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("received terminate signal, initiating graceful shutdown");
        }
    }
}
