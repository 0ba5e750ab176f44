use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use iris_service::{router, AppState, LogContext, PredictionService, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::parse();
    let logs = LogContext::new(&config.log());

    // Records outside a request (startup, shutdown) go to the same context.
    let _guard = tracing::dispatcher::set_default(logs.dispatch());

    info!(
        model_dir = %config.model_dir.display(),
        model_name = %config.model_name,
        "Starting iris prediction service"
    );

    let service = match PredictionService::load(&config.model_dir, &config.model_name) {
        Ok(service) => service,
        Err(e) => {
            error!(error = %e, "Model failed to load");
            return Err(e).context("loading model");
        }
    };

    let app = router(AppState {
        service: Arc::new(service),
        logs: logs.clone(),
    });

    let addr = config.addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!(addr = %addr, "Server ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Wait for shutdown signals
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received SIGTERM");
        },
    }
}
