// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use swap_relay::{
    api::router,
    config::AppConfig,
    logging::{self, LogFormat},
    state::AppState,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    logging::init(LogFormat::from_env());

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = CancellationToken::new();
    let addr = config.bind_addr;
    let window = config.rate_limit.window;

    let state = match AppState::new(config, shutdown.clone()) {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "Failed to build upstream client");
            return ExitCode::FAILURE;
        }
    };

    info!(
        upstream = %state.config.upstream_url,
        window_ms = window.as_millis() as u64,
        rules = state.config.rate_limit.rules.len(),
        "Configuration loaded"
    );

    let sweeper = tokio::spawn(Arc::clone(&state.rate_limiter).run_sweeper(window, shutdown.clone()));

    let app = router(state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%addr, error = %e, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };

    info!("Swap relay listening on http://{addr} (docs at /docs)");

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
    .await;

    shutdown.cancel();
    let _ = sweeper.await;

    match served {
        Ok(()) => {
            info!("Swap relay stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "HTTP server failed");
            ExitCode::FAILURE
        }
    }
}

/// Resolve on Ctrl-C or SIGTERM and cancel `shutdown` so in-flight waits end.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = shutdown.cancelled() => {},
    }

    info!("Shutdown signal received");
    shutdown.cancel();
}
