mod app;
mod config;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use tokio::signal;
use tracing_subscriber::EnvFilter;

use crate::state::{AppState, build_http_client};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let http_client = match build_http_client() {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "failed to build upstream HTTP client");
            return;
        }
    };

    let gamification_url = config::gamification_url();
    let multiplication_url = config::multiplication_url();
    let refresh_interval = config::refresh_interval();
    tracing::info!(
        %gamification_url,
        %multiplication_url,
        refresh_interval_secs = refresh_interval.as_secs(),
        "Starting leaderboard server"
    );

    let state = AppState::new(
        http_client,
        gamification_url,
        multiplication_url,
        refresh_interval,
    );

    let refresher = Arc::clone(&state.refresher);
    state.scheduler.start(refresh_interval, move || {
        let refresher = Arc::clone(&refresher);
        async move {
            refresher.refresh().await;
        }
    });

    let scheduler = Arc::clone(&state.scheduler);
    let app = app::build_app(state);

    let addr = format!("0.0.0.0:{}", config::server_port());
    tracing::info!("Leaderboard server listening on {addr}");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "failed to bind TCP listener");
            scheduler.stop().await;
            return;
        }
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server failed");
    }

    scheduler.stop().await;
    tracing::info!("Server shut down gracefully");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
