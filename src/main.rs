use anyhow::{Context, Result};
use axum::Router;
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;

use services::{
    consistency_client::ConsistencyClient,
    polling_controller::PollingController,
    session::{OidcSessionProvider, OidcSettings, SessionProvider, StaticSessionProvider},
    status_synchronizer::StatusSynchronizer,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;

    tracing::info!(
        "Starting zone-status against {} (concurrency {}, poll every {:?}, ttl {:?})",
        cfg.api_base_url,
        cfg.concurrency,
        cfg.poll_interval,
        cfg.status_ttl
    );

    // --- Shared HTTP client ---
    let http = reqwest::Client::builder()
        .timeout(cfg.request_timeout)
        .build()
        .context("building HTTP client")?;

    // --- Session provider ---
    let sessions: Arc<dyn SessionProvider> = match cfg.oidc.clone() {
        Some(oidc) => {
            tracing::info!("Using OIDC refresh-token sessions via {}", oidc.token_url);
            Arc::new(OidcSessionProvider::new(
                http.clone(),
                OidcSettings {
                    token_url: oidc.token_url,
                    client_id: oidc.client_id,
                },
                cfg.access_token.clone(),
                oidc.refresh_token,
            ))
        }
        None => {
            if cfg.access_token.is_none() {
                tracing::warn!("No access token configured; checks will report session loss");
            }
            Arc::new(StaticSessionProvider::new(cfg.access_token.clone()))
        }
    };

    // --- Initialize status engine ---
    let client = ConsistencyClient::new(
        http,
        cfg.api_base_url.clone(),
        cfg.bucket.clone(),
        sessions.clone(),
    );
    let synchronizer =
        StatusSynchronizer::with_limits(Arc::new(client), cfg.concurrency, cfg.status_ttl);
    let poller = PollingController::with_interval(synchronizer, sessions.clone(), cfg.poll_interval);

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(state::AppState::new(poller.clone(), sessions));

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    poller.disable().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
