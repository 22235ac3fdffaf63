// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::time::Duration;

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use relational_jwtauth::{
    api::router,
    config::{AppConfig, DEFAULT_LOG_FILTER, LOG_FORMAT_ENV},
    state::AppState,
    storage::AccountDatabase,
};

/// Time allowed for in-flight requests after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match std::env::var(LOG_FORMAT_ENV).as_deref() {
        Ok("json") => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        _ => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .init(),
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(
        algorithm = %config.settings.algorithm(),
        groups_claim = config.settings.groups_claim_name(),
        mapped_groups = config.settings.group_mapping().len(),
        policy = ?config.policy,
        debug_mode = config.debug_mode,
        "Loaded JWT login configuration"
    );
    if config.debug_mode {
        tracing::warn!("Debug mode is enabled; login responses include token details");
    }

    let db_path = config.accounts_db_path();
    let accounts = match AccountDatabase::open(&db_path) {
        Ok(accounts) => accounts,
        Err(e) => {
            tracing::error!(
                path = %db_path.display(),
                error = %e,
                "Failed to open account database"
            );
            std::process::exit(1);
        }
    };
    tracing::info!(path = %db_path.display(), "Opened account database");

    let app = router(AppState::from_config(&config, accounts));
    let addr = config.bind_addr;

    let handle = Handle::new();
    let shutdown = handle.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        tracing::info!("Shutdown signal received, draining connections");
        shutdown.graceful_shutdown(Some(SHUTDOWN_GRACE));
    });

    match &config.tls {
        Some(tls) => {
            // Install the ring crypto provider for rustls (must be done before any TLS operations)
            rustls::crypto::ring::default_provider()
                .install_default()
                .expect("Failed to install rustls crypto provider");

            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                .await
                .expect("Failed to load TLS certificate and key");

            tracing::info!(%addr, "Listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .expect("HTTPS server failed");
        }
        None => {
            tracing::info!(%addr, "Listening on http (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .expect("HTTP server failed");
        }
    }
}
