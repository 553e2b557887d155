// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};

use trust_gate::api::router;
use trust_gate::auth::{AuthGate, HttpMetadataFetcher, TrustDomainConfig};
use trust_gate::config::Settings;
use trust_gate::init_tracing;
use trust_gate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env().inspect_err(|e| {
        // logging is not set up yet
        eprintln!("Failed to load configuration: {e}");
    })?;

    init_tracing(settings.log_format);

    for domain in &settings.domains {
        match domain {
            TrustDomainConfig::Local(local) => info!(
                domain = %local.name,
                issuer = %local.issuer,
                audience = %local.audience,
                "Local trust domain configured"
            ),
            TrustDomainConfig::Federated(federated) => info!(
                domain = %federated.name,
                issuer = %federated.issuer,
                audience = %federated.audience,
                discovery_url = %federated.discovery_url,
                require_https = federated.require_https,
                "Federated trust domain configured"
            ),
        }
    }

    let fetcher = Arc::new(HttpMetadataFetcher::new(settings.metadata_timeout));
    let gate = AuthGate::new(settings.domains.clone(), fetcher, settings.cache).map_err(|e| {
        error!("Invalid trust domain configuration: {}", e);
        e
    })?;

    let app = router(AppState::new(gate));

    let addr: SocketAddr = settings.bind_address().parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Trust Gate listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Trust Gate shutdown complete");

    Ok(())
}

/// Returns when SIGINT or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
