// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::collections::BTreeMap;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::auth::{KeyStatus, TrustDomainConfig};
use crate::state::AppState;

/// Health check response with individual component status.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    /// Individual health checks and their results.
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// Signing key status per federated trust domain
    /// ("ok", "stale" or "unavailable").
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub signing_keys: BTreeMap<String, String>,
}

/// Simple health check response for liveness probes.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Key status of every federated domain.
///
/// A domain with nothing cached gets one fetch attempt, so a fresh instance
/// becomes ready without waiting for its first token.
async fn check_signing_keys(state: &AppState) -> BTreeMap<String, KeyStatus> {
    let store = state.gate.key_store();
    let mut statuses = BTreeMap::new();

    for domain in state.gate.domains() {
        let TrustDomainConfig::Federated(federated) = domain else {
            continue;
        };
        let mut status = store.status(&federated.name);
        if status == KeyStatus::Unavailable {
            // failure is reported through the status below
            let _ = store.get(&federated.name).await;
            status = store.status(&federated.name);
        }
        statuses.insert(federated.name.clone(), status);
    }

    statuses
}

/// Health check endpoint handler.
///
/// Returns 200 if all checks pass, 503 if any check fails.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let keys = check_signing_keys(&state).await;
    let all_ok = keys.values().all(|s| *s != KeyStatus::Unavailable);

    let response = ReadyResponse {
        status: if all_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            signing_keys: keys
                .into_iter()
                .map(|(name, status)| (name, status.as_str().to_string()))
                .collect(),
        },
    };

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

/// Liveness probe handler.
///
/// Always returns 200 if the process is running.
/// Does not check dependencies - use readiness for that.
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness probe handler.
///
/// Returns 200 only if every federated domain has usable signing keys.
pub async fn readiness(state: State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    health(state).await
}
