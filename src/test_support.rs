// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures for unit tests.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use serde_json::json;
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

use crate::auth::discovery::{FetchedKeys, MetadataFetcher};
use crate::auth::domain::{LocalDomain, Secret, TrustDomainConfig};
use crate::auth::{AuthGate, CachePolicy, FetchError};
use crate::state::AppState;

pub const LOCAL_SECRET: &str = "super-secret-key-1-for-local-hs256";
pub const LOCAL_ISSUER: &str = "local-issuer-1";
pub const LOCAL_AUDIENCE: &str = "local-audience-1";

/// Fetcher for configurations without a federated domain.
pub struct Unreachable;

#[async_trait]
impl MetadataFetcher for Unreachable {
    async fn fetch(&self, url: &str, _require_https: bool) -> Result<FetchedKeys, FetchError> {
        Err(FetchError::Transport {
            url: url.to_string(),
            reason: "no network in tests".to_string(),
        })
    }
}

pub fn local_domain() -> TrustDomainConfig {
    TrustDomainConfig::Local(LocalDomain {
        name: "local".to_string(),
        issuer: LOCAL_ISSUER.to_string(),
        audience: LOCAL_AUDIENCE.to_string(),
        secret: Secret::parse(LOCAL_SECRET).unwrap(),
        clock_skew: Duration::ZERO,
    })
}

pub fn local_only_state() -> AppState {
    let gate = AuthGate::new(vec![local_domain()], Arc::new(Unreachable), CachePolicy::default())
        .unwrap();
    AppState::new(gate)
}

/// HS256 token for the local domain, valid for one hour.
pub fn local_token(name: &str) -> String {
    let now = Utc::now().timestamp();
    encode(
        &Header::new(Algorithm::HS256),
        &json!({
            "unique_name": name,
            "iss": LOCAL_ISSUER,
            "aud": LOCAL_AUDIENCE,
            "nbf": now,
            "iat": now,
            "exp": now + 3600
        }),
        &EncodingKey::from_secret(LOCAL_SECRET.as_bytes()),
    )
    .unwrap()
}

/// Record the `reason` field of every event logged on this thread until the
/// guard drops.
pub fn capture_reasons() -> (Arc<Mutex<Vec<String>>>, DefaultGuard) {
    let reasons = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(ReasonLayer(Arc::clone(&reasons)));
    let guard = tracing::subscriber::set_default(subscriber);
    (reasons, guard)
}

struct ReasonLayer(Arc<Mutex<Vec<String>>>);

impl<S: tracing::Subscriber> Layer<S> for ReasonLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut reason = ReasonField(None);
        event.record(&mut reason);
        if let Some(reason) = reason.0 {
            self.0.lock().push(reason);
        }
    }
}

struct ReasonField(Option<String>);

impl Visit for ReasonField {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "reason" {
            self.0 = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn fmt::Debug) {}
}
