// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Trust Gate - bearer-token authentication for local and federated issuers
//!
//! This crate validates JWT bearer tokens from two kinds of trust domain: a
//! local issuer sharing an HMAC secret with this service, and an external
//! OpenID Connect provider whose signing keys are discovered and cached.
//!
//! ## Modules
//!
//! - `auth` - Trust domains, key store, validation and the Axum boundary
//! - `api` - HTTP API handlers (Axum)
//! - `config` - Environment-driven settings
//! - `error` - Configuration errors

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{LogFormat, DEFAULT_LOG_FILTER};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}
