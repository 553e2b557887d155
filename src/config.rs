// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Settings are read from the environment once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `LOCAL_JWT_ISSUER` | Local domain issuer | Local domain disabled |
//! | `LOCAL_JWT_AUDIENCE` | Local domain audience | Local domain disabled |
//! | `LOCAL_JWT_SECRET` | HMAC secret, UTF-8 or `base64:<...>`, at least 32 bytes | Local domain disabled |
//! | `LOCAL_JWT_CLOCK_SKEW_SECS` | Local `exp`/`nbf` tolerance | `0` |
//! | `OIDC_AUTHORITY` | OpenID Connect authority URL | Federated domain disabled |
//! | `OIDC_AUDIENCE` | Expected audience | Federated domain disabled |
//! | `OIDC_ISSUER` | Expected issuer | authority, verbatim |
//! | `OIDC_DISCOVERY_URL` | Discovery document URL | `<authority>/.well-known/openid-configuration` |
//! | `OIDC_REQUIRE_HTTPS_METADATA` | Refuse non-HTTPS metadata URLs | `true` |
//! | `OIDC_CLOCK_SKEW_SECS` | Federated `exp`/`nbf` tolerance | `0` |
//! | `JWKS_CACHE_TTL_SECS` | Key set lifetime (and `max-age` cap) | `86400` |
//! | `JWKS_MAX_STALENESS_SECS` | Stale key use after failed refreshes | `3600` |
//! | `JWKS_RETRY_BACKOFF_SECS` | Pause between failed refreshes | `30` |
//! | `JWKS_MIN_REFRESH_INTERVAL_SECS` | Unknown-`kid` refresh rate limit | `30` |
//! | `METADATA_TIMEOUT_SECS` | Timeout per metadata request | `10` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::auth::discovery::DEFAULT_FETCH_TIMEOUT;
use crate::auth::domain::{FederatedDomain, LocalDomain, Secret, TrustDomainConfig};
use crate::auth::keys::CachePolicy;
use crate::error::ConfigError;

pub const LOCAL_JWT_ISSUER_ENV: &str = "LOCAL_JWT_ISSUER";
pub const LOCAL_JWT_AUDIENCE_ENV: &str = "LOCAL_JWT_AUDIENCE";
pub const LOCAL_JWT_SECRET_ENV: &str = "LOCAL_JWT_SECRET";
pub const LOCAL_JWT_CLOCK_SKEW_ENV: &str = "LOCAL_JWT_CLOCK_SKEW_SECS";

pub const OIDC_AUTHORITY_ENV: &str = "OIDC_AUTHORITY";
pub const OIDC_AUDIENCE_ENV: &str = "OIDC_AUDIENCE";
pub const OIDC_ISSUER_ENV: &str = "OIDC_ISSUER";
pub const OIDC_DISCOVERY_URL_ENV: &str = "OIDC_DISCOVERY_URL";
pub const OIDC_REQUIRE_HTTPS_ENV: &str = "OIDC_REQUIRE_HTTPS_METADATA";
pub const OIDC_CLOCK_SKEW_ENV: &str = "OIDC_CLOCK_SKEW_SECS";

pub const JWKS_CACHE_TTL_ENV: &str = "JWKS_CACHE_TTL_SECS";
pub const JWKS_MAX_STALENESS_ENV: &str = "JWKS_MAX_STALENESS_SECS";
pub const JWKS_RETRY_BACKOFF_ENV: &str = "JWKS_RETRY_BACKOFF_SECS";
pub const JWKS_MIN_REFRESH_INTERVAL_ENV: &str = "JWKS_MIN_REFRESH_INTERVAL_SECS";
pub const METADATA_TIMEOUT_ENV: &str = "METADATA_TIMEOUT_SECS";

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Name of the trust domain built from `LOCAL_JWT_*`.
pub const LOCAL_DOMAIN_NAME: &str = "local";

/// Name of the trust domain built from `OIDC_*`.
pub const FEDERATED_DOMAIN_NAME: &str = "oidc";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!("expected json or pretty, got {other}")),
        }
    }
}

/// Service settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub domains: Vec<TrustDomainConfig>,
    pub cache: CachePolicy,
    pub metadata_timeout: Duration,
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load settings from a variable map (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());

        let mut domains = Vec::new();
        if let Some(local) = local_domain(&get)? {
            domains.push(TrustDomainConfig::Local(local));
        }
        if let Some(federated) = federated_domain(&get)? {
            domains.push(TrustDomainConfig::Federated(federated));
        }
        if domains.is_empty() {
            return Err(ConfigError::NoDomains);
        }

        let defaults = CachePolicy::default();
        let cache = CachePolicy {
            default_ttl: secs_or(&get, JWKS_CACHE_TTL_ENV, defaults.default_ttl)?,
            max_staleness: secs_or(&get, JWKS_MAX_STALENESS_ENV, defaults.max_staleness)?,
            retry_backoff: secs_or(&get, JWKS_RETRY_BACKOFF_ENV, defaults.retry_backoff)?,
            min_refresh_interval: secs_or(
                &get,
                JWKS_MIN_REFRESH_INTERVAL_ENV,
                defaults.min_refresh_interval,
            )?,
        };
        if cache.default_ttl.is_zero() {
            return Err(ConfigError::InvalidVar {
                var: JWKS_CACHE_TTL_ENV,
                reason: "must be greater than zero".to_string(),
            });
        }

        let metadata_timeout = secs_or(&get, METADATA_TIMEOUT_ENV, DEFAULT_FETCH_TIMEOUT)?;
        if metadata_timeout.is_zero() {
            return Err(ConfigError::InvalidVar {
                var: METADATA_TIMEOUT_ENV,
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            domains,
            cache,
            metadata_timeout,
            host: get(HOST_ENV).unwrap_or(DEFAULT_HOST).to_string(),
            port: parse_or(&get, PORT_ENV, DEFAULT_PORT)?,
            log_format: parse_or(&get, LOG_FORMAT_ENV, LogFormat::default())?,
        })
    }

    /// `host:port` for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn local_domain<'a>(
    get: &impl Fn(&str) -> Option<&'a str>,
) -> Result<Option<LocalDomain>, ConfigError> {
    let issuer = get(LOCAL_JWT_ISSUER_ENV);
    let audience = get(LOCAL_JWT_AUDIENCE_ENV);
    let secret = get(LOCAL_JWT_SECRET_ENV);

    let (issuer, audience, secret) = match (issuer, audience, secret) {
        (None, None, None) => return Ok(None),
        (Some(i), Some(a), Some(s)) => (i, a, s),
        (None, _, _) => return Err(ConfigError::Missing(LOCAL_JWT_ISSUER_ENV)),
        (_, None, _) => return Err(ConfigError::Missing(LOCAL_JWT_AUDIENCE_ENV)),
        (_, _, None) => return Err(ConfigError::Missing(LOCAL_JWT_SECRET_ENV)),
    };

    Ok(Some(LocalDomain {
        name: LOCAL_DOMAIN_NAME.to_string(),
        issuer: issuer.to_string(),
        audience: audience.to_string(),
        secret: Secret::parse(secret)?,
        clock_skew: secs_or(get, LOCAL_JWT_CLOCK_SKEW_ENV, Duration::ZERO)?,
    }))
}

fn federated_domain<'a>(
    get: &impl Fn(&str) -> Option<&'a str>,
) -> Result<Option<FederatedDomain>, ConfigError> {
    let (authority, audience) = match (get(OIDC_AUTHORITY_ENV), get(OIDC_AUDIENCE_ENV)) {
        (None, None) => return Ok(None),
        (Some(authority), Some(audience)) => (authority, audience),
        (None, Some(_)) => return Err(ConfigError::Missing(OIDC_AUTHORITY_ENV)),
        (Some(_), None) => return Err(ConfigError::Missing(OIDC_AUDIENCE_ENV)),
    };

    let mut domain = FederatedDomain::from_authority(FEDERATED_DOMAIN_NAME, authority, audience);
    if let Some(issuer) = get(OIDC_ISSUER_ENV) {
        domain.issuer = issuer.to_string();
    }
    if let Some(url) = get(OIDC_DISCOVERY_URL_ENV) {
        domain.discovery_url = url.to_string();
    }
    domain.require_https = parse_or(get, OIDC_REQUIRE_HTTPS_ENV, true)?;
    domain.clock_skew = secs_or(get, OIDC_CLOCK_SKEW_ENV, Duration::ZERO)?;

    Ok(Some(domain))
}

fn parse_or<'a, T>(
    get: &impl Fn(&str) -> Option<&'a str>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    match get(var) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::InvalidVar {
            var,
            reason: e.to_string(),
        }),
    }
}

fn secs_or<'a>(
    get: &impl Fn(&str) -> Option<&'a str>,
    var: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    parse_or(get, var, default.as_secs()).map(Duration::from_secs)
}
