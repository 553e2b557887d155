// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! OpenID Connect metadata fetching.
//!
//! Turns a discovery URL into usable signing keys in two steps:
//!
//! 1. `GET <authority>/.well-known/openid-configuration` → [`DiscoveryDocument`]
//! 2. `GET <jwks_uri>` → [`SigningKeySet`]
//!
//! Both must succeed. When HTTPS metadata is required, both URLs are checked
//! before any request is sent. The fetcher never retries; retry policy
//! belongs to the key store.

use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use reqwest::header::{HeaderMap, CACHE_CONTROL};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

use super::error::FetchError;
use super::keys::SigningKeySet;

/// Default timeout for each metadata request.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Provider metadata published at the discovery URL.
///
/// Only `issuer` and `jwks_uri` are used; the rest is kept for diagnostics.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub jwks_uri: String,
    #[serde(default)]
    pub authorization_endpoint: Option<String>,
    #[serde(default)]
    pub token_endpoint: Option<String>,
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
    #[serde(default)]
    pub end_session_endpoint: Option<String>,
    #[serde(default)]
    pub id_token_signing_alg_values_supported: Vec<String>,
}

/// Result of a successful metadata fetch.
#[derive(Debug, Clone)]
pub struct FetchedKeys {
    /// Issuer advertised by the discovery document.
    pub issuer: String,
    pub keys: SigningKeySet,
    /// `Cache-Control: max-age` of the key-set response, if any.
    pub max_age: Option<Duration>,
}

/// Source of federated signing keys.
///
/// The key store depends on this trait so it can be exercised without a
/// network.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn fetch(&self, discovery_url: &str, require_https: bool)
        -> Result<FetchedKeys, FetchError>;
}

/// Parse a metadata URL and apply the HTTPS policy.
pub fn check_url(url: &str, require_https: bool) -> Result<Url, FetchError> {
    let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "https" => Ok(parsed),
        "http" if !require_https => Ok(parsed),
        "http" => Err(FetchError::InsecureUrl(url.to_string())),
        other => Err(FetchError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme {other}"),
        }),
    }
}

/// Read `max-age` from a `Cache-Control` header.
fn max_age(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(CACHE_CONTROL)?.to_str().ok()?;
    value.split(',').find_map(|directive| {
        let (name, seconds) = directive.trim().split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("max-age") {
            return None;
        }
        seconds.trim().trim_matches('"').parse().ok().map(Duration::from_secs)
    })
}

/// Metadata fetcher over HTTP(S).
#[derive(Clone)]
pub struct HttpMetadataFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpMetadataFetcher {
    /// Create a fetcher whose requests each time out after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self { client, timeout }
    }

    /// GET a JSON document. Returns the body and the response headers.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<(T, HeaderMap), FetchError> {
        let url_str = url.to_string();

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error(&url_str, e))?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url_str,
                status: response.status().as_u16(),
            });
        }

        let headers = response.headers().clone();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(&url_str, e))?;
        let body = serde_json::from_slice(&bytes).map_err(|e| FetchError::InvalidDocument {
            url: url_str,
            reason: e.to_string(),
        })?;

        Ok((body, headers))
    }
}

impl Default for HttpMetadataFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_TIMEOUT)
    }
}

fn transport_error(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(url.to_string())
    } else {
        FetchError::Transport {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl MetadataFetcher for HttpMetadataFetcher {
    #[instrument(skip(self), fields(url = %discovery_url))]
    async fn fetch(
        &self,
        discovery_url: &str,
        require_https: bool,
    ) -> Result<FetchedKeys, FetchError> {
        let discovery = check_url(discovery_url, require_https)?;
        let (document, _) = self.get_json::<DiscoveryDocument>(discovery).await?;

        let jwks_url = check_url(&document.jwks_uri, require_https)?;
        let jwks_uri = jwks_url.to_string();
        let (jwks, headers) = self.get_json::<JwkSet>(jwks_url).await?;

        let keys = SigningKeySet::from_jwks(&jwks);
        if keys.is_empty() {
            return Err(FetchError::NoUsableKeys(jwks_uri));
        }

        debug!(
            issuer = %document.issuer,
            published = jwks.keys.len(),
            usable = keys.len(),
            "Fetched signing key set"
        );

        Ok(FetchedKeys {
            issuer: document.issuer,
            keys,
            max_age: max_age(&headers),
        })
    }
}
