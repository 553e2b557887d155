// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key material and the per-domain key store.
//!
//! ## Local domains
//!
//! The HMAC secret is loaded once at startup. No network, no expiry.
//!
//! ## Federated domains
//!
//! The provider's signing-key set is fetched lazily and cached:
//!
//! - A warm, unexpired entry is served without locking or network I/O
//! - On miss or expiry, concurrent callers share one in-flight fetch
//! - The fetch runs on its own task, so a caller that goes away (client
//!   disconnect) does not cancel it for the others
//! - A refresh replaces the whole set; readers never see a partial update
//! - If a refresh fails, the expired set is still served until
//!   `expires_at + max_staleness`, with a WARN log each time; after that the
//!   domain fails closed with `KeyUnavailable`

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use jsonwebtoken::jwk::{
    AlgorithmParameters, EllipticCurve, Jwk, JwkSet, KeyAlgorithm, PublicKeyUse,
};
use jsonwebtoken::{Algorithm, DecodingKey};
use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::discovery::MetadataFetcher;
use super::domain::{FederatedDomain, Secret, TrustDomainConfig};
use super::error::{FetchError, ValidationFailure};

/// Default lifetime of a fetched key set (24 hours).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default time an expired key set may still be used after failed refreshes.
pub const DEFAULT_MAX_STALENESS: Duration = Duration::from_secs(60 * 60);

/// Default pause between refresh attempts after a failure.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// Default minimum age of a key set before an unknown `kid` may refresh it.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Caching policy for federated key sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Lifetime of a fetched set when the provider sends no `max-age`, and
    /// the upper bound when it does.
    pub default_ttl: Duration,
    /// How long past expiry a set may be served while refreshes fail.
    pub max_staleness: Duration,
    /// Pause between refresh attempts after a failure.
    pub retry_backoff: Duration,
    /// Rate limit for refreshes triggered by an unknown `kid`.
    pub min_refresh_interval: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_CACHE_TTL,
            max_staleness: DEFAULT_MAX_STALENESS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
        }
    }
}

/// Family of a verification key; decides which header algorithms it may
/// verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Rsa,
    EcP256,
    EcP384,
    Ed25519,
}

impl KeyFamily {
    pub fn allows(&self, algorithm: Algorithm) -> bool {
        matches!(
            (self, algorithm),
            (
                KeyFamily::Rsa,
                Algorithm::RS256
                    | Algorithm::RS384
                    | Algorithm::RS512
                    | Algorithm::PS256
                    | Algorithm::PS384
                    | Algorithm::PS512
            ) | (KeyFamily::EcP256, Algorithm::ES256)
                | (KeyFamily::EcP384, Algorithm::ES384)
                | (KeyFamily::Ed25519, Algorithm::EdDSA)
        )
    }
}

/// One public key from a provider's key set.
#[derive(Clone)]
pub struct SigningKey {
    pub kid: Option<String>,
    /// Algorithm pinned by the JWK `alg` member, if any.
    pub algorithm: Option<Algorithm>,
    pub family: KeyFamily,
    pub key: DecodingKey,
}

impl SigningKey {
    /// Convert a published JWK into a verification key.
    ///
    /// Returns `None` for keys that must not verify federated tokens:
    /// symmetric (`oct`) keys, encryption keys, unsupported curves and
    /// non-signature algorithms.
    pub fn from_jwk(jwk: &Jwk) -> Option<Self> {
        if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
            return None;
        }

        let family = match &jwk.algorithm {
            AlgorithmParameters::RSA(_) => KeyFamily::Rsa,
            AlgorithmParameters::EllipticCurve(ec) => match ec.curve {
                EllipticCurve::P256 => KeyFamily::EcP256,
                EllipticCurve::P384 => KeyFamily::EcP384,
                _ => return None,
            },
            AlgorithmParameters::OctetKeyPair(okp) => match okp.curve {
                EllipticCurve::Ed25519 => KeyFamily::Ed25519,
                _ => return None,
            },
            AlgorithmParameters::OctetKey(_) => return None,
        };

        let algorithm = match &jwk.common.key_algorithm {
            None => None,
            Some(alg) => Some(signature_algorithm(alg)?),
        };
        if algorithm.is_some_and(|alg| !family.allows(alg)) {
            return None;
        }

        let key = DecodingKey::from_jwk(jwk).ok()?;

        Some(Self {
            kid: jwk.common.key_id.clone(),
            algorithm,
            family,
            key,
        })
    }

    /// Whether this key may verify a token signed with `algorithm`.
    pub fn accepts(&self, algorithm: Algorithm) -> bool {
        match self.algorithm {
            Some(pinned) => pinned == algorithm,
            None => self.family.allows(algorithm),
        }
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .field("family", &self.family)
            .finish_non_exhaustive()
    }
}

/// Map a JWK `alg` to an asymmetric signature algorithm.
fn signature_algorithm(alg: &KeyAlgorithm) -> Option<Algorithm> {
    match alg {
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    }
}

/// Immutable set of a provider's public signing keys.
#[derive(Debug, Clone, Default)]
pub struct SigningKeySet {
    keys: Vec<SigningKey>,
}

impl SigningKeySet {
    pub fn new(keys: Vec<SigningKey>) -> Self {
        Self { keys }
    }

    /// Build from a published JWK set, dropping keys that cannot be used.
    pub fn from_jwks(jwks: &JwkSet) -> Self {
        let keys = jwks
            .keys
            .iter()
            .filter_map(|jwk| {
                let key = SigningKey::from_jwk(jwk);
                if key.is_none() {
                    debug!(kid = ?jwk.common.key_id, "Skipping unusable JWK");
                }
                key
            })
            .collect();
        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains_kid(&self, kid: &str) -> bool {
        self.keys.iter().any(|k| k.kid.as_deref() == Some(kid))
    }

    /// Keys that may verify a token with this header `kid` and algorithm.
    ///
    /// With a `kid`, only that key is a candidate. Without one, every key
    /// accepting the algorithm is.
    pub fn candidates<'a>(
        &'a self,
        kid: Option<&'a str>,
        algorithm: Algorithm,
    ) -> impl Iterator<Item = &'a SigningKey> + 'a {
        self.keys.iter().filter(move |key| {
            let kid_matches = match kid {
                Some(kid) => key.kid.as_deref() == Some(kid),
                None => true,
            };
            kid_matches && key.accepts(algorithm)
        })
    }
}

/// HMAC verification key of a local domain.
#[derive(Clone)]
pub struct SymmetricKey {
    key: DecodingKey,
}

impl SymmetricKey {
    pub fn from_secret(secret: &Secret) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}

/// Verification key material of one trust domain.
#[derive(Debug, Clone)]
pub enum KeyMaterial {
    Symmetric(SymmetricKey),
    Asymmetric(SigningKeySet),
}

/// Freshness of a domain's cached keys, for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    /// Static secret or unexpired key set.
    Fresh,
    /// Expired, still inside the staleness ceiling.
    Stale,
    /// Nothing usable: never fetched, or past the staleness ceiling.
    Unavailable,
}

impl KeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyStatus::Fresh => "ok",
            KeyStatus::Stale => "stale",
            KeyStatus::Unavailable => "unavailable",
        }
    }
}

/// Key material for every configured trust domain.
pub struct KeyStore {
    domains: HashMap<String, DomainKeys>,
}

enum DomainKeys {
    Local(Arc<KeyMaterial>),
    Federated(FederatedKeyCache),
}

impl KeyStore {
    pub fn new(
        domains: &[TrustDomainConfig],
        fetcher: Arc<dyn MetadataFetcher>,
        policy: CachePolicy,
    ) -> Self {
        let domains = domains
            .iter()
            .map(|domain| {
                let keys = match domain {
                    TrustDomainConfig::Local(local) => DomainKeys::Local(Arc::new(
                        KeyMaterial::Symmetric(SymmetricKey::from_secret(&local.secret)),
                    )),
                    TrustDomainConfig::Federated(federated) => DomainKeys::Federated(
                        FederatedKeyCache::new(federated, Arc::clone(&fetcher), policy),
                    ),
                };
                (domain.name().to_string(), keys)
            })
            .collect();

        Self { domains }
    }

    /// Current key material for a domain, fetching it if needed.
    pub async fn get(&self, domain: &str) -> Result<Arc<KeyMaterial>, ValidationFailure> {
        match self.domains.get(domain) {
            Some(DomainKeys::Local(keys)) => Ok(Arc::clone(keys)),
            Some(DomainKeys::Federated(cache)) => cache.get().await,
            None => {
                error!(domain = %domain, "No key material registered for trust domain");
                Err(ValidationFailure::KeyUnavailable)
            }
        }
    }

    /// Expire a federated domain's keys so the next `get` refreshes them.
    ///
    /// The expired set stays available as a stale fallback. No-op for local
    /// domains.
    pub fn invalidate(&self, domain: &str) {
        if let Some(DomainKeys::Federated(cache)) = self.domains.get(domain) {
            cache.invalidate();
        }
    }

    /// Refresh a federated domain after a token named a `kid` the cached set
    /// lacks.
    ///
    /// Returns the new key material, or `None` when the refresh was rate
    /// limited, failed, or the domain is local.
    pub async fn refresh_for_unknown_key(&self, domain: &str) -> Option<Arc<KeyMaterial>> {
        match self.domains.get(domain) {
            Some(DomainKeys::Federated(cache)) => cache.refresh_for_unknown_key().await,
            _ => None,
        }
    }

    /// Freshness of a domain's keys, without triggering a fetch.
    pub fn status(&self, domain: &str) -> KeyStatus {
        match self.domains.get(domain) {
            Some(DomainKeys::Local(_)) => KeyStatus::Fresh,
            Some(DomainKeys::Federated(cache)) => cache.status(),
            None => KeyStatus::Unavailable,
        }
    }
}

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<KeyMaterial>, FetchError>>>;

#[derive(Clone)]
struct CacheEntry {
    keys: Arc<KeyMaterial>,
    fetched_at: Instant,
    expires_at: Instant,
    /// Set after a failed refresh; no new fetch is started before it.
    retry_after: Option<Instant>,
}

/// Key-set cache of one federated domain.
struct FederatedKeyCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    domain: String,
    issuer: String,
    discovery_url: String,
    require_https: bool,
    fetcher: Arc<dyn MetadataFetcher>,
    policy: CachePolicy,
    entry: RwLock<Option<CacheEntry>>,
    in_flight: Mutex<Option<SharedFetch>>,
}

impl FederatedKeyCache {
    fn new(domain: &FederatedDomain, fetcher: Arc<dyn MetadataFetcher>, policy: CachePolicy) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                domain: domain.name.clone(),
                issuer: domain.issuer.clone(),
                discovery_url: domain.discovery_url.clone(),
                require_https: domain.require_https,
                fetcher,
                policy,
                entry: RwLock::new(None),
                in_flight: Mutex::new(None),
            }),
        }
    }

    async fn get(&self) -> Result<Arc<KeyMaterial>, ValidationFailure> {
        let now = Instant::now();
        if let Some(entry) = self.inner.snapshot() {
            if now < entry.expires_at {
                return Ok(entry.keys);
            }
            if entry.retry_after.is_some_and(|at| now < at) {
                return self.inner.serve_stale(&entry, now);
            }
        }

        match self.inner.refresh().await {
            Ok(keys) => Ok(keys),
            Err(_) => match self.inner.snapshot() {
                Some(entry) => self.inner.serve_stale(&entry, Instant::now()),
                None => {
                    warn!(domain = %self.inner.domain, "Signing keys unavailable: no cached key set");
                    Err(ValidationFailure::KeyUnavailable)
                }
            },
        }
    }

    fn invalidate(&self) {
        if let Some(entry) = self.inner.entry.write().as_mut() {
            entry.expires_at = Instant::now();
            entry.retry_after = None;
        }
        debug!(domain = %self.inner.domain, "Signing key cache invalidated");
    }

    async fn refresh_for_unknown_key(&self) -> Option<Arc<KeyMaterial>> {
        if let Some(entry) = self.inner.snapshot() {
            let now = Instant::now();
            if now.duration_since(entry.fetched_at) < self.inner.policy.min_refresh_interval
                || entry.retry_after.is_some_and(|at| now < at)
            {
                debug!(domain = %self.inner.domain, "Unknown kid refresh rate limited");
                return None;
            }
        }
        self.inner.refresh().await.ok()
    }

    fn status(&self) -> KeyStatus {
        let now = Instant::now();
        match self.inner.snapshot() {
            None => KeyStatus::Unavailable,
            Some(entry) if now < entry.expires_at => KeyStatus::Fresh,
            Some(entry) if now < self.inner.stale_deadline(&entry) => KeyStatus::Stale,
            Some(_) => KeyStatus::Unavailable,
        }
    }
}

impl CacheInner {
    fn snapshot(&self) -> Option<CacheEntry> {
        self.entry.read().clone()
    }

    fn stale_deadline(&self, entry: &CacheEntry) -> Instant {
        entry
            .expires_at
            .checked_add(self.policy.max_staleness)
            .unwrap_or(entry.expires_at)
    }

    fn serve_stale(
        &self,
        entry: &CacheEntry,
        now: Instant,
    ) -> Result<Arc<KeyMaterial>, ValidationFailure> {
        if now < entry.expires_at {
            return Ok(Arc::clone(&entry.keys));
        }
        if now < self.stale_deadline(entry) {
            warn!(
                domain = %self.domain,
                stale_for_secs = now.duration_since(entry.expires_at).as_secs(),
                "Serving stale signing keys after failed refresh"
            );
            return Ok(Arc::clone(&entry.keys));
        }
        error!(
            domain = %self.domain,
            max_staleness_secs = self.policy.max_staleness.as_secs(),
            "Signing keys unavailable: stale key set exceeded maximum staleness"
        );
        Err(ValidationFailure::KeyUnavailable)
    }

    /// Join the in-flight fetch, or start one.
    async fn refresh(self: &Arc<Self>) -> Result<Arc<KeyMaterial>, FetchError> {
        let fetch = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.clone() {
                Some(fetch) => fetch,
                None => {
                    let inner = Arc::clone(self);
                    let task = tokio::spawn(async move {
                        let result = inner.fetch_and_store().await;
                        inner.in_flight.lock().take();
                        result
                    });
                    let fetch = async move {
                        task.await
                            .unwrap_or_else(|e| Err(FetchError::Aborted(e.to_string())))
                    }
                    .boxed()
                    .shared();
                    *in_flight = Some(fetch.clone());
                    fetch
                }
            }
        };
        fetch.await
    }

    async fn fetch_and_store(&self) -> Result<Arc<KeyMaterial>, FetchError> {
        debug!(domain = %self.domain, url = %self.discovery_url, "Fetching signing keys");

        match self
            .fetcher
            .fetch(&self.discovery_url, self.require_https)
            .await
        {
            Ok(fetched) => {
                if fetched.issuer != self.issuer {
                    warn!(
                        domain = %self.domain,
                        expected = %self.issuer,
                        advertised = %fetched.issuer,
                        "Discovery document issuer differs from configured issuer"
                    );
                }

                let ttl = self.ttl_for(fetched.max_age);
                let key_count = fetched.keys.len();
                let keys = Arc::new(KeyMaterial::Asymmetric(fetched.keys));
                let now = Instant::now();
                *self.entry.write() = Some(CacheEntry {
                    keys: Arc::clone(&keys),
                    fetched_at: now,
                    expires_at: now + ttl,
                    retry_after: None,
                });

                info!(
                    domain = %self.domain,
                    key_count,
                    ttl_secs = ttl.as_secs(),
                    "Signing key set refreshed"
                );
                Ok(keys)
            }
            Err(err) => {
                if let Some(entry) = self.entry.write().as_mut() {
                    entry.retry_after = Some(Instant::now() + self.policy.retry_backoff);
                }
                warn!(domain = %self.domain, error = %err, "Signing key fetch failed");
                Err(err)
            }
        }
    }

    /// Provider `max-age`, capped at the default TTL and floored at the
    /// unknown-kid refresh interval.
    fn ttl_for(&self, max_age: Option<Duration>) -> Duration {
        let cap = self.policy.default_ttl;
        match max_age {
            Some(age) => age
                .min(cap)
                .max(self.policy.min_refresh_interval.min(cap)),
            None => cap,
        }
    }
}
