// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication gate.
//!
//! Entry point for a raw bearer token: classify → resolve keys → validate.
//! Every failure comes out as one [`ValidationFailure`] reason; the routing
//! layer turns it into a 401.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::claims::VerifiedClaims;
use super::classifier::classify;
use super::discovery::MetadataFetcher;
use super::domain::{validate_domains, TrustDomainConfig};
use super::error::ValidationFailure;
use super::keys::{CachePolicy, KeyStore};
use super::validator::{check_structure, has_unknown_kid, validate};
use crate::error::ConfigError;

/// Extract the token from an `Authorization` header value.
///
/// The scheme is matched case-insensitively. Returns `None` for other
/// schemes and for an empty token.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Validates bearer tokens against the configured trust domains.
pub struct AuthGate {
    domains: Vec<TrustDomainConfig>,
    keys: KeyStore,
}

impl AuthGate {
    pub fn new(
        domains: Vec<TrustDomainConfig>,
        fetcher: Arc<dyn MetadataFetcher>,
        policy: CachePolicy,
    ) -> Result<Self, ConfigError> {
        validate_domains(&domains)?;
        let keys = KeyStore::new(&domains, fetcher, policy);
        Ok(Self { domains, keys })
    }

    pub fn domains(&self) -> &[TrustDomainConfig] {
        &self.domains
    }

    pub fn key_store(&self) -> &KeyStore {
        &self.keys
    }

    /// Authenticate an `Authorization` header value.
    ///
    /// A missing header, another scheme or an empty token is `NoCredential`,
    /// logged like every other rejection.
    pub async fn authenticate_header(
        &self,
        header: Option<&str>,
    ) -> Result<VerifiedClaims, ValidationFailure> {
        let token = header.and_then(bearer_token).unwrap_or_default();
        self.authenticate(token).await
    }

    /// Authenticate a raw bearer token.
    pub async fn authenticate(&self, token: &str) -> Result<VerifiedClaims, ValidationFailure> {
        self.authenticate_with_hint(token, None).await
    }

    /// Authenticate against the domain named `hint`, skipping issuer-based
    /// classification.
    pub async fn authenticate_with_hint(
        &self,
        token: &str,
        hint: Option<&str>,
    ) -> Result<VerifiedClaims, ValidationFailure> {
        let token = token.trim();
        let result = if token.is_empty() {
            Err(ValidationFailure::NoCredential)
        } else {
            self.verify(token, hint).await
        };
        match &result {
            Ok(claims) => debug!(domain = %claims.domain, "Token accepted"),
            Err(reason) => info!(reason = reason.code(), "Token rejected"),
        }
        result
    }

    async fn verify(
        &self,
        token: &str,
        hint: Option<&str>,
    ) -> Result<VerifiedClaims, ValidationFailure> {
        check_structure(token)?;

        let domain = classify(token, &self.domains, hint)?;
        let keys = self.keys.get(domain.name()).await?;

        match validate(token, domain, &keys, Utc::now().timestamp()) {
            Err(ValidationFailure::BadSignature) if has_unknown_kid(token, &keys) => {
                debug!(domain = %domain.name(), "Token names an unknown key id, refreshing key set");
                match self.keys.refresh_for_unknown_key(domain.name()).await {
                    Some(fresh) => validate(token, domain, &fresh, Utc::now().timestamp()),
                    None => Err(ValidationFailure::BadSignature),
                }
            }
            other => other,
        }
    }
}
