// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token validation.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. structure (size, three segments, JSON header and payload, `exp`) → `Malformed`
//! 2. signature, with an algorithm the domain allows → `BadSignature`
//! 3. `iss` equals the domain issuer → `IssuerMismatch`
//! 4. `aud` contains the domain audience → `AudienceMismatch`
//! 5. `exp` / `nbf` against the clock, with the domain's skew (zero by
//!    default) → `Expired` / `NotYetValid`
//!
//! `jsonwebtoken` only verifies the signature here; its own claim checks are
//! switched off so the order and the zero tolerance above are ours.

use std::collections::HashSet;

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Header, Validation};

use super::claims::{RawClaims, VerifiedClaims};
use super::domain::TrustDomainConfig;
use super::error::ValidationFailure;
use super::keys::KeyMaterial;

/// Tokens larger than this are rejected before decoding.
pub const MAX_TOKEN_BYTES: usize = 8 * 1024;

const LOCAL_ALGORITHMS: &[Algorithm] = &[Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

const FEDERATED_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
    Algorithm::ES256,
    Algorithm::ES384,
    Algorithm::EdDSA,
];

/// Signature algorithms a domain accepts.
pub fn allowed_algorithms(domain: &TrustDomainConfig) -> &'static [Algorithm] {
    match domain {
        TrustDomainConfig::Local(_) => LOCAL_ALGORITHMS,
        TrustDomainConfig::Federated(_) => FEDERATED_ALGORITHMS,
    }
}

/// Validate `token` for `domain` with its current key material.
///
/// `now` is the current Unix time in seconds.
pub fn validate(
    token: &str,
    domain: &TrustDomainConfig,
    keys: &KeyMaterial,
    now: i64,
) -> Result<VerifiedClaims, ValidationFailure> {
    let (header, unverified) = parse(token)?;
    let exp = unverified.exp.ok_or(ValidationFailure::Malformed)?;

    let claims = verify_signature(token, &header, domain, keys)?;

    if claims.iss.as_deref() != Some(domain.issuer()) {
        return Err(ValidationFailure::IssuerMismatch);
    }

    if !claims
        .aud
        .as_ref()
        .is_some_and(|aud| aud.contains(domain.audience()))
    {
        return Err(ValidationFailure::AudienceMismatch);
    }

    let skew = i64::try_from(domain.clock_skew().as_secs()).unwrap_or(i64::MAX);
    if exp < now.saturating_sub(skew) {
        return Err(ValidationFailure::Expired);
    }
    if claims.nbf.is_some_and(|nbf| nbf > now.saturating_add(skew)) {
        return Err(ValidationFailure::NotYetValid);
    }

    VerifiedClaims::from_raw(domain.name(), claims)
}

/// Whether the token names a `kid` the key set does not contain.
///
/// Only meaningful for federated key sets; used to decide on a refresh after
/// the provider rotated its keys.
pub fn has_unknown_kid(token: &str, keys: &KeyMaterial) -> bool {
    let KeyMaterial::Asymmetric(set) = keys else {
        return false;
    };
    match decode_header(token) {
        Ok(Header { kid: Some(kid), .. }) => !set.contains_kid(&kid),
        _ => false,
    }
}

/// Size, segment count and a decodable header.
///
/// Cheap enough to run before key resolution, so garbage never reaches the
/// network.
pub fn check_structure(token: &str) -> Result<Header, ValidationFailure> {
    if token.len() > MAX_TOKEN_BYTES || token.split('.').count() != 3 {
        return Err(ValidationFailure::Malformed);
    }
    decode_header(token).map_err(|_| ValidationFailure::Malformed)
}

/// Step 1: structural parse without trusting anything.
fn parse(token: &str) -> Result<(Header, RawClaims), ValidationFailure> {
    let header = check_structure(token)?;
    let payload = jsonwebtoken::dangerous::insecure_decode::<RawClaims>(token)
        .map_err(|_| ValidationFailure::Malformed)?;
    Ok((header, payload.claims))
}

/// Step 2: try each candidate key until one verifies.
fn verify_signature(
    token: &str,
    header: &Header,
    domain: &TrustDomainConfig,
    keys: &KeyMaterial,
) -> Result<RawClaims, ValidationFailure> {
    let algorithm = header.alg;
    if !allowed_algorithms(domain).contains(&algorithm) {
        return Err(ValidationFailure::BadSignature);
    }

    let validation = signature_only(algorithm);
    let candidates: Vec<&DecodingKey> = match (domain, keys) {
        (TrustDomainConfig::Local(_), KeyMaterial::Symmetric(key)) => vec![key.decoding_key()],
        (TrustDomainConfig::Federated(_), KeyMaterial::Asymmetric(set)) => set
            .candidates(header.kid.as_deref(), algorithm)
            .map(|key| &key.key)
            .collect(),
        _ => {
            tracing::error!(domain = %domain.name(), "Key material does not match trust domain kind");
            return Err(ValidationFailure::KeyUnavailable);
        }
    };

    // structure was checked in step 1, so any error here is a key mismatch
    for key in candidates {
        if let Ok(data) = decode::<RawClaims>(token, key, &validation) {
            return Ok(data.claims);
        }
    }

    Err(ValidationFailure::BadSignature)
}

/// Validation that checks the signature and nothing else.
fn signature_only(algorithm: Algorithm) -> Validation {
    let mut validation = Validation::new(algorithm);
    validation.required_spec_claims = HashSet::new();
    validation.leeway = 0;
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation
}
