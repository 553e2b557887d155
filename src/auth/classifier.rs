// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Picks the trust domain whose validation policy applies to a token.
//!
//! The result is a routing decision only. The unverified `iss` read here is
//! checked again by the validator against the chosen domain.

use serde::Deserialize;

use super::domain::TrustDomainConfig;
use super::error::ValidationFailure;

#[derive(Debug, Clone, Deserialize)]
struct IssuerOnly {
    #[serde(default)]
    iss: Option<String>,
}

/// Select the domain for `token`.
///
/// - `hint` (caller context, e.g. a route bound to one domain) selects by name
/// - a single configured domain is always selected
/// - otherwise the unverified `iss` claim selects by issuer
pub fn classify<'a>(
    token: &str,
    domains: &'a [TrustDomainConfig],
    hint: Option<&str>,
) -> Result<&'a TrustDomainConfig, ValidationFailure> {
    if let Some(name) = hint {
        return domains
            .iter()
            .find(|d| d.name() == name)
            .ok_or(ValidationFailure::UnknownIssuer);
    }

    if let [only] = domains {
        return Ok(only);
    }

    let peeked = jsonwebtoken::dangerous::insecure_decode::<IssuerOnly>(token)
        .map_err(|_| ValidationFailure::Malformed)?;
    let issuer = peeked
        .claims
        .iss
        .ok_or(ValidationFailure::UnknownIssuer)?;

    domains
        .iter()
        .find(|d| d.issuer() == issuer)
        .ok_or(ValidationFailure::UnknownIssuer)
}
