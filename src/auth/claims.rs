// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and the verified identity built from them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{AuthError, ValidationFailure};

/// A claim that may be a single string or an array of strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn contains(&self, value: &str) -> bool {
        match self {
            OneOrMany::One(v) => v == value,
            OneOrMany::Many(vs) => vs.iter().any(|v| v == value),
        }
    }

    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(vs) => vs,
        }
    }
}

/// Keycloak realm roles.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RealmAccess {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Token payload as presented, before any check.
///
/// Every field is optional so a missing claim is reported by the validator
/// as the failure it causes, not as a parse error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub aud: Option<OneOrMany>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub nbf: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub unique_name: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub role: Option<OneOrMany>,
    #[serde(default)]
    pub roles: Option<OneOrMany>,
    #[serde(default)]
    pub realm_access: Option<RealmAccess>,
}

/// Authenticated identity produced by a successful validation.
///
/// Lives for one request; handlers get it from the `Auth` extractor.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedClaims {
    /// Trust domain that vouched for this identity.
    pub domain: String,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub issuer: String,
    pub audiences: Vec<String>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,
    pub roles: Vec<String>,
}

impl VerifiedClaims {
    /// Build the identity from claims that already passed every check.
    ///
    /// Fails with `Malformed` when neither a subject nor a name is present,
    /// or a timestamp is out of range.
    pub fn from_raw(domain: &str, raw: RawClaims) -> Result<Self, ValidationFailure> {
        let name = raw.name.or(raw.unique_name).or(raw.preferred_username);
        let subject = raw
            .sub
            .filter(|s| !s.is_empty())
            .or_else(|| name.clone())
            .ok_or(ValidationFailure::Malformed)?;

        let expires_at = raw
            .exp
            .and_then(|t| DateTime::from_timestamp(t, 0))
            .ok_or(ValidationFailure::Malformed)?;
        let not_before = timestamp(raw.nbf)?;
        let issued_at = timestamp(raw.iat)?;

        let mut roles: Vec<String> = Vec::new();
        let sources = [raw.role, raw.roles]
            .into_iter()
            .flatten()
            .flat_map(OneOrMany::into_vec)
            .chain(raw.realm_access.into_iter().flat_map(|r| r.roles));
        for role in sources {
            if !roles.contains(&role) {
                roles.push(role);
            }
        }

        Ok(Self {
            domain: domain.to_string(),
            subject,
            name,
            issuer: raw.iss.unwrap_or_default(),
            audiences: raw.aud.map(OneOrMany::into_vec).unwrap_or_default(),
            expires_at,
            not_before,
            issued_at,
            roles,
        })
    }

    /// Name for greetings: the name claim, else the subject.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.subject)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Refuse an identity vouched for by any domain other than `domain`.
    pub fn require_domain(&self, domain: &str) -> Result<(), AuthError> {
        if self.domain == domain {
            Ok(())
        } else {
            Err(AuthError::WrongDomain {
                required: domain.to_string(),
                actual: self.domain.clone(),
            })
        }
    }
}

fn timestamp(value: Option<i64>) -> Result<Option<DateTime<Utc>>, ValidationFailure> {
    value
        .map(|t| DateTime::from_timestamp(t, 0).ok_or(ValidationFailure::Malformed))
        .transpose()
}

impl fmt::Debug for VerifiedClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifiedClaims")
            .field("domain", &self.domain)
            .field("subject", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .field("audiences", &self.audiences)
            .field("expires_at", &self.expires_at)
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}
