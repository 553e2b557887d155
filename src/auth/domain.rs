// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Trust domain configuration.
//!
//! A trust domain is one independently verifiable source of tokens:
//!
//! - **Local** - tokens signed with a shared HMAC secret known to this service
//! - **Federated** - tokens signed by an OpenID Connect provider whose public
//!   keys are discovered from `<authority>/.well-known/openid-configuration`
//!
//! Domains are built once at startup and never mutated.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::error::ConfigError;

/// Minimum HMAC secret length (256 bits).
pub const MIN_SECRET_BYTES: usize = 32;

/// Prefix marking a base64-encoded secret in configuration.
const BASE64_SECRET_PREFIX: &str = "base64:";

/// Path appended to an authority to form its discovery URL.
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Shared HMAC secret of a local domain.
///
/// Never printed; `Debug` only reports the length.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Vec<u8>);

impl Secret {
    /// Decode a configured secret.
    ///
    /// The value is taken as UTF-8 bytes, or base64-decoded when it starts
    /// with `base64:`. The decoded secret must be at least 32 bytes.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let bytes = match value.strip_prefix(BASE64_SECRET_PREFIX) {
            Some(encoded) => STANDARD
                .decode(encoded.trim())
                .map_err(|e| ConfigError::InvalidSecret(format!("not valid base64: {e}")))?,
            None => value.as_bytes().to_vec(),
        };

        if bytes.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::InvalidSecret(format!(
                "secret is {} bytes, at least {MIN_SECRET_BYTES} are required",
                bytes.len()
            )));
        }

        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([REDACTED; {} bytes])", self.0.len())
    }
}

/// Local domain: HMAC-signed tokens minted by this deployment.
#[derive(Debug, Clone)]
pub struct LocalDomain {
    pub name: String,
    pub issuer: String,
    pub audience: String,
    pub secret: Secret,
    pub clock_skew: Duration,
}

/// Federated domain: tokens from an external OpenID Connect provider.
#[derive(Debug, Clone)]
pub struct FederatedDomain {
    pub name: String,
    pub issuer: String,
    pub audience: String,
    pub discovery_url: String,
    pub require_https: bool,
    pub clock_skew: Duration,
}

impl FederatedDomain {
    /// Build a federated domain from an authority URL.
    ///
    /// The issuer defaults to the authority exactly as given, trailing `/`
    /// included, since `iss` is compared byte for byte. The discovery URL is
    /// `<authority>/.well-known/openid-configuration`.
    pub fn from_authority(
        name: impl Into<String>,
        authority: &str,
        audience: impl Into<String>,
    ) -> Self {
        let base = authority.trim_end_matches('/');
        Self {
            name: name.into(),
            issuer: authority.to_string(),
            audience: audience.into(),
            discovery_url: format!("{base}{DISCOVERY_PATH}"),
            require_https: true,
            clock_skew: Duration::ZERO,
        }
    }
}

/// Configuration of one trust domain.
#[derive(Debug, Clone)]
pub enum TrustDomainConfig {
    Local(LocalDomain),
    Federated(FederatedDomain),
}

impl TrustDomainConfig {
    pub fn name(&self) -> &str {
        match self {
            TrustDomainConfig::Local(d) => &d.name,
            TrustDomainConfig::Federated(d) => &d.name,
        }
    }

    pub fn issuer(&self) -> &str {
        match self {
            TrustDomainConfig::Local(d) => &d.issuer,
            TrustDomainConfig::Federated(d) => &d.issuer,
        }
    }

    pub fn audience(&self) -> &str {
        match self {
            TrustDomainConfig::Local(d) => &d.audience,
            TrustDomainConfig::Federated(d) => &d.audience,
        }
    }

    /// Tolerance applied to `exp` and `nbf`. Zero unless configured.
    pub fn clock_skew(&self) -> Duration {
        match self {
            TrustDomainConfig::Local(d) => d.clock_skew,
            TrustDomainConfig::Federated(d) => d.clock_skew,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TrustDomainConfig::Local(_) => "local",
            TrustDomainConfig::Federated(_) => "federated",
        }
    }
}

/// Check a set of domains before it is put to use.
///
/// Names must be unique. With more than one domain, issuers must be unique
/// too, otherwise a token could not be classified.
pub fn validate_domains(domains: &[TrustDomainConfig]) -> Result<(), ConfigError> {
    if domains.is_empty() {
        return Err(ConfigError::NoDomains);
    }

    let mut names = HashSet::new();
    let mut issuers = HashSet::new();
    for domain in domains {
        if domain.name().is_empty() {
            return Err(ConfigError::Invalid("trust domain name is empty".to_string()));
        }
        if domain.issuer().is_empty() || domain.audience().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "trust domain {} needs both issuer and audience",
                domain.name()
            )));
        }
        if !names.insert(domain.name()) {
            return Err(ConfigError::DuplicateDomain(domain.name().to_string()));
        }
        if domains.len() > 1 && !issuers.insert(domain.issuer()) {
            return Err(ConfigError::DuplicateIssuer(domain.issuer().to_string()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(name: &str, issuer: &str) -> TrustDomainConfig {
        TrustDomainConfig::Local(LocalDomain {
            name: name.to_string(),
            issuer: issuer.to_string(),
            audience: "aud".to_string(),
            secret: Secret::parse("0123456789abcdef0123456789abcdef").unwrap(),
            clock_skew: Duration::ZERO,
        })
    }

    #[test]
    fn secret_plain_text_is_utf8_bytes() {
        let secret = Secret::parse("super-secret-key-1-for-local-hs256").unwrap();
        assert_eq!(secret.as_bytes(), b"super-secret-key-1-for-local-hs256");
    }

    #[test]
    fn secret_base64_prefix_is_decoded() {
        let encoded = STANDARD.encode([7u8; 32]);
        let secret = Secret::parse(&format!("base64:{encoded}")).unwrap();
        assert_eq!(secret.as_bytes(), &[7u8; 32]);
    }

    #[test]
    fn short_secret_is_rejected() {
        let err = Secret::parse("super-secret-key-1").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSecret(_)));

        let short = STANDARD.encode([1u8; 31]);
        assert!(Secret::parse(&format!("base64:{short}")).is_err());
    }

    #[test]
    fn secret_debug_is_redacted() {
        let secret = Secret::parse("super-secret-key-1-for-local-hs256").unwrap();
        let debug = format!("{secret:?}");
        assert!(!debug.contains("super"));
        assert!(debug.contains("34 bytes"));
    }

    #[test]
    fn federated_from_authority_derives_urls() {
        let domain =
            FederatedDomain::from_authority("keycloak", "https://kc.example.com/realms/app", "api");
        assert_eq!(domain.issuer, "https://kc.example.com/realms/app");
        assert_eq!(
            domain.discovery_url,
            "https://kc.example.com/realms/app/.well-known/openid-configuration"
        );
        assert!(domain.require_https);
        assert_eq!(domain.clock_skew, Duration::ZERO);
    }

    #[test]
    fn trailing_slash_authority_is_kept_as_issuer() {
        let domain = FederatedDomain::from_authority(
            "entra",
            "https://sts.windows.net/00000000-0000-0000-0000-000000000000/",
            "api",
        );
        assert_eq!(
            domain.issuer,
            "https://sts.windows.net/00000000-0000-0000-0000-000000000000/"
        );
        assert_eq!(
            domain.discovery_url,
            "https://sts.windows.net/00000000-0000-0000-0000-000000000000/.well-known/openid-configuration"
        );
    }

    #[test]
    fn validate_rejects_empty_set() {
        assert!(matches!(validate_domains(&[]), Err(ConfigError::NoDomains)));
    }

    #[test]
    fn validate_rejects_duplicate_names() {
        let domains = [local("a", "iss-1"), local("a", "iss-2")];
        assert!(matches!(
            validate_domains(&domains),
            Err(ConfigError::DuplicateDomain(name)) if name == "a"
        ));
    }

    #[test]
    fn validate_rejects_duplicate_issuers_when_several_domains() {
        let domains = [local("a", "iss"), local("b", "iss")];
        assert!(matches!(
            validate_domains(&domains),
            Err(ConfigError::DuplicateIssuer(_))
        ));
        assert!(validate_domains(&[local("a", "iss")]).is_ok());
    }
}
