// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Bearer-token authentication across independent trust domains.
//!
//! ## Auth Flow
//!
//! 1. Client sends `Authorization: Bearer <JWT>`
//! 2. The gate:
//!    - classifies the token to a trust domain (by `iss`, or by route)
//!    - resolves the domain's keys: the local HMAC secret, or the
//!      federated provider's signing keys fetched via OIDC discovery
//!    - verifies signature, issuer, audience, expiry, not-before
//!    - extracts subject, name and role claims
//! 3. Handlers receive [`VerifiedClaims`]; any failure is a generic 401
//!
//! ## Security
//!
//! - Zero clock-skew tolerance unless a domain opts in
//! - Federated metadata is fetched over HTTPS only, unless explicitly disabled
//! - Signing keys are cached; stale keys are served only for a bounded time
//! - Reason codes are logged, never returned to the caller

pub mod claims;
pub mod classifier;
pub mod discovery;
pub mod domain;
pub mod error;
pub mod extractor;
pub mod gate;
pub mod keys;
pub mod middleware;
pub mod validator;

pub use claims::VerifiedClaims;
pub use discovery::{HttpMetadataFetcher, MetadataFetcher};
pub use domain::{FederatedDomain, LocalDomain, TrustDomainConfig};
pub use error::{AuthError, FetchError, ValidationFailure};
pub use extractor::Auth;
pub use gate::AuthGate;
pub use keys::{CachePolicy, KeyMaterial, KeyStatus, KeyStore};
pub use middleware::require_auth;
