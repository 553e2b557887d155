// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! Three layers:
//!
//! - [`FetchError`] - the metadata fetcher could not produce key material
//! - [`ValidationFailure`] - why a token was rejected (internal reason code)
//! - [`AuthError`] - what the routing layer sends back (401 / 403)
//!
//! Reason codes are for logs only; every rejection leaves the service as the
//! same generic 401 body.

use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failure to obtain federated key material.
///
/// `Clone` because a single in-flight fetch hands its outcome to every
/// waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The URL is not HTTPS while the domain requires HTTPS metadata.
    #[error("refusing non-HTTPS metadata URL: {0}")]
    InsecureUrl(String),

    /// The URL could not be parsed.
    #[error("invalid metadata URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The request did not complete (connect, TLS, read).
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    /// The request exceeded the configured timeout.
    #[error("request to {0} timed out")]
    Timeout(String),

    /// The endpoint answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// The body was not a valid discovery document or key set.
    #[error("invalid document from {url}: {reason}")]
    InvalidDocument { url: String, reason: String },

    /// The key set contained no key usable for signature verification.
    #[error("no usable signing keys at {0}")]
    NoUsableKeys(String),

    /// The background fetch task ended without a result.
    #[error("key fetch aborted: {0}")]
    Aborted(String),
}

/// Why a token was not accepted.
///
/// Every variant is terminal for the request; none is retried on the
/// validation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    /// No bearer credential was presented.
    #[error("no bearer credential presented")]
    NoCredential,
    /// The token is not a well-formed compact JWT with the required claims.
    #[error("token is malformed")]
    Malformed,
    /// The signature does not verify against the domain's key material.
    #[error("token signature is invalid")]
    BadSignature,
    /// The `iss` claim differs from the domain's expected issuer.
    #[error("token issuer does not match")]
    IssuerMismatch,
    /// The `aud` claim does not contain the domain's audience.
    #[error("token audience does not match")]
    AudienceMismatch,
    /// `exp` is in the past.
    #[error("token has expired")]
    Expired,
    /// `nbf` is in the future.
    #[error("token is not yet valid")]
    NotYetValid,
    /// No configured trust domain claims this token.
    #[error("token issuer is not a configured trust domain")]
    UnknownIssuer,
    /// Key material could not be fetched and no usable stale copy remains.
    #[error("signing keys are unavailable")]
    KeyUnavailable,
}

impl ValidationFailure {
    /// Stable reason code for logs and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationFailure::NoCredential => "no_credential",
            ValidationFailure::Malformed => "malformed",
            ValidationFailure::BadSignature => "bad_signature",
            ValidationFailure::IssuerMismatch => "issuer_mismatch",
            ValidationFailure::AudienceMismatch => "audience_mismatch",
            ValidationFailure::Expired => "expired",
            ValidationFailure::NotYetValid => "not_yet_valid",
            ValidationFailure::UnknownIssuer => "unknown_issuer",
            ValidationFailure::KeyUnavailable => "key_unavailable",
        }
    }
}

/// Error returned to the routing layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Authentication failed; the reason is logged, never sent.
    #[error("authentication rejected: {0}")]
    Rejected(ValidationFailure),

    /// The caller is authenticated, but through a trust domain this route
    /// does not accept.
    #[error("trust domain {actual} is not accepted here (requires {required})")]
    WrongDomain { required: String, actual: String },
}

impl From<ValidationFailure> for AuthError {
    fn from(reason: ValidationFailure) -> Self {
        AuthError::Rejected(reason)
    }
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: &'static str,
    error_code: &'static str,
}

impl AuthError {
    /// The rejection reason, when this is an authentication failure.
    pub fn reason(&self) -> Option<ValidationFailure> {
        match self {
            AuthError::Rejected(reason) => Some(*reason),
            AuthError::WrongDomain { .. } => None,
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Rejected(_) => StatusCode::UNAUTHORIZED,
            AuthError::WrongDomain { .. } => StatusCode::FORBIDDEN,
        }
    }

    fn body(&self) -> AuthErrorBody {
        match self {
            AuthError::Rejected(_) => AuthErrorBody {
                error: "The access token is missing, invalid or expired",
                error_code: "unauthorized",
            },
            AuthError::WrongDomain { .. } => AuthErrorBody {
                error: "The access token is not accepted for this resource",
                error_code: "forbidden",
            },
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self.body());
        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
