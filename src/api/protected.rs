// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Endpoints exercising the gate: one public, the rest authenticated.

use axum::{extract::Path, Extension, Json};
use serde::Serialize;
use tracing::debug;

use crate::auth::{Auth, AuthError, VerifiedClaims};

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// `GET /api/v1/test/public`
pub async fn public() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Hello, this is a public endpoint!".to_string(),
    })
}

/// `GET /api/v1/test/protected` and `GET /api/v1/protected/endpoint`
///
/// Mounted behind `require_auth`, which stores the claims in the request
/// extensions.
pub async fn protected(Extension(claims): Extension<VerifiedClaims>) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: format!("Hello {}, your JWT is valid!", claims.display_name()),
    })
}

/// `GET /api/v1/me`
pub async fn me(Auth(claims): Auth) -> Json<VerifiedClaims> {
    Json(claims)
}

/// `GET /api/v1/domains/{name}/whoami`
///
/// Like `/me`, but only for callers authenticated by the named domain.
pub async fn whoami(
    Path(name): Path<String>,
    Auth(claims): Auth,
) -> Result<Json<VerifiedClaims>, AuthError> {
    if let Err(e) = claims.require_domain(&name) {
        debug!(required = %name, actual = %claims.domain, "Caller from another trust domain");
        return Err(e);
    }
    Ok(Json(claims))
}
