// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for authenticated callers.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(claims): Auth) -> impl IntoResponse {
//!     // claims is VerifiedClaims
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use super::{AuthError, VerifiedClaims};
use crate::state::AppState;

/// Extractor for authenticated callers.
///
/// Reuses the identity set by `require_auth` when the route is behind it,
/// otherwise authenticates the `Authorization` header itself.
pub struct Auth(pub VerifiedClaims);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // First check if middleware already set the identity
        if let Some(claims) = parts.extensions.get::<VerifiedClaims>().cloned() {
            return Ok(Auth(claims));
        }

        let claims = state
            .gate
            .authenticate_header(authorization(&parts.headers))
            .await?;

        Ok(Auth(claims))
    }
}

/// Raw `Authorization` header value, if present and valid UTF-8.
pub fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::RawClaims;
    use crate::auth::ValidationFailure;
    use crate::test_support::{local_only_state, local_token};
    use axum::http::Request;

    fn parts(authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some(value) = authorization {
            builder = builder.header("Authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn auth_extractor_requires_auth_header() {
        let state = local_only_state();
        let mut parts = parts(None);

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(
            result,
            Err(AuthError::Rejected(ValidationFailure::NoCredential))
        ));
    }

    #[tokio::test]
    async fn auth_extractor_rejects_other_schemes() {
        let state = local_only_state();
        let mut parts = parts(Some("Basic dXNlcjpwYXNz"));

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(
            result,
            Err(AuthError::Rejected(ValidationFailure::NoCredential))
        ));
    }

    #[tokio::test]
    async fn auth_extractor_succeeds_with_jwt() {
        let state = local_only_state();
        let mut parts = parts(Some(&format!("Bearer {}", local_token("TestUser"))));

        let Auth(claims) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(claims.subject, "TestUser");
    }

    #[tokio::test]
    async fn auth_extractor_prefers_extensions() {
        let state = local_only_state();
        let mut parts = parts(None);

        let raw: RawClaims = serde_json::from_value(serde_json::json!({
            "sub": "from_middleware",
            "exp": 1_900_000_000
        }))
        .unwrap();
        parts
            .extensions
            .insert(VerifiedClaims::from_raw("local", raw).unwrap());

        let Auth(claims) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(claims.subject, "from_middleware");
    }
}
