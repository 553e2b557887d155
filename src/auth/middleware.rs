// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication middleware for Axum.
//!
//! Applies the gate to a whole router subtree. On success the
//! [`VerifiedClaims`](super::VerifiedClaims) are stored in the request
//! extensions, where the `Auth` extractor picks them up.
//!
//! ```rust,ignore
//! let protected = Router::new()
//!     .route("/protected", get(handler))
//!     .route_layer(axum::middleware::from_fn_with_state(state.clone(), require_auth));
//! ```

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::extractor::authorization;
use crate::state::AppState;

/// Reject the request with 401 unless it carries a valid bearer token.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let result = state
        .gate
        .authenticate_header(authorization(request.headers()))
        .await;
    match result {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(reason) => super::AuthError::from(reason).into_response(),
    }
}
