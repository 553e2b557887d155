// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{middleware, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::require_auth;
use crate::state::AppState;

pub mod health;
pub mod protected;

pub fn router(state: AppState) -> Router {
    let gated = Router::new()
        .route("/test/protected", get(protected::protected))
        .route("/protected/endpoint", get(protected::protected))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let v1_routes = Router::new()
        .route("/test/public", get(protected::public))
        .route("/me", get(protected::me))
        .route("/domains/{name}/whoami", get(protected::whoami))
        .merge(gated)
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .nest("/api/v1", v1_routes)
        .merge(health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{local_only_state, local_token};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    async fn get_json(uri: &str, token: Option<&str>) -> (StatusCode, serde_json::Value) {
        let mut request = Request::builder().uri(uri);
        if let Some(token) = token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        let response = router(local_only_state())
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn public_endpoint_needs_no_token() {
        let (status, body) = get_json("/api/v1/test/public", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Hello, this is a public endpoint!");
    }

    #[tokio::test]
    async fn protected_endpoints_greet_by_name() {
        let token = local_token("TestUser");
        for uri in ["/api/v1/test/protected", "/api/v1/protected/endpoint"] {
            let (status, body) = get_json(uri, Some(&token)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["message"], "Hello TestUser, your JWT is valid!");
        }
    }

    #[tokio::test]
    async fn protected_endpoint_rejects_garbage() {
        let (status, body) = get_json("/api/v1/test/protected", Some("garbage")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "unauthorized");
    }

    #[tokio::test]
    async fn me_returns_claims() {
        let (status, body) = get_json("/api/v1/me", Some(&local_token("TestUser"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["subject"], "TestUser");
        assert_eq!(body["domain"], "local");
    }

    #[tokio::test]
    async fn whoami_checks_the_domain() {
        let token = local_token("TestUser");
        let (status, _) = get_json("/api/v1/domains/local/whoami", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = get_json("/api/v1/domains/oidc/whoami", Some(&token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error_code"], "forbidden");
    }

    #[tokio::test]
    async fn health_is_ok_without_federated_domains() {
        let (status, body) = get_json("/health/ready", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, _) = get_json("/health/live", None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
