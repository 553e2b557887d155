// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use trust_gate::auth::domain::Secret;
use trust_gate::auth::{
    AuthGate, CachePolicy, FederatedDomain, HttpMetadataFetcher, LocalDomain, TrustDomainConfig,
};

pub const LOCAL_SECRET: &str = "super-secret-key-1-for-local-hs256";
pub const LOCAL_ISSUER: &str = "local-issuer-1";
pub const LOCAL_AUDIENCE: &str = "local-audience-1";
pub const FEDERATED_AUDIENCE: &str = "api";
pub const REALM_PATH: &str = "/realms/test";
pub const DISCOVERY_PATH: &str = "/realms/test/.well-known/openid-configuration";
pub const JWKS_PATH: &str = "/realms/test/protocol/openid-connect/certs";

pub fn local_domain(audience: &str) -> TrustDomainConfig {
    TrustDomainConfig::Local(LocalDomain {
        name: "local".to_string(),
        issuer: LOCAL_ISSUER.to_string(),
        audience: audience.to_string(),
        secret: Secret::parse(LOCAL_SECRET).unwrap(),
        clock_skew: Duration::ZERO,
    })
}

/// Federated domain pointing at a mock provider over plain HTTP.
pub fn federated_domain(server: &MockServer) -> TrustDomainConfig {
    let mut domain = FederatedDomain::from_authority(
        "keycloak",
        &format!("{}{REALM_PATH}", server.uri()),
        FEDERATED_AUDIENCE,
    );
    domain.require_https = false;
    TrustDomainConfig::Federated(domain)
}

pub fn gate(domains: Vec<TrustDomainConfig>, policy: CachePolicy) -> AuthGate {
    let fetcher = Arc::new(HttpMetadataFetcher::new(Duration::from_secs(5)));
    AuthGate::new(domains, fetcher, policy).unwrap()
}

pub fn now() -> i64 {
    Utc::now().timestamp()
}

/// Claims for a local token, valid for one hour from `issued`.
pub fn local_claims(issued: i64) -> Value {
    json!({
        "unique_name": "TestUser",
        "iss": LOCAL_ISSUER,
        "aud": LOCAL_AUDIENCE,
        "nbf": issued,
        "iat": issued,
        "exp": issued + 3600
    })
}

pub fn sign_hs256(claims: &Value, secret: &str) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

/// Ed25519 signing key of the mock provider.
pub struct ProviderKey {
    pub kid: String,
    pkcs8: Vec<u8>,
    public: Vec<u8>,
}

impl ProviderKey {
    pub fn generate(kid: &str) -> Self {
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&SystemRandom::new()).unwrap();
        let pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap();
        Self {
            kid: kid.to_string(),
            pkcs8: pkcs8.as_ref().to_vec(),
            public: pair.public_key().as_ref().to_vec(),
        }
    }

    pub fn jwk(&self) -> Value {
        json!({
            "kty": "OKP",
            "crv": "Ed25519",
            "use": "sig",
            "alg": "EdDSA",
            "kid": self.kid,
            "x": URL_SAFE_NO_PAD.encode(&self.public)
        })
    }

    pub fn sign(&self, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(self.kid.clone());
        encode(&header, claims, &EncodingKey::from_ed_der(&self.pkcs8)).unwrap()
    }
}

pub fn issuer(server: &MockServer) -> String {
    format!("{}{REALM_PATH}", server.uri())
}

/// Claims for a federated token, valid for one hour.
pub fn federated_claims(server: &MockServer) -> Value {
    let issued = now();
    json!({
        "sub": "f3a1c2d4-0000-4000-8000-000000000001",
        "preferred_username": "alice",
        "iss": issuer(server),
        "aud": ["account", FEDERATED_AUDIENCE],
        "nbf": issued,
        "iat": issued,
        "exp": issued + 3600,
        "realm_access": {"roles": ["user"]}
    })
}

pub async fn mount_discovery(server: &MockServer, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(DISCOVERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": issuer(server),
            "jwks_uri": format!("{}{JWKS_PATH}", server.uri()),
            "id_token_signing_alg_values_supported": ["EdDSA"]
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

pub async fn mount_jwks(server: &MockServer, keys: &[&ProviderKey], expected_calls: u64) {
    let keys: Vec<Value> = keys.iter().map(|k| k.jwk()).collect();
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": keys })))
        .expect(expected_calls)
        .mount(server)
        .await;
}
