//! Common test utilities for integration tests
//!
//! Provides a mock JWKS endpoint, token signing with the fixture keys and
//! ready-made configurations for each deployment mode.

#![allow(dead_code)]

use datastore_auth::{Audiences, AuthConfig, AuthMode, Authorizer};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};
use std::time::{SystemTime, UNIX_EPOCH};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

/// Key published by the mock identity provider
pub const SIGNING_KEY_PEM: &str = include_str!("../fixtures/signing_key.pem");
/// Key the identity provider never published
pub const ROGUE_KEY_PEM: &str = include_str!("../fixtures/rogue_key.pem");
/// JWKS containing the public half of [`SIGNING_KEY_PEM`]
pub const JWKS: &str = include_str!("../fixtures/jwks.json");
/// Key id of the published key
pub const KEY_ID: &str = "datastore-signing-1";

pub const DATA_AUDIENCE: &str = "datastore";
pub const JOBS_AUDIENCE: &str = "datastore-jobs";
pub const PROVISIONING_AUDIENCE: &str = "datastore-provisioning";
pub const API_SERVICE_KEY: &str = "test_key_1234567890abcdef1234567890abc";

pub const USER_ID: &str = "0f6b2b8e-5d5c-4c1e-9d3b-6a9a7f1e2c44";
pub const OTHER_USER_ID: &str = "8d1d7c3a-2f0e-4b6a-a5c1-93e0f4b7d210";
pub const DATA_ADMINISTRATOR: &str = "role/dataadministrator";

/// Mock identity provider serving a JWKS
pub struct MockJwksServer {
    pub server: MockServer,
    pub jwks_endpoint: String,
}

impl MockJwksServer {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let jwks_endpoint = format!("{}/jwks", server.uri());
        Self {
            server,
            jwks_endpoint,
        }
    }

    /// Serve the fixture JWKS, asserting the number of fetches on drop
    pub async fn serve_jwks(&self, expected_fetches: u64) {
        let jwks: Value = serde_json::from_str(JWKS).unwrap();
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks))
            .expect(expected_fetches)
            .mount(&self.server)
            .await;
    }

    /// Serve the fixture JWKS for any number of fetches
    pub async fn serve_jwks_unbounded(&self) {
        let jwks: Value = serde_json::from_str(JWKS).unwrap();
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks))
            .mount(&self.server)
            .await;
    }

    /// Fail every fetch with `status`, asserting the number of fetches on drop
    pub async fn serve_error(&self, status: u16, expected_fetches: u64) {
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(status))
            .expect(expected_fetches)
            .mount(&self.server)
            .await;
    }

    pub async fn serve_body(&self, body: &str) {
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&self.server)
            .await;
    }
}

pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

pub fn sign_with(pem: &str, kid: &str, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    encode(
        &header,
        claims,
        &EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap(),
    )
    .unwrap()
}

/// Token signed with the published key
pub fn sign(claims: &Value) -> String {
    sign_with(SIGNING_KEY_PEM, KEY_ID, claims)
}

/// Token signed with a key the identity provider never published
pub fn sign_rogue(claims: &Value) -> String {
    sign_with(ROGUE_KEY_PEM, KEY_ID, claims)
}

pub fn user_claims(sub: &str, aud: &str) -> Value {
    json!({ "sub": sub, "aud": aud, "exp": now() + 600 })
}

pub fn accreditation_claims(user_id: &str, aud: Value, role: &str) -> Value {
    json!({
        "sub": user_id,
        "user/uuid": user_id,
        "aud": aud,
        "accreditation/role": role,
        "exp": now() + 600,
    })
}

pub fn user_info_claims(user_id: &str) -> Value {
    json!({
        "user/uuid": user_id,
        "user/firstName": "Ada",
        "user/lastName": "Lovelace",
        "exp": now() + 600,
    })
}

pub fn audiences() -> Audiences {
    Audiences {
        data: DATA_AUDIENCE.to_string(),
        jobs: JOBS_AUDIENCE.to_string(),
        provisioning: PROVISIONING_AUDIENCE.to_string(),
    }
}

pub fn config(mode: AuthMode, jwks_url: Option<String>) -> AuthConfig {
    AuthConfig::new(mode, jwks_url, audiences(), API_SERVICE_KEY).with_provisioners([USER_ID])
}

pub fn full_authorizer(jwks_endpoint: &str) -> Authorizer {
    Authorizer::from_config(&config(AuthMode::Full, Some(jwks_endpoint.to_string()))).unwrap()
}

pub fn skip_signature_authorizer() -> Authorizer {
    Authorizer::from_config(&config(AuthMode::SkipSignature, None)).unwrap()
}

pub fn disabled_authorizer() -> Authorizer {
    Authorizer::from_config(&config(AuthMode::Off, None)).unwrap()
}
