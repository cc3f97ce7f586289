//! Fake Keycloak realm served by wiremock

#![allow(dead_code)]

use base64::Engine;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use keygate_auth::config::KeycloakConfig;
use rsa::RsaPrivateKey;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::LazyLock;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const REALM: &str = "test";
pub const CLIENT_ID: &str = "keygate-test";
pub const CLIENT_SECRET: &str = "test-client-secret";
pub const KEY_ID: &str = "test-key";

/// Generated once per test binary
static KEYPAIR: LazyLock<TestKeyPair> = LazyLock::new(TestKeyPair::generate);

/// RSA key pair signing the fake realm's ID tokens
pub struct TestKeyPair {
    encoding_key: EncodingKey,
    jwk: Value,
}

impl TestKeyPair {
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let private_key =
            RsaPrivateKey::new(&mut rng, 2048).expect("failed to generate RSA private key");
        let public_key = private_key.to_public_key();

        let private_pem = private_key
            .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
            .expect("failed to encode private key as PEM");
        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .expect("failed to create encoding key");

        let b64 = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        let jwk = json!({
            "kty": "RSA",
            "use": "sig",
            "alg": "RS256",
            "kid": KEY_ID,
            "n": b64.encode(public_key.n().to_bytes_be()),
            "e": b64.encode(public_key.e().to_bytes_be()),
        });

        Self { encoding_key, jwk }
    }

    pub fn sign(&self, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(KEY_ID.to_string());
        encode(&header, claims, &self.encoding_key).expect("failed to encode token")
    }
}

pub struct MockKeycloak {
    pub server: MockServer,
    pub keypair: &'static TestKeyPair,
}

impl MockKeycloak {
    /// Start a realm serving discovery and JWKS
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let mock = Self {
            server,
            keypair: &KEYPAIR,
        };

        let issuer = mock.issuer();
        Mock::given(method("GET"))
            .and(path(format!("/realms/{REALM}/.well-known/openid-configuration")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": issuer,
                "authorization_endpoint": format!("{issuer}/protocol/openid-connect/auth"),
                "token_endpoint": format!("{issuer}/protocol/openid-connect/token"),
                "introspection_endpoint": format!("{issuer}/protocol/openid-connect/token/introspect"),
                "end_session_endpoint": format!("{issuer}/protocol/openid-connect/logout"),
                "jwks_uri": format!("{issuer}/protocol/openid-connect/certs"),
                "response_types_supported": ["code"],
                "subject_types_supported": ["public"],
                "id_token_signing_alg_values_supported": ["RS256"],
            })))
            .mount(&mock.server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("/realms/{REALM}/protocol/openid-connect/certs")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "keys": [mock.keypair.jwk] })),
            )
            .mount(&mock.server)
            .await;

        mock
    }

    pub fn issuer(&self) -> String {
        format!("{}/realms/{REALM}", self.server.uri())
    }

    pub fn config(&self) -> KeycloakConfig {
        config_for(&self.server.uri())
    }

    pub async fn mount_introspection(&self, response: Value) {
        Mock::given(method("POST"))
            .and(path(format!(
                "/realms/{REALM}/protocol/openid-connect/token/introspect"
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(response))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_token(&self, response: Value) {
        Mock::given(method("POST"))
            .and(path(format!("/realms/{REALM}/protocol/openid-connect/token")))
            .respond_with(ResponseTemplate::new(200).set_body_json(response))
            .mount(&self.server)
            .await;
    }

    /// Signed ID token for `subject` with the given nonce
    pub fn id_token(&self, subject: &str, nonce: &str) -> String {
        let now = chrono::Utc::now().timestamp();
        self.keypair.sign(&json!({
            "iss": self.issuer(),
            "sub": subject,
            "aud": CLIENT_ID,
            "exp": now + 300,
            "iat": now,
            "nonce": nonce,
            "email": "alice@example.com",
            "preferred_username": "alice",
            "roles": ["reader", "writer"],
        }))
    }
}

pub fn env(server_url: &str) -> HashMap<&'static str, String> {
    HashMap::from([
        ("KEYCLOAK_SERVER_URL", server_url.to_string()),
        ("KEYCLOAK_REALM", REALM.to_string()),
        ("CLIENT_ID", CLIENT_ID.to_string()),
        ("CLIENT_SECRET", CLIENT_SECRET.to_string()),
        ("PROVIDER_TIMEOUT_SECS", "5".to_string()),
    ])
}

pub fn config_for(server_url: &str) -> KeycloakConfig {
    let vars = env(server_url);
    KeycloakConfig::from_lookup(|name| vars.get(name).cloned()).expect("valid test config")
}
