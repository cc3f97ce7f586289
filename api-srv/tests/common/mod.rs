//! In-process server wired to a wiremock Keycloak realm

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use axum_extra::extract::cookie::Cookie;
use base64::Engine;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use keygate_api_srv::app::{Environment, build_router};
use keygate_api_srv::state::AppState;
use keygate_auth::config::KeycloakConfig;
use rsa::RsaPrivateKey;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::LazyLock;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const REALM: &str = "test";
pub const CLIENT_ID: &str = "keygate-test";
const KEY_ID: &str = "realm-key";

/// Realm signing key, generated once per test binary
struct RealmKey {
    encoding_key: EncodingKey,
    jwk: Value,
}

static REALM_KEY: LazyLock<RealmKey> = LazyLock::new(|| {
    let mut rng = rand::thread_rng();
    let private_key =
        RsaPrivateKey::new(&mut rng, 2048).expect("failed to generate RSA private key");
    let public_key = private_key.to_public_key();
    let private_pem = private_key
        .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
        .expect("failed to encode private key as PEM");
    let b64 = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    RealmKey {
        encoding_key: EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .expect("failed to create encoding key"),
        jwk: json!({
            "kty": "RSA",
            "use": "sig",
            "alg": "RS256",
            "kid": KEY_ID,
            "n": b64.encode(public_key.n().to_bytes_be()),
            "e": b64.encode(public_key.e().to_bytes_be()),
        }),
    }
});

pub struct FakeRealm {
    pub server: MockServer,
}

impl FakeRealm {
    pub async fn start() -> Self {
        let realm = Self {
            server: MockServer::start().await,
        };
        let issuer = realm.issuer();

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
            .mount(&realm.server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("/realms/{REALM}/protocol/openid-connect/certs")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "keys": [REALM_KEY.jwk] })),
            )
            .mount(&realm.server)
            .await;

        realm
    }

    pub fn issuer(&self) -> String {
        format!("{}/realms/{REALM}", self.server.uri())
    }

    pub fn config(&self) -> KeycloakConfig {
        config_for(&self.server.uri())
    }

    pub fn app(&self, environment: Environment) -> (Router, AppState) {
        app_for(self.config(), environment)
    }

    pub fn sign(&self, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(KEY_ID.to_string());
        encode(&header, claims, &REALM_KEY.encoding_key).expect("failed to encode token")
    }

    pub fn id_token(&self, subject: &str, nonce: &str) -> String {
        let now = chrono::Utc::now().timestamp();
        self.sign(&json!({
            "iss": self.issuer(),
            "sub": subject,
            "aud": CLIENT_ID,
            "exp": now + 300,
            "iat": now,
            "nonce": nonce,
            "preferred_username": "alice",
        }))
    }

    pub async fn mount_token(&self, response: Value) {
        Mock::given(method("POST"))
            .and(path(format!("/realms/{REALM}/protocol/openid-connect/token")))
            .respond_with(ResponseTemplate::new(200).set_body_json(response))
            .mount(&self.server)
            .await;
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
}

pub fn config_for(server_url: &str) -> KeycloakConfig {
    let env = HashMap::from([
        ("KEYCLOAK_SERVER_URL", server_url.to_string()),
        ("KEYCLOAK_REALM", REALM.to_string()),
        ("CLIENT_ID", CLIENT_ID.to_string()),
        ("CLIENT_SECRET", "test-client-secret".to_string()),
        ("PUBLIC_URL", "http://keygate.test".to_string()),
        ("PROVIDER_TIMEOUT_SECS", "2".to_string()),
    ]);
    KeycloakConfig::from_lookup(|name| env.get(name).cloned()).expect("valid test config")
}

pub fn app_for(config: KeycloakConfig, environment: Environment) -> (Router, AppState) {
    let state = AppState::new(config).expect("state should build");
    let router = build_router(state.clone(), environment).expect("router should build");
    (router, state)
}

/// Server whose realm cannot be reached, nothing listens on port 1
pub fn offline_app() -> Router {
    app_for(config_for("http://127.0.0.1:1"), Environment::Development).0
}

pub async fn get(
    app: &Router,
    uri: &str,
    headers: &[(header::HeaderName, String)],
) -> Response<Body> {
    let mut request = Request::get(uri);
    for (name, value) in headers {
        request = request.header(name, value);
    }
    app.clone()
        .oneshot(request.body(Body::empty()).expect("request should build"))
        .await
        .expect("request should succeed")
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("location header")
        .to_str()
        .expect("ascii location")
        .to_string()
}

pub fn set_cookies(response: &Response<Body>) -> HashMap<String, Cookie<'static>> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| {
            let cookie = Cookie::parse(value.to_str().expect("ascii cookie").to_string())
                .expect("valid Set-Cookie");
            (cookie.name().to_string(), cookie)
        })
        .collect()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    serde_json::from_slice(&body).expect("body should be JSON")
}
