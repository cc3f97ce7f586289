//! Bearer token scheme backed by token introspection
//!
//! Non-interactive callers send `Authorization: Bearer <token>`. The token is
//! sent to the identity provider's introspection endpoint and accepted only if
//! the provider reports it active and its issuer is in the allow-list.

use crate::error::AuthError;
use crate::types::{AuthScheme, Claim, Principal};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use http::{
    HeaderValue,
    header::{AUTHORIZATION, WWW_AUTHENTICATE},
    request::Parts,
};
use std::sync::Arc;
use tracing::debug;

/// Scheme name of bearer token introspection
pub const BEARER_SCHEME: &str = "Bearer";

/// Result of introspecting a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntrospectedToken {
    pub active: bool,
    pub issuer: Option<String>,
    pub claims: Vec<Claim>,
}

/// Asks the identity provider whether a token is currently valid
#[async_trait::async_trait]
pub trait TokenIntrospector: Send + Sync {
    async fn introspect(&self, token: &str) -> Result<IntrospectedToken, AuthError>;
}

/// Extract the bearer token from the Authorization header
///
/// Returns `None` when there is no Authorization header or it uses another
/// scheme; an empty bearer token is returned as `Some("")`.
pub fn bearer_token(parts: &Parts) -> Option<&str> {
    let header = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = header.split_once(' ').unwrap_or((header, ""));
    if scheme.eq_ignore_ascii_case("bearer") {
        Some(token.trim())
    } else {
        None
    }
}

/// Authentication by token introspection, challenged with 401
pub struct IntrospectionScheme {
    introspector: Arc<dyn TokenIntrospector>,
    valid_issuers: Vec<String>,
}

impl IntrospectionScheme {
    pub fn new(introspector: Arc<dyn TokenIntrospector>, valid_issuers: Vec<String>) -> Self {
        Self {
            introspector,
            valid_issuers,
        }
    }

    fn is_valid_issuer(&self, issuer: &str) -> bool {
        let issuer = issuer.trim_end_matches('/');
        self.valid_issuers.iter().any(|valid| valid == issuer)
    }

    /// Check an introspection result against the acceptance rules
    pub fn accept(&self, introspected: IntrospectedToken) -> Result<Principal, AuthError> {
        if !introspected.active {
            return Err(AuthError::IntrospectionRejected(
                "token is not active".to_string(),
            ));
        }
        match introspected.issuer.as_deref() {
            Some(issuer) if self.is_valid_issuer(issuer) => {}
            Some(issuer) => {
                return Err(AuthError::IntrospectionRejected(format!(
                    "issuer '{issuer}' is not allowed"
                )));
            }
            None => {
                return Err(AuthError::IntrospectionRejected(
                    "token has no issuer".to_string(),
                ));
            }
        }
        Ok(Principal::new(BEARER_SCHEME, introspected.claims))
    }
}

#[async_trait::async_trait]
impl AuthScheme for IntrospectionScheme {
    fn name(&self) -> &str {
        BEARER_SCHEME
    }

    async fn authenticate(&self, parts: &Parts) -> Result<Option<Principal>, AuthError> {
        let Some(token) = bearer_token(parts) else {
            return Ok(None);
        };
        if token.is_empty() {
            return Err(AuthError::TokenInvalid("empty bearer token".to_string()));
        }
        let introspected = self.introspector.introspect(token).await?;
        debug!(
            "introspection: active={} issuer={:?}",
            introspected.active, introspected.issuer
        );
        self.accept(introspected).map(Some)
    }

    fn challenge(&self, _parts: &Parts, failure: Option<&AuthError>) -> Response {
        let www_authenticate = match failure {
            Some(AuthError::ProviderUnreachable(_)) => {
                r#"Bearer error="temporarily_unavailable""#
            }
            Some(_) => r#"Bearer error="invalid_token""#,
            None => "Bearer",
        };
        let mut response = (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        response.headers_mut().insert(
            WWW_AUTHENTICATE,
            HeaderValue::from_static(www_authenticate),
        );
        response
    }
}
