use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Authentication failures
///
/// Inside the authorization gate every variant leads to a challenge. On the
/// login endpoints they are mapped to HTTP status codes.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("identity provider unreachable: {0}")]
    ProviderUnreachable(String),

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("token rejected by introspection: {0}")]
    IntrospectionRejected(String),

    #[error("session expired")]
    SessionExpired,

    #[error("invalid OAuth state")]
    InvalidState,

    #[error("invalid return URL")]
    InvalidReturnUrl,

    #[error("unknown identity provider: {0}")]
    UnknownProvider(String),

    #[error("token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AuthError::InvalidReturnUrl => (StatusCode::BAD_REQUEST, "Invalid return URL"),
            AuthError::InvalidState => (StatusCode::BAD_REQUEST, "Invalid OAuth state"),
            AuthError::UnknownProvider(_) => (StatusCode::NOT_FOUND, "Unknown identity provider"),
            AuthError::TokenExchangeFailed(_) => {
                (StatusCode::UNAUTHORIZED, "Token exchange failed")
            }
            AuthError::TokenInvalid(_) | AuthError::IntrospectionRejected(_) => {
                (StatusCode::UNAUTHORIZED, "Invalid token")
            }
            AuthError::SessionExpired => (StatusCode::UNAUTHORIZED, "Session expired"),
            AuthError::ProviderUnreachable(_) => {
                (StatusCode::BAD_GATEWAY, "Identity provider unreachable")
            }
            AuthError::Internal(msg) => {
                tracing::error!("auth internal error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };
        if status != StatusCode::INTERNAL_SERVER_ERROR {
            tracing::warn!("auth request failed: {self}");
        }

        (status, message).into_response()
    }
}
