//! Axum authorization gate
//!
//! A route guarded by [`require_authenticated`] only runs when one of the
//! accepted schemes establishes a [`Principal`]. The principal is inserted
//! into the request extensions for the handler. Otherwise the request is
//! challenged: redirect to login for the cookie scheme, 401 for bearer.

use crate::error::AuthError;
use crate::schemes::AuthSchemes;
use crate::types::{AuthScheme, Principal};
use anyhow::{Result, bail};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Policy of a route: authenticated under one of the accepted schemes
///
/// # Example
///
/// ```rust,ignore
/// use axum::{Router, middleware, routing::get};
/// use keygate_auth::axum::{RequireAuthenticated, require_authenticated};
///
/// let policy = RequireAuthenticated::new(schemes, &["Cookies", "Bearer"])?;
/// let app = Router::new()
///     .route("/api/test", get(handler))
///     .route_layer(middleware::from_fn_with_state(policy, require_authenticated));
/// ```
#[derive(Clone)]
pub struct RequireAuthenticated {
    accepted: Arc<Vec<Arc<dyn AuthScheme>>>,
    default_scheme: Option<String>,
}

impl RequireAuthenticated {
    /// Resolves the accepted scheme names against the registry
    pub fn new(schemes: &AuthSchemes, accepted: &[&str]) -> Result<Self> {
        if accepted.is_empty() {
            bail!("a route policy needs at least one scheme");
        }
        let mut resolved = Vec::with_capacity(accepted.len());
        for name in accepted {
            match schemes.get(name) {
                Some(scheme) => resolved.push(scheme.clone()),
                None => bail!("unknown authentication scheme '{name}'"),
            }
        }
        Ok(Self {
            accepted: Arc::new(resolved),
            default_scheme: schemes.default_scheme().map(String::from),
        })
    }

    /// Scheme that challenges requests without any credentials
    fn challenger(&self) -> &Arc<dyn AuthScheme> {
        self.default_scheme
            .as_deref()
            .and_then(|name| self.accepted.iter().find(|s| s.name() == name))
            .unwrap_or(&self.accepted[0])
    }
}

/// Authorization gate middleware, see [`RequireAuthenticated`]
pub async fn require_authenticated(
    State(policy): State<RequireAuthenticated>,
    req: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = req.into_parts();

    let mut first_failure: Option<(&Arc<dyn AuthScheme>, AuthError)> = None;
    let mut principal: Option<Principal> = None;
    for scheme in policy.accepted.iter() {
        match scheme.authenticate(&parts).await {
            Ok(Some(p)) => {
                principal = Some(p);
                break;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("authentication failed: scheme={} error={e}", scheme.name());
                if first_failure.is_none() {
                    first_failure = Some((scheme, e));
                }
            }
        }
    }

    if let Some(principal) = principal {
        info!(
            "authenticated: scheme={} subject={:?}",
            principal.scheme,
            principal.subject()
        );
        parts.extensions.insert(principal);
        return next.run(Request::from_parts(parts, body)).await;
    }

    match &first_failure {
        Some((scheme, error)) => scheme.challenge(&parts, Some(error)),
        None => {
            let scheme = policy.challenger();
            info!(
                "no credentials: challenging with scheme={} path={}",
                scheme.name(),
                parts.uri.path()
            );
            scheme.challenge(&parts, None)
        }
    }
}
