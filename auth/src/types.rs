use crate::error::AuthError;
use axum::response::Response;
use http::request::Parts;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single typed fact about an authenticated principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    #[serde(rename = "type")]
    pub claim_type: String,
    pub value: String,
}

impl Claim {
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }
}

/// Authenticated identity of the current request
///
/// Rebuilt on every request from the session cookie or the bearer token and
/// inserted into the request extensions by the authorization gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Name of the scheme that authenticated the request
    pub scheme: String,
    /// Claims of the token, repeated values of one type in token order
    pub claims: Vec<Claim>,
}

impl Principal {
    pub fn new(scheme: impl Into<String>, claims: Vec<Claim>) -> Self {
        Self {
            scheme: scheme.into(),
            claims,
        }
    }

    /// First value of the given claim type
    pub fn find_first(&self, claim_type: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|c| c.claim_type == claim_type)
            .map(|c| c.value.as_str())
    }

    /// Subject identifier (`sub`)
    pub fn subject(&self) -> Option<&str> {
        self.find_first("sub")
    }

    /// Claim type to claim value, keeping the first value of duplicated types
    pub fn claim_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        for claim in &self.claims {
            map.entry(claim.claim_type.clone())
                .or_insert_with(|| claim.value.clone());
        }
        map
    }
}

/// A named way of establishing a [`Principal`] from an incoming request
#[async_trait::async_trait]
pub trait AuthScheme: Send + Sync {
    /// Name used to reference the scheme from route policies
    fn name(&self) -> &str;

    /// Authenticate the request.
    ///
    /// Returns `Ok(None)` when the request carries no credentials for this
    /// scheme, and an error when it carries credentials that are not valid.
    async fn authenticate(&self, parts: &Parts) -> Result<Option<Principal>, AuthError>;

    /// Response sent when the request must authenticate with this scheme
    fn challenge(&self, parts: &Parts, failure: Option<&AuthError>) -> Response;
}
