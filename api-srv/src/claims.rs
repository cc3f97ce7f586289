use axum::{Extension, Json};
use keygate_auth::types::Principal;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;
use utoipa::ToSchema;

/// Claims of the caller, one value per claim type
#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct ClaimMap(pub BTreeMap<String, String>);

/// Echo the claims of the authenticated caller
///
/// When a claim type occurs more than once the first value is returned.
#[utoipa::path(
    get,
    path = "/api/test",
    tag = "claims",
    security(("keycloak" = [])),
    responses(
        (status = 200, description = "Claims of the authenticated caller", body = ClaimMap),
        (status = 307, description = "No valid session, redirect to login"),
        (status = 401, description = "Bearer token rejected"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn echo_claims(Extension(principal): Extension<Principal>) -> Json<ClaimMap> {
    debug!(
        "echoing {} claims for scheme={}",
        principal.claims.len(),
        principal.scheme
    );
    Json(ClaimMap(principal.claim_map()))
}
