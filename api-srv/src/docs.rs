//! API documentation
//!
//! The OpenAPI document declares the realm's authorization code flow so that
//! Swagger UI can obtain tokens for the "Try it out" calls. Only mounted
//! outside production.

use crate::claims::{self, ClaimMap};
use axum::response::Redirect;
use keygate_auth::config::KeycloakConfig;
use utoipa::OpenApi;
use utoipa::openapi::security::{AuthorizationCode, Flow, OAuth2, Scopes, SecurityScheme};
use utoipa_swagger_ui::{SwaggerUi, oauth};

pub const SWAGGER_PATH: &str = "/swagger";
pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

/// Name of the OAuth2 security scheme referenced by protected operations
pub const SECURITY_SCHEME: &str = "keycloak";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "keygate",
        description = "Claims API authenticated by a Keycloak realm"
    ),
    paths(claims::echo_claims),
    components(schemas(ClaimMap)),
    tags((name = "claims", description = "Identity of the caller"))
)]
pub struct ApiDoc;

/// OpenAPI document with the realm's authorization code flow
pub fn openapi(config: &KeycloakConfig) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    let scopes = Scopes::from_iter(
        config
            .scopes
            .iter()
            .map(|scope| (scope.clone(), format!("{scope} scope"))),
    );
    let flow = Flow::AuthorizationCode(AuthorizationCode::new(
        config.authorization_endpoint(),
        config.token_endpoint(),
        scopes,
    ));
    doc.components
        .get_or_insert_with(Default::default)
        .add_security_scheme(SECURITY_SCHEME, SecurityScheme::OAuth2(OAuth2::new([flow])));
    doc
}

/// Swagger UI preconfigured for the realm client, using PKCE
///
/// The client secret is not handed to the browser.
pub fn swagger_ui(config: &KeycloakConfig) -> SwaggerUi {
    let oauth_config = oauth::Config::new()
        .client_id(&config.client_id)
        .app_name("keygate")
        .scopes(config.scopes.clone())
        .use_pkce_with_authorization_code_grant(true);
    SwaggerUi::new(SWAGGER_PATH)
        .url(OPENAPI_PATH, openapi(config))
        .oauth(oauth_config)
}

/// GET / - the documentation is the landing page
pub async fn root_redirect() -> Redirect {
    Redirect::temporary(SWAGGER_PATH)
}
