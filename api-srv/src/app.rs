use crate::state::AppState;
use crate::{claims, docs, login, observability::observability_middleware};
use anyhow::Result;
use axum::{Router, middleware, routing::get};
use clap::ValueEnum;
use keygate_auth::axum::{RequireAuthenticated, require_authenticated};
use keygate_auth::introspection::BEARER_SCHEME;
use keygate_auth::session::{COOKIE_SCHEME, LOGIN_PATH, LOGOUT_PATH};
use tracing::info;

/// Deployment environment, decides whether the API documentation is served
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

/// Assemble every route of the service
pub fn build_router(state: AppState, environment: Environment) -> Result<Router> {
    let schemes = state.auth_schemes()?;
    let claims_policy = RequireAuthenticated::new(&schemes, &[COOKIE_SCHEME, BEARER_SCHEME])?;

    let api = Router::new()
        .route("/api/test", get(claims::echo_claims))
        .route_layer(middleware::from_fn_with_state(
            claims_policy,
            require_authenticated,
        ));

    let mut app = Router::new()
        .route("/", get(docs::root_redirect))
        .route(LOGIN_PATH, get(login::login))
        .route("/callback/login/{provider}", get(login::login_callback))
        .route(LOGOUT_PATH, get(login::logout))
        .route("/callback/logout/{provider}", get(login::logout_callback))
        .with_state(state.clone())
        .merge(api);

    if environment.is_production() {
        info!("production environment: API documentation disabled");
    } else {
        info!(
            "serving API documentation at {} ({environment:?})",
            docs::SWAGGER_PATH
        );
        app = app.merge(docs::swagger_ui(&state.config));
    }

    Ok(app.layer(middleware::from_fn(observability_middleware)))
}
