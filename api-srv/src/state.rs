use anyhow::Result;
use keygate_auth::config::KeycloakConfig;
use keygate_auth::error::AuthError;
use keygate_auth::introspection::IntrospectionScheme;
use keygate_auth::provider::KeycloakProvider;
use keygate_auth::schemes::AuthSchemes;
use keygate_auth::session::{COOKIE_SCHEME, CookieScheme, SessionSettings};
use std::sync::Arc;

/// State shared by all handlers, immutable after startup
#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<KeycloakConfig>,
    pub provider: Arc<KeycloakProvider>,
    pub session: SessionSettings,
}

impl AppState {
    pub fn new(config: KeycloakConfig) -> Result<Self, AuthError> {
        let provider =
            KeycloakProvider::new(config.client_registration(), config.provider_timeout)?;
        let session = SessionSettings {
            signing_secret: config.signing_secret.clone(),
            lifetime: config.session_lifetime,
            secure_cookies: config.secure_cookies,
            cookie_domain: config.cookie_domain.clone(),
        };
        Ok(Self {
            config: Arc::new(config),
            provider: Arc::new(provider),
            session,
        })
    }

    /// Cookie session and bearer introspection, the cookie scheme being the default
    pub fn auth_schemes(&self) -> Result<AuthSchemes> {
        AuthSchemes::new()
            .with_scheme(Arc::new(CookieScheme::new(self.session.clone())))
            .with_scheme(Arc::new(IntrospectionScheme::new(
                self.provider.clone(),
                self.config.valid_issuers.clone(),
            )))
            .with_default(COOKIE_SCHEME)
    }
}
