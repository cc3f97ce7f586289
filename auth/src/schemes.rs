//! Registry of named authentication schemes

use crate::types::AuthScheme;
use anyhow::{Result, bail};
use std::sync::Arc;

/// Authentication schemes referenced by name, with one default scheme
///
/// The default scheme challenges requests that carry no credentials at all.
///
/// # Example
///
/// ```rust
/// use keygate_auth::introspection::{IntrospectedToken, IntrospectionScheme, TokenIntrospector};
/// use keygate_auth::schemes::AuthSchemes;
/// use keygate_auth::session::{CookieScheme, SessionSettings, COOKIE_SCHEME};
/// use keygate_auth::error::AuthError;
/// use std::sync::Arc;
///
/// struct Offline;
///
/// #[async_trait::async_trait]
/// impl TokenIntrospector for Offline {
///     async fn introspect(&self, _token: &str) -> Result<IntrospectedToken, AuthError> {
///         Err(AuthError::ProviderUnreachable("offline".to_string()))
///     }
/// }
///
/// let settings = SessionSettings {
///     signing_secret: b"example-secret-key-32-bytes-long".to_vec(),
///     lifetime: chrono::Duration::minutes(50),
///     secure_cookies: false,
///     cookie_domain: None,
/// };
/// let schemes = AuthSchemes::new()
///     .with_scheme(Arc::new(CookieScheme::new(settings)))
///     .with_scheme(Arc::new(IntrospectionScheme::new(Arc::new(Offline), vec![])))
///     .with_default(COOKIE_SCHEME)
///     .expect("cookie scheme is registered");
/// assert_eq!(schemes.default_scheme(), Some(COOKIE_SCHEME));
/// ```
#[derive(Clone)]
pub struct AuthSchemes {
    schemes: Vec<Arc<dyn AuthScheme>>,
    default_scheme: Option<String>,
}

impl AuthSchemes {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            schemes: Vec::new(),
            default_scheme: None,
        }
    }

    /// Registers a scheme. The first registered scheme is the default until
    /// [`AuthSchemes::with_default`] says otherwise.
    pub fn with_scheme(mut self, scheme: Arc<dyn AuthScheme>) -> Self {
        if self.default_scheme.is_none() {
            self.default_scheme = Some(scheme.name().to_string());
        }
        self.schemes.push(scheme);
        self
    }

    pub fn with_default(mut self, name: &str) -> Result<Self> {
        if self.get(name).is_none() {
            bail!("cannot make unknown scheme '{name}' the default");
        }
        self.default_scheme = Some(name.to_string());
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn AuthScheme>> {
        self.schemes.iter().find(|s| s.name() == name)
    }

    pub fn default_scheme(&self) -> Option<&str> {
        self.default_scheme.as_deref()
    }
}
