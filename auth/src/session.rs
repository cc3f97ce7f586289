//! Cookie session scheme
//!
//! After an interactive login the principal's claims are stored in a signed
//! cookie with a fixed absolute lifetime. The session is never renewed: a
//! request at or after `expires_at` must log in again.

use crate::error::AuthError;
use crate::oauth_state::{sign, verify};
use crate::types::{AuthScheme, Claim, Principal};
use crate::url_validation::{login_redirect, validate_return_url};
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Duration, Utc};
use http::request::Parts;
use serde::{Deserialize, Serialize};

/// Scheme name of the cookie session
pub const COOKIE_SCHEME: &str = "Cookies";

pub const SESSION_COOKIE: &str = "keygate_session";
pub const OAUTH_STATE_COOKIE: &str = "keygate_oauth_state";
pub const LOGIN_PATH: &str = "/login";
pub const LOGOUT_PATH: &str = "/logout";

/// Lifetime of the nonce cookie set while the user is at the provider
pub const OAUTH_STATE_MAX_AGE_SECS: i64 = 600;

/// Largest `name=value` pair user agents store, larger cookies are dropped
pub const MAX_COOKIE_BYTES: usize = 4096;

/// Session established by an interactive login
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub claims: Vec<Claim>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn issue(claims: Vec<Claim>, now: DateTime<Utc>, lifetime: Duration) -> Self {
        Self {
            claims,
            issued_at: now,
            expires_at: now + lifetime,
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Cookie settings shared by the cookie scheme and the login endpoints
#[derive(Clone)]
pub struct SessionSettings {
    pub signing_secret: Vec<u8>,
    pub lifetime: Duration,
    pub secure_cookies: bool,
    pub cookie_domain: Option<String>,
}

impl std::fmt::Debug for SessionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSettings")
            .field("signing_secret", &"(not printed)")
            .field("lifetime", &self.lifetime)
            .field("secure_cookies", &self.secure_cookies)
            .field("cookie_domain", &self.cookie_domain)
            .finish()
    }
}

impl SessionSettings {
    /// Create a cookie with the common settings
    pub fn create_cookie(
        &self,
        name: &'static str,
        value: String,
        max_age_secs: i64,
    ) -> Cookie<'static> {
        let mut cookie = Cookie::build((name, value))
            .http_only(true)
            .secure(self.secure_cookies)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(time::Duration::seconds(max_age_secs));

        if let Some(domain) = &self.cookie_domain {
            cookie = cookie.domain(domain.clone());
        }

        cookie.build()
    }

    /// Create an expired cookie to clear it
    pub fn clear_cookie(&self, name: &'static str) -> Cookie<'static> {
        self.create_cookie(name, String::new(), 0)
    }

    /// Sign a new session into a cookie
    ///
    /// Fails when the signed session would not fit in a single cookie, since
    /// the user agent would silently discard it.
    pub fn session_cookie(&self, session: &Session) -> Result<Cookie<'static>, AuthError> {
        let value = sign(session, &self.signing_secret)
            .map_err(|e| AuthError::Internal(format!("Failed to sign session: {e:?}")))?;
        let size = SESSION_COOKIE.len() + 1 + value.len();
        if size > MAX_COOKIE_BYTES {
            return Err(AuthError::Internal(format!(
                "session of {} claims needs a {size} byte cookie, limit is {MAX_COOKIE_BYTES}",
                session.claims.len()
            )));
        }
        Ok(self.create_cookie(SESSION_COOKIE, value, self.lifetime.num_seconds()))
    }

    /// Decode and check a session cookie value at the given time
    pub fn open_session(&self, value: &str, now: DateTime<Utc>) -> Result<Session, AuthError> {
        let session: Session = verify(value, &self.signing_secret)
            .map_err(|e| AuthError::TokenInvalid(format!("session cookie rejected: {e}")))?;
        if !session.is_valid_at(now) {
            return Err(AuthError::SessionExpired);
        }
        Ok(session)
    }
}

/// Authentication from the session cookie, challenged by a redirect to login
pub struct CookieScheme {
    settings: SessionSettings,
}

impl CookieScheme {
    pub fn new(settings: SessionSettings) -> Self {
        Self { settings }
    }

    fn return_url(parts: &Parts) -> String {
        let url = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        if validate_return_url(url) {
            url.to_string()
        } else {
            "/".to_string()
        }
    }

    fn authenticate_at(
        &self,
        parts: &Parts,
        now: DateTime<Utc>,
    ) -> Result<Option<Principal>, AuthError> {
        let jar = CookieJar::from_headers(&parts.headers);
        let Some(cookie) = jar.get(SESSION_COOKIE) else {
            return Ok(None);
        };
        let session = self.settings.open_session(cookie.value(), now)?;
        Ok(Some(Principal::new(COOKIE_SCHEME, session.claims)))
    }
}

#[async_trait::async_trait]
impl AuthScheme for CookieScheme {
    fn name(&self) -> &str {
        COOKIE_SCHEME
    }

    async fn authenticate(&self, parts: &Parts) -> Result<Option<Principal>, AuthError> {
        self.authenticate_at(parts, Utc::now())
    }

    fn challenge(&self, parts: &Parts, failure: Option<&AuthError>) -> Response {
        let location = login_redirect(LOGIN_PATH, &Self::return_url(parts));
        if failure.is_some() {
            let jar = CookieJar::new().add(self.settings.clear_cookie(SESSION_COOKIE));
            (jar, Redirect::temporary(&location)).into_response()
        } else {
            Redirect::temporary(&location).into_response()
        }
    }
}
