//! Identity provider configuration loaded from the environment
//!
//! Required variables: `KEYCLOAK_SERVER_URL`, `KEYCLOAK_REALM`, `CLIENT_ID`,
//! `CLIENT_SECRET`. Missing or malformed values are reported as
//! [`ConfigError`] and are expected to abort startup.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Name of the identity provider in callback paths (`/callback/login/{provider}`)
pub const PROVIDER_NAME: &str = "keycloak";

const DEFAULT_PUBLIC_URL: &str = "http://localhost:3000";
const DEFAULT_SESSION_LIFETIME_MINUTES: i64 = 50;
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SCOPES: &str = "openid profile email";
const MIN_SESSION_SECRET_LEN: usize = 32;
const SIGNING_KEY_LABEL: &[u8] = b"keygate-session-signing";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Keycloak realm and client settings
#[derive(Clone)]
pub struct KeycloakConfig {
    /// Keycloak base URL (e.g. `https://sso.example.com`)
    pub server_url: Url,
    pub realm: String,
    pub client_id: String,
    pub client_secret: String,
    /// Externally visible base URL of this service, used to build redirect URIs
    pub public_url: Url,
    /// Issuers accepted for introspected bearer tokens
    pub valid_issuers: Vec<String>,
    /// Fixed lifetime of a session cookie, never extended
    pub session_lifetime: chrono::Duration,
    /// Timeout applied to every call made to the identity provider
    pub provider_timeout: Duration,
    /// HMAC key for session cookies and OAuth state
    pub signing_secret: Vec<u8>,
    pub secure_cookies: bool,
    /// `Domain` attribute of the cookies, host-only when absent
    pub cookie_domain: Option<String>,
    pub scopes: Vec<String>,
}

impl std::fmt::Debug for KeycloakConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeycloakConfig")
            .field("server_url", &self.server_url.as_str())
            .field("realm", &self.realm)
            .field("client_id", &self.client_id)
            .field("client_secret", &"(not printed)")
            .field("public_url", &self.public_url.as_str())
            .field("valid_issuers", &self.valid_issuers)
            .field("session_lifetime", &self.session_lifetime)
            .field("provider_timeout", &self.provider_timeout)
            .field("signing_secret", &"(not printed)")
            .field("secure_cookies", &self.secure_cookies)
            .field("cookie_domain", &self.cookie_domain)
            .field("scopes", &self.scopes)
            .finish()
    }
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<String, ConfigError> {
    match lookup(var) {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ConfigError::Missing(var)),
    }
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, var: &str) -> Option<String> {
    lookup(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_http_url(var: &'static str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::Invalid {
        var,
        reason: format!("not a valid URL: {e}"),
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Invalid {
            var,
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    if url.host_str().is_none() {
        return Err(ConfigError::Invalid {
            var,
            reason: "missing host".to_string(),
        });
    }
    Ok(url)
}

fn parse_positive<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match value.parse::<T>() {
        Ok(n) if n > T::default() => Ok(n),
        _ => Err(ConfigError::Invalid {
            var,
            reason: format!("expected a positive integer, got '{value}'"),
        }),
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            reason: format!("expected true or false, got '{value}'"),
        }),
    }
}

/// Derive the signing key from the client secret when no `SESSION_SECRET` is given
fn derive_signing_secret(client_secret: &str) -> Vec<u8> {
    // HMAC accepts keys of any length
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(client_secret.as_bytes())
        .expect("HMAC can take a key of any size");
    mac.update(SIGNING_KEY_LABEL);
    mac.finalize().into_bytes().to_vec()
}

impl KeycloakConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let server_url = parse_http_url(
            "KEYCLOAK_SERVER_URL",
            &required(&lookup, "KEYCLOAK_SERVER_URL")?,
        )?;
        let realm = required(&lookup, "KEYCLOAK_REALM")?;
        if realm.contains('/') {
            return Err(ConfigError::Invalid {
                var: "KEYCLOAK_REALM",
                reason: "must not contain '/'".to_string(),
            });
        }
        let client_id = required(&lookup, "CLIENT_ID")?;
        let client_secret = required(&lookup, "CLIENT_SECRET")?;

        let public_url = parse_http_url(
            "PUBLIC_URL",
            &optional(&lookup, "PUBLIC_URL").unwrap_or_else(|| DEFAULT_PUBLIC_URL.to_string()),
        )?;

        let session_lifetime_minutes = match optional(&lookup, "SESSION_LIFETIME_MINUTES") {
            Some(v) => parse_positive::<i64>("SESSION_LIFETIME_MINUTES", &v)?,
            None => DEFAULT_SESSION_LIFETIME_MINUTES,
        };
        let provider_timeout_secs = match optional(&lookup, "PROVIDER_TIMEOUT_SECS") {
            Some(v) => parse_positive::<u64>("PROVIDER_TIMEOUT_SECS", &v)?,
            None => DEFAULT_PROVIDER_TIMEOUT_SECS,
        };

        let signing_secret = match optional(&lookup, "SESSION_SECRET") {
            Some(secret) if secret.len() < MIN_SESSION_SECRET_LEN => {
                return Err(ConfigError::Invalid {
                    var: "SESSION_SECRET",
                    reason: format!("must be at least {MIN_SESSION_SECRET_LEN} bytes"),
                });
            }
            Some(secret) => secret.into_bytes(),
            None => derive_signing_secret(&client_secret),
        };

        let secure_cookies = match optional(&lookup, "SECURE_COOKIES") {
            Some(v) => parse_bool("SECURE_COOKIES", &v)?,
            None => false,
        };

        let cookie_domain = optional(&lookup, "COOKIE_DOMAIN");
        if let Some(domain) = cookie_domain.as_deref().filter(|d| {
            d.chars()
                .any(|c| c.is_whitespace() || matches!(c, ';' | ',' | '/' | ':'))
        }) {
            return Err(ConfigError::Invalid {
                var: "COOKIE_DOMAIN",
                reason: format!("'{domain}' is not a domain name"),
            });
        }

        let scopes: Vec<String> = optional(&lookup, "OIDC_SCOPES")
            .unwrap_or_else(|| DEFAULT_SCOPES.to_string())
            .split_whitespace()
            .map(String::from)
            .collect();

        let mut config = Self {
            server_url,
            realm,
            client_id,
            client_secret,
            public_url,
            valid_issuers: Vec::new(),
            session_lifetime: chrono::Duration::minutes(session_lifetime_minutes),
            provider_timeout: Duration::from_secs(provider_timeout_secs),
            signing_secret,
            secure_cookies,
            cookie_domain,
            scopes,
        };

        config.valid_issuers = match optional(&lookup, "VALID_ISSUERS") {
            Some(list) => list
                .split(',')
                .map(|s| s.trim().trim_end_matches('/').to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => vec![config.issuer()],
        };
        if config.valid_issuers.is_empty() {
            return Err(ConfigError::Invalid {
                var: "VALID_ISSUERS",
                reason: "no issuer listed".to_string(),
            });
        }

        Ok(config)
    }

    /// Issuer of the realm: `{server}/realms/{realm}`
    pub fn issuer(&self) -> String {
        format!(
            "{}/realms/{}",
            self.server_url.as_str().trim_end_matches('/'),
            self.realm
        )
    }

    /// Keycloak authorization endpoint, by convention of the realm layout
    pub fn authorization_endpoint(&self) -> String {
        format!("{}/protocol/openid-connect/auth", self.issuer())
    }

    /// Keycloak token endpoint, by convention of the realm layout
    pub fn token_endpoint(&self) -> String {
        format!("{}/protocol/openid-connect/token", self.issuer())
    }

    fn public_path(&self, path: &str) -> String {
        format!("{}{path}", self.public_url.as_str().trim_end_matches('/'))
    }

    /// Static description of how this service identifies itself to the provider
    pub fn client_registration(&self) -> ClientRegistration {
        ClientRegistration {
            issuer: self.issuer(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            login_redirect_uri: self.public_path(&format!("/callback/login/{PROVIDER_NAME}")),
            logout_redirect_uri: self.public_path(&format!("/callback/logout/{PROVIDER_NAME}")),
            scopes: self.scopes.clone(),
        }
    }
}

/// Client registration at the identity provider, immutable for the process lifetime
#[derive(Clone)]
pub struct ClientRegistration {
    pub issuer: String,
    pub client_id: String,
    pub client_secret: String,
    pub login_redirect_uri: String,
    pub logout_redirect_uri: String,
    pub scopes: Vec<String>,
}

impl std::fmt::Debug for ClientRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistration")
            .field("issuer", &self.issuer)
            .field("client_id", &self.client_id)
            .field("client_secret", &"(not printed)")
            .field("login_redirect_uri", &self.login_redirect_uri)
            .field("logout_redirect_uri", &self.logout_redirect_uri)
            .field("scopes", &self.scopes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_signing_secret_is_stable() {
        let a = derive_signing_secret("secret");
        let b = derive_signing_secret("secret");
        let c = derive_signing_secret("other");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("X", "TRUE"), Ok(true));
        assert_eq!(parse_bool("X", "0"), Ok(false));
        assert!(parse_bool("X", "yes").is_err());
    }
}
