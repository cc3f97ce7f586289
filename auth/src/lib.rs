//! Keycloak authentication for keygate
//!
//! Authentication is delegated to a Keycloak realm through OpenID Connect.
//! Two schemes establish the identity of a request:
//!
//! - **Cookies**: session cookie issued after an interactive authorization
//!   code login, with a fixed lifetime and no renewal
//! - **Bearer**: access token validated by the realm's introspection endpoint,
//!   restricted to an allow-list of issuers
//!
//! Routes are guarded by the [`axum::require_authenticated`] middleware, which
//! accepts a request authenticated under any of the schemes named by the
//! route's [`axum::RequireAuthenticated`] policy.
//!
//! # Example
//!
//! ```rust,no_run
//! use keygate_auth::config::KeycloakConfig;
//! use keygate_auth::provider::KeycloakProvider;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = KeycloakConfig::from_env()?;
//! let provider = KeycloakProvider::new(config.client_registration(), config.provider_timeout)?;
//! let metadata = provider.metadata().await?;
//! println!("authorization endpoint: {}", metadata.authorization_endpoint().as_str());
//! # Ok(())
//! # }
//! ```

/// Principal, claims and the authentication scheme trait
pub mod types;

/// Authentication errors
pub mod error;

/// Configuration loaded from the environment
pub mod config;

/// Token payloads to claims
pub mod claims;

/// Signed values carried by the user agent
pub mod oauth_state;

/// Cookie session scheme
pub mod session;

/// Bearer token introspection scheme
pub mod introspection;

/// Keycloak binding over openidconnect
pub mod provider;

/// Named scheme registry
pub mod schemes;

/// Axum authorization gate
pub mod axum;

/// Return URL validation for login redirects
pub mod url_validation;
