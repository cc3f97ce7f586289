//! Keycloak binding over the `openidconnect` client
//!
//! Implements OIDC authorization code flow with PKCE and RFC 7662 token
//! introspection. Provider metadata is discovered from
//! `{issuer}/.well-known/openid-configuration` on first use and kept for the
//! process lifetime.

use crate::claims::{claims_from_jwt, looks_like_jwt};
use crate::config::ClientRegistration;
use crate::error::AuthError;
use crate::introspection::{IntrospectedToken, TokenIntrospector};
use crate::types::Claim;
use openidconnect::core::{
    CoreAuthDisplay, CoreClaimName, CoreClaimType, CoreClient, CoreClientAuthMethod,
    CoreGrantType, CoreJsonWebKey, CoreJweContentEncryptionAlgorithm,
    CoreJweKeyManagementAlgorithm, CoreResponseMode, CoreResponseType,
    CoreSubjectIdentifierType, CoreTokenIntrospectionResponse,
};
use openidconnect::{
    AccessToken, AdditionalProviderMetadata, AuthenticationFlow, AuthorizationCode, ClientId,
    ClientSecret, CsrfToken, IntrospectionUrl, IssuerUrl, Nonce, PkceCodeChallenge,
    PkceCodeVerifier, ProviderMetadata, RedirectUrl, RequestTokenError, Scope,
    TokenIntrospectionResponse, TokenResponse,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

/// Endpoints Keycloak advertises beyond the core discovery fields
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct KeycloakEndpoints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introspection_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,
}

impl AdditionalProviderMetadata for KeycloakEndpoints {}

/// Discovery document of a Keycloak realm
pub type KeycloakProviderMetadata = ProviderMetadata<
    KeycloakEndpoints,
    CoreAuthDisplay,
    CoreClientAuthMethod,
    CoreClaimName,
    CoreClaimType,
    CoreGrantType,
    CoreJweContentEncryptionAlgorithm,
    CoreJweKeyManagementAlgorithm,
    CoreJsonWebKey,
    CoreResponseMode,
    CoreResponseType,
    CoreSubjectIdentifierType,
>;

/// OIDC client with endpoints set from provider metadata
type ConfiguredCoreClient = openidconnect::Client<
    openidconnect::EmptyAdditionalClaims,
    openidconnect::core::CoreAuthDisplay,
    openidconnect::core::CoreGenderClaim,
    openidconnect::core::CoreJweContentEncryptionAlgorithm,
    openidconnect::core::CoreJsonWebKey,
    openidconnect::core::CoreAuthPrompt,
    openidconnect::StandardErrorResponse<openidconnect::core::CoreErrorResponseType>,
    openidconnect::core::CoreTokenResponse,
    openidconnect::core::CoreTokenIntrospectionResponse,
    openidconnect::core::CoreRevocableToken,
    openidconnect::core::CoreRevocationErrorResponse,
    openidconnect::EndpointSet,
    openidconnect::EndpointNotSet,
    openidconnect::EndpointNotSet,
    openidconnect::EndpointNotSet,
    openidconnect::EndpointMaybeSet,
    openidconnect::EndpointMaybeSet,
>;

/// Create the HTTP client used for every call to the identity provider
///
/// Redirects are not followed and every request is bounded by `timeout`.
fn create_http_client(timeout: Duration) -> Result<reqwest::Client, AuthError> {
    reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout)
        .build()
        .map_err(|e| AuthError::Internal(format!("Failed to create HTTP client: {e:?}")))
}

fn request_error<RE, TE>(what: &str, e: RequestTokenError<RE, TE>) -> AuthError
where
    RE: std::error::Error + 'static,
    TE: openidconnect::ErrorResponse + 'static,
{
    match e {
        RequestTokenError::Request(inner) => {
            AuthError::ProviderUnreachable(format!("{what}: {inner}"))
        }
        other => AuthError::TokenExchangeFailed(format!("{what}: {other:?}")),
    }
}

/// Claims of an opaque token, taken from the introspection response
fn claims_from_introspection(response: &CoreTokenIntrospectionResponse) -> Vec<Claim> {
    let mut claims = Vec::new();
    if let Some(iss) = response.iss() {
        claims.push(Claim::new("iss", iss));
    }
    if let Some(sub) = response.sub() {
        claims.push(Claim::new("sub", sub));
    }
    if let Some(username) = response.username() {
        claims.push(Claim::new("preferred_username", username));
    }
    if let Some(client_id) = response.client_id() {
        claims.push(Claim::new("client_id", client_id.as_str()));
    }
    if let Some(scopes) = response.scopes() {
        let scope = scopes
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        claims.push(Claim::new("scope", scope));
    }
    if let Some(exp) = response.exp() {
        claims.push(Claim::new("exp", exp.timestamp().to_string()));
    }
    claims
}

/// Identity provider for interactive login and token introspection
pub struct KeycloakProvider {
    registration: ClientRegistration,
    http_client: reqwest::Client,
    metadata: tokio::sync::OnceCell<KeycloakProviderMetadata>,
}

impl std::fmt::Debug for KeycloakProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeycloakProvider")
            .field("registration", &self.registration)
            .field("discovered", &self.metadata.initialized())
            .finish()
    }
}

impl KeycloakProvider {
    pub fn new(registration: ClientRegistration, timeout: Duration) -> Result<Self, AuthError> {
        Ok(Self {
            registration,
            http_client: create_http_client(timeout)?,
            metadata: tokio::sync::OnceCell::new(),
        })
    }

    pub fn registration(&self) -> &ClientRegistration {
        &self.registration
    }

    /// Provider metadata, discovered on first use
    ///
    /// A failed discovery is not kept: the next call tries again.
    pub async fn metadata(&self) -> Result<&KeycloakProviderMetadata, AuthError> {
        let issuer = self.registration.issuer.clone();
        let http_client = self.http_client.clone();
        self.metadata
            .get_or_try_init(|| async move {
                info!("discovering OIDC provider metadata for {issuer}");
                let issuer_url = IssuerUrl::new(issuer)
                    .map_err(|e| AuthError::Internal(format!("Invalid issuer URL: {e:?}")))?;
                KeycloakProviderMetadata::discover_async(issuer_url, &http_client)
                    .await
                    .map_err(|e| {
                        warn!("OIDC discovery failed: {e:?}");
                        AuthError::ProviderUnreachable(format!(
                            "Failed to discover OIDC provider: {e}"
                        ))
                    })
            })
            .await
    }

    fn build_oidc_client(
        &self,
        metadata: &KeycloakProviderMetadata,
    ) -> Result<ConfiguredCoreClient, AuthError> {
        let redirect_uri = RedirectUrl::new(self.registration.login_redirect_uri.clone())
            .map_err(|e| AuthError::Internal(format!("Invalid redirect URI: {e:?}")))?;
        Ok(CoreClient::from_provider_metadata(
            metadata.clone(),
            ClientId::new(self.registration.client_id.clone()),
            Some(ClientSecret::new(self.registration.client_secret.clone())),
        )
        .set_redirect_uri(redirect_uri))
    }

    /// Authorization endpoint URL for response type `code`
    pub async fn authorization_url(
        &self,
        state: String,
        nonce: String,
        pkce_challenge: PkceCodeChallenge,
    ) -> Result<Url, AuthError> {
        let metadata = self.metadata().await?;
        let client = self.build_oidc_client(metadata)?;

        let mut request = client.authorize_url(
            AuthenticationFlow::<CoreResponseType>::AuthorizationCode,
            move || CsrfToken::new(state.clone()),
            move || Nonce::new(nonce.clone()),
        );
        // openid is always requested by the authentication flow
        for scope in self.registration.scopes.iter().filter(|s| *s != "openid") {
            request = request.add_scope(Scope::new(scope.clone()));
        }
        let (auth_url, _csrf_token, _nonce) = request.set_pkce_challenge(pkce_challenge).url();
        Ok(auth_url)
    }

    /// Exchange an authorization code and return the verified ID token claims
    pub async fn exchange_code(
        &self,
        code: String,
        pkce_verifier: String,
        nonce: &str,
    ) -> Result<Vec<Claim>, AuthError> {
        let metadata = self.metadata().await?;
        let client = self.build_oidc_client(metadata)?;

        let token_response = client
            .exchange_code(AuthorizationCode::new(code))
            .map_err(|e| AuthError::Internal(format!("Failed to create code exchange: {e:?}")))?
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
            .request_async(&self.http_client)
            .await
            .map_err(|e| request_error("token exchange failed", e))?;

        let id_token = token_response.id_token().ok_or_else(|| {
            AuthError::TokenExchangeFailed("provider did not return an ID token".to_string())
        })?;

        // signature, issuer, audience, expiry and nonce
        let verifier = client.id_token_verifier();
        id_token
            .claims(&verifier, &Nonce::new(nonce.to_string()))
            .map_err(|e| AuthError::TokenInvalid(format!("ID token verification failed: {e:?}")))?;

        claims_from_jwt(&id_token.to_string())
    }

    /// RP-initiated logout URL, if the provider supports it
    pub async fn end_session_url(&self, state: &str) -> Result<Option<Url>, AuthError> {
        let metadata = self.metadata().await?;
        let Some(endpoint) = metadata.additional_metadata().end_session_endpoint.as_deref()
        else {
            return Ok(None);
        };
        let mut url = Url::parse(endpoint)
            .map_err(|e| AuthError::Internal(format!("Invalid end session endpoint: {e:?}")))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.registration.client_id)
            .append_pair(
                "post_logout_redirect_uri",
                &self.registration.logout_redirect_uri,
            )
            .append_pair("state", state);
        Ok(Some(url))
    }
}

#[async_trait::async_trait]
impl TokenIntrospector for KeycloakProvider {
    async fn introspect(&self, token: &str) -> Result<IntrospectedToken, AuthError> {
        let metadata = self.metadata().await?;
        let endpoint = metadata
            .additional_metadata()
            .introspection_endpoint
            .clone()
            .ok_or_else(|| {
                AuthError::Internal("provider has no introspection endpoint".to_string())
            })?;
        let introspection_url = IntrospectionUrl::new(endpoint)
            .map_err(|e| AuthError::Internal(format!("Invalid introspection URL: {e:?}")))?;
        let client = self
            .build_oidc_client(metadata)?
            .set_introspection_url(introspection_url);

        let access_token = AccessToken::new(token.to_string());
        let response = client
            .introspect(&access_token)
            .request_async(&self.http_client)
            .await
            .map_err(|e| match request_error("introspection failed", e) {
                AuthError::TokenExchangeFailed(msg) => AuthError::IntrospectionRejected(msg),
                other => other,
            })?;

        if !response.active() {
            return Ok(IntrospectedToken {
                active: false,
                issuer: response.iss().map(String::from),
                claims: Vec::new(),
            });
        }

        // the provider vouched for the token, its payload can be read as is
        let claims = if looks_like_jwt(token) {
            claims_from_jwt(token).unwrap_or_else(|e| {
                warn!("introspected token payload unreadable: {e}");
                claims_from_introspection(&response)
            })
        } else {
            claims_from_introspection(&response)
        };
        let issuer = response.iss().map(String::from).or_else(|| {
            claims
                .iter()
                .find(|c| c.claim_type == "iss")
                .map(|c| c.value.clone())
        });

        Ok(IntrospectedToken {
            active: true,
            issuer,
            claims,
        })
    }
}
