//! Interactive login and logout with the identity provider
//!
//! - `GET /login` sends the user agent to the provider's authorization endpoint
//! - `GET /callback/login/{provider}` exchanges the code and opens a session
//! - `GET /logout` closes the session and signs out at the provider
//! - `GET /callback/logout/{provider}` lands back on the requested page

use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use keygate_auth::config::PROVIDER_NAME;
use keygate_auth::error::AuthError;
use keygate_auth::oauth_state::{
    LogoutState, OAuthState, generate_nonce, sign, sign_state, verify, verify_state,
};
use keygate_auth::session::{
    OAUTH_STATE_COOKIE, OAUTH_STATE_MAX_AGE_SECS, SESSION_COOKIE, Session,
};
use keygate_auth::url_validation::validate_return_url;
use openidconnect::PkceCodeChallenge;
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct ReturnUrlQuery {
    return_url: Option<String>,
}

/// Query of the login callback, either a code and state or an error
#[derive(Debug, Deserialize)]
pub struct LoginCallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogoutCallbackQuery {
    state: Option<String>,
}

fn return_url_or_root(return_url: Option<String>) -> Result<String, AuthError> {
    let return_url = return_url.unwrap_or_else(|| "/".to_string());
    if !validate_return_url(&return_url) {
        return Err(AuthError::InvalidReturnUrl);
    }
    Ok(return_url)
}

fn check_provider(provider: &str) -> Result<(), AuthError> {
    if provider != PROVIDER_NAME {
        return Err(AuthError::UnknownProvider(provider.to_string()));
    }
    Ok(())
}

/// GET /login - start the authorization code flow
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    Query(query): Query<ReturnUrlQuery>,
) -> Result<impl IntoResponse, AuthError> {
    let return_url = return_url_or_root(query.return_url)?;

    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
    let nonce = generate_nonce();
    let oauth_state = OAuthState {
        nonce: nonce.clone(),
        return_url,
        pkce_verifier: pkce_verifier.secret().to_string(),
    };
    let signed_state = sign_state(&oauth_state, &state.session.signing_secret)
        .map_err(|e| AuthError::Internal(format!("Failed to sign OAuth state: {e:?}")))?;

    let auth_url = state
        .provider
        .authorization_url(signed_state, nonce.clone(), pkce_challenge)
        .await?;

    let cookie = state
        .session
        .create_cookie(OAUTH_STATE_COOKIE, nonce, OAUTH_STATE_MAX_AGE_SECS);
    Ok((
        CookieJar::new().add(cookie),
        Redirect::temporary(auth_url.as_str()),
    ))
}

/// GET /callback/login/{provider} - finish the authorization code flow
#[tracing::instrument(skip_all)]
pub async fn login_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    jar: CookieJar,
    Query(query): Query<LoginCallbackQuery>,
) -> Result<impl IntoResponse, AuthError> {
    check_provider(&provider)?;

    if let Some(error) = query.error {
        let description = query.error_description.unwrap_or_default();
        warn!("provider rejected the login: error={error} description={description}");
        return Err(AuthError::TokenExchangeFailed(format!(
            "provider returned {error}"
        )));
    }
    let (Some(code), Some(signed_state)) = (query.code, query.state) else {
        return Err(AuthError::InvalidState);
    };

    let oauth_state = verify_state(&signed_state, &state.session.signing_secret).map_err(|e| {
        warn!("OAuth state rejected: {e}");
        AuthError::InvalidState
    })?;
    let cookie_nonce = jar
        .get(OAUTH_STATE_COOKIE)
        .ok_or(AuthError::InvalidState)?
        .value();
    if !bool::from(cookie_nonce.as_bytes().ct_eq(oauth_state.nonce.as_bytes())) {
        warn!("OAuth state nonce does not match the state cookie");
        return Err(AuthError::InvalidState);
    }
    if !validate_return_url(&oauth_state.return_url) {
        return Err(AuthError::InvalidReturnUrl);
    }

    let claims = state
        .provider
        .exchange_code(code, oauth_state.pkce_verifier, &oauth_state.nonce)
        .await?;
    let session = Session::issue(claims, Utc::now(), state.session.lifetime);
    let subject = session
        .claims
        .iter()
        .find(|c| c.claim_type == "sub")
        .map(|c| c.value.as_str());
    info!(
        "session established: subject={subject:?} expires_at={}",
        session.expires_at
    );

    let jar = jar
        .add(state.session.session_cookie(&session)?)
        .add(state.session.clear_cookie(OAUTH_STATE_COOKIE));
    Ok((jar, Redirect::temporary(&oauth_state.return_url)))
}

/// GET /logout - close the session and sign out at the provider
#[tracing::instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<ReturnUrlQuery>,
) -> Result<impl IntoResponse, AuthError> {
    let return_url = return_url_or_root(query.return_url)?;
    let jar = jar.add(state.session.clear_cookie(SESSION_COOKIE));

    let logout_state = LogoutState {
        return_url: return_url.clone(),
    };
    let signed_state = sign(&logout_state, &state.session.signing_secret)
        .map_err(|e| AuthError::Internal(format!("Failed to sign logout state: {e:?}")))?;

    let location = match state.provider.end_session_url(&signed_state).await {
        Ok(Some(url)) => url.to_string(),
        Ok(None) => {
            info!("provider has no end session endpoint, local logout only");
            return_url
        }
        Err(e) => {
            warn!("provider logout skipped: {e}");
            return_url
        }
    };
    Ok((jar, Redirect::temporary(&location)))
}

/// GET /callback/logout/{provider} - return to the page that asked for logout
#[tracing::instrument(skip_all)]
pub async fn logout_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<LogoutCallbackQuery>,
) -> Result<Redirect, AuthError> {
    check_provider(&provider)?;

    let return_url = match query.state {
        Some(signed_state) => {
            let logout_state: LogoutState = verify(&signed_state, &state.session.signing_secret)
                .map_err(|e| {
                    warn!("logout state rejected: {e}");
                    AuthError::InvalidState
                })?;
            logout_state.return_url
        }
        None => "/".to_string(),
    };
    if !validate_return_url(&return_url) {
        return Err(AuthError::InvalidReturnUrl);
    }
    Ok(Redirect::temporary(&return_url))
}
