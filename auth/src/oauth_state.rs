//! HMAC-SHA256 signing of values carried by the user agent
//!
//! Used for the OAuth `state` parameter of the login and logout redirects and
//! for the session cookie. A signed value cannot be modified without the
//! server secret, which prevents:
//! - redirecting users to a tampered `return_url`
//! - substituting the PKCE verifier or the nonce
//! - forging or extending a session
//!
//! # Format
//!
//! Signed value: `base64url(json).base64url(hmac_signature)`
//!
//! # Example
//!
//! ```rust
//! use keygate_auth::oauth_state::{OAuthState, sign_state, verify_state};
//!
//! let state = OAuthState {
//!     nonce: "random-nonce".to_string(),
//!     return_url: "/api/test".to_string(),
//!     pkce_verifier: "pkce-verifier".to_string(),
//! };
//!
//! let secret = b"your-32-byte-secret-key-here!!!";
//! let signed = sign_state(&state, secret).expect("signing failed");
//!
//! let verified = verify_state(&signed, secret).expect("verification failed");
//! assert_eq!(verified.return_url, "/api/test");
//! ```

use anyhow::{Result, anyhow};
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// State carried through the provider during interactive login
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OAuthState {
    /// CSRF nonce, also sent as the OIDC nonce
    pub nonce: String,
    /// URL to redirect to after successful authentication
    pub return_url: String,
    /// PKCE code verifier
    pub pkce_verifier: String,
}

/// State carried through the provider during logout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogoutState {
    pub return_url: String,
}

/// Generate a random URL-safe nonce (32 bytes of entropy)
pub fn generate_nonce() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.r#gen();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Serialize and sign a value
///
/// Returns: base64url(json).base64url(hmac_signature)
pub fn sign<T: Serialize>(value: &T, secret: &[u8]) -> Result<String> {
    let json = serde_json::to_string(value)?;

    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|e| anyhow!("Failed to create HMAC: {e}"))?;
    mac.update(json.as_bytes());
    let signature = mac.finalize().into_bytes();

    Ok(format!(
        "{}.{}",
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&json),
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(signature)
    ))
}

/// Verify the signature of a signed value and decode it
pub fn verify<T: DeserializeOwned>(signed: &str, secret: &[u8]) -> Result<T> {
    let parts: Vec<&str> = signed.split('.').collect();
    if parts.len() != 2 {
        return Err(anyhow!(
            "Invalid signed value format: expected 2 parts, got {}",
            parts.len()
        ));
    }

    let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(parts[0])?;
    let signature = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(parts[1])?;

    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|e| anyhow!("Failed to create HMAC: {e}"))?;
    mac.update(&payload);
    mac.verify_slice(&signature)
        .map_err(|_| anyhow!("HMAC signature verification failed"))?;

    Ok(serde_json::from_slice(&payload)?)
}

/// Sign the OAuth state parameter
pub fn sign_state(state: &OAuthState, secret: &[u8]) -> Result<String> {
    sign(state, secret)
}

/// Verify and decode a signed OAuth state parameter
pub fn verify_state(signed_state: &str, secret: &[u8]) -> Result<OAuthState> {
    verify(signed_state, secret)
}
