//! Conversion of token payloads into claim lists

use crate::error::AuthError;
use crate::types::Claim;
use base64::Engine;
use serde_json::{Map, Value};

/// Decode the payload of a JWT without verifying it
///
/// Only used on tokens the identity provider already vouched for, either by
/// the ID token verifier or by introspection.
pub fn decode_payload_unverified(token: &str) -> Result<Map<String, Value>, AuthError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(AuthError::TokenInvalid("invalid JWT format".to_string()));
    }

    let payload_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('=').as_bytes())
        .map_err(|e| AuthError::TokenInvalid(format!("failed to decode JWT payload: {e:?}")))?;

    serde_json::from_slice(&payload_bytes)
        .map_err(|e| AuthError::TokenInvalid(format!("failed to parse JWT claims: {e:?}")))
}

/// True if the token has the three dot-separated segments of a compact JWT
pub fn looks_like_jwt(token: &str) -> bool {
    token.split('.').count() == 3
}

fn push_value(claims: &mut Vec<Claim>, claim_type: &str, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) => claims.push(Claim::new(claim_type, s.clone())),
        Value::Bool(_) | Value::Number(_) | Value::Object(_) => {
            claims.push(Claim::new(claim_type, value.to_string()))
        }
        Value::Array(items) => {
            for item in items {
                match item {
                    // nested arrays are kept as JSON text
                    Value::Array(_) => claims.push(Claim::new(claim_type, item.to_string())),
                    _ => push_value(claims, claim_type, item),
                }
            }
        }
    }
}

/// Flatten a JSON claim set into typed claims
///
/// Arrays produce one claim per element, objects are kept as compact JSON
/// text and nulls are dropped.
pub fn claims_from_json(payload: &Map<String, Value>) -> Vec<Claim> {
    let mut claims = Vec::with_capacity(payload.len());
    for (claim_type, value) in payload {
        push_value(&mut claims, claim_type, value);
    }
    claims
}

/// Decode a JWT payload and flatten it into claims
pub fn claims_from_jwt(token: &str) -> Result<Vec<Claim>, AuthError> {
    Ok(claims_from_json(&decode_payload_unverified(token)?))
}
