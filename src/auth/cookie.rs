//! Signed session cookie.
//!
//! The cookie value is `{token}.{signature}` where the signature is the hex
//! HMAC-SHA256 of the token under the cookie secret. A cookie whose signature
//! does not match is treated as absent.

use anyhow::{anyhow, Result};
use axum::http::{header, HeaderMap};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn keyed_mac(secret: &str, token: &str) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow!("Invalid cookie signing key: {e}"))?;
    mac.update(token.as_bytes());
    Ok(mac)
}

/// Sign a session token for use as a cookie value.
///
/// # Errors
///
/// Returns an error if the secret cannot be used as an HMAC key.
pub fn sign(token: &str, secret: &str) -> Result<String> {
    let tag = keyed_mac(secret, token)?.finalize().into_bytes();
    Ok(format!("{token}.{}", hex::encode(tag)))
}

/// Check a signed cookie value and return the token it carries.
#[must_use]
pub fn verify<'a>(value: &'a str, secret: &str) -> Option<&'a str> {
    let (token, sig) = value.rsplit_once('.')?;
    if token.is_empty() {
        return None;
    }
    let sig = hex::decode(sig).ok()?;
    keyed_mac(secret, token).ok()?.verify_slice(&sig).ok()?;
    Some(token)
}

/// Find a cookie value by name in the request headers.
#[must_use]
pub fn find_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|cookie| {
            let (key, value) = cookie.trim().split_once('=')?;
            (key == name).then_some(value)
        })
}

/// Read and verify the session token from the request cookies.
#[must_use]
pub fn session_token<'a>(headers: &'a HeaderMap, name: &str, secret: &str) -> Option<&'a str> {
    find_cookie(headers, name).and_then(|value| verify(value, secret))
}

/// `Set-Cookie` value that stores a signed session token.
///
/// # Errors
///
/// Returns an error if the token cannot be signed.
pub fn session_cookie(name: &str, token: &str, secret: &str, max_age_secs: u64) -> Result<String> {
    Ok(format!(
        "{name}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}",
        sign(token, secret)?
    ))
}

/// `Set-Cookie` value that removes the session cookie.
#[must_use]
pub fn clear_session_cookie(name: &str) -> String {
    format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}
