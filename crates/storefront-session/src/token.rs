//! Local JWT inspection.
//!
//! Only the `exp` claim is read. Signatures are not verified; the backend
//! does that on every call. Reading the expiry locally lets most calls skip a
//! refresh round trip.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

#[derive(Deserialize)]
struct Claims {
    exp: i64,
}

/// Expiry state of a token at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenStatus {
    /// When the token expires.
    pub expires_at: DateTime<Utc>,
    /// The token has already expired.
    pub expired: bool,
    /// The token expires within the refresh threshold.
    pub expires_soon: bool,
}

impl TokenStatus {
    /// Returns `true` if the token should be refreshed before use.
    #[must_use]
    pub const fn needs_refresh(&self) -> bool {
        self.expired || self.expires_soon
    }
}

/// Reads the `exp` claim of a JWT.
///
/// Returns `None` for anything that is not a three-part token with a
/// base64url JSON payload carrying a numeric `exp`.
///
/// # Example
///
/// ```
/// use storefront_session::token::decode_expiry;
///
/// assert!(decode_expiry("not-a-jwt").is_none());
/// ```
#[must_use]
pub fn decode_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut parts = token.split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.exp, 0)
}

/// Checks a token's expiry at `now`.
#[must_use]
pub fn status_at(token: &str, threshold: Duration, now: DateTime<Utc>) -> Option<TokenStatus> {
    let expires_at = decode_expiry(token)?;
    let threshold = chrono::Duration::from_std(threshold).unwrap_or_else(|_| chrono::Duration::days(36_500));
    Some(TokenStatus {
        expires_at,
        expired: expires_at <= now,
        expires_soon: now.checked_add_signed(threshold).map_or(true, |t| expires_at <= t),
    })
}

/// Returns `true` if `token` must be refreshed before use.
///
/// A token that cannot be decoded needs a refresh.
#[must_use]
pub fn needs_refresh(token: &str, threshold: Duration) -> bool {
    status_at(token, threshold, Utc::now()).map_or(true, |status| status.needs_refresh())
}

/// Time left before `token` expires, or `None` if it is expired or malformed.
#[must_use]
pub fn remaining_lifetime(token: &str, now: DateTime<Utc>) -> Option<Duration> {
    let expires_at = decode_expiry(token)?;
    (expires_at - now).to_std().ok().filter(|d| !d.is_zero())
}

/// Builds an unsigned token with the given expiry, for tests and fixtures.
///
/// ```
/// use chrono::{Duration, Utc};
/// use storefront_session::token::{decode_expiry, unsigned_token};
///
/// let exp = Utc::now() + Duration::hours(1);
/// let token = unsigned_token(exp.timestamp());
/// assert_eq!(decode_expiry(&token).unwrap().timestamp(), exp.timestamp());
/// ```
#[must_use]
pub fn unsigned_token(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp}}}"#));
    format!("{header}.{payload}.")
}
