/// JWT Claims structure
///
/// Payload of an access token: the principal's identity plus the standard
/// registered claims (RFC 7519).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::principal::{Principal, Role};

/// JWT Claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (lowercase username)
    pub sub: String,
    /// Principal id
    pub id: i64,
    pub role: Role,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issuer
    pub iss: String,
}

impl Claims {
    /// Create claims for `principal` issued at `now`.
    ///
    /// NumericDate claims carry whole seconds, so `iat` is `now` truncated and
    /// the lifetime counts from the start of the issuing second.
    pub fn new(principal: &Principal, now: DateTime<Utc>, expiry_seconds: i64, issuer: &str) -> Self {
        let iat = now.timestamp();
        Self {
            sub: principal.username.clone(),
            id: principal.id,
            role: principal.role,
            iat,
            exp: iat + expiry_seconds,
            iss: issuer.to_string(),
        }
    }

    /// Expired once `now` reaches `exp`.
    ///
    /// A token issued at a fractional `now` therefore lives up to one second
    /// less than `expiry_seconds` measured from `now` itself, and exactly
    /// `expiry_seconds` measured from `iat`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}
