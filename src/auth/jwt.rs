/// JWT Token Generation and Validation
///
/// HS256-signed access tokens. Keys are derived once from configuration and
/// never change for the life of the process.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::Claims;
use crate::configuration::AuthSettings;
use crate::error::{AppError, AuthError};
use crate::principal::Principal;

pub struct AccessTokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    expiry_seconds: i64,
}

impl AccessTokenCodec {
    /// # Errors
    /// Returns a configuration error if the secret is missing or too short
    pub fn new(settings: &AuthSettings) -> Result<Self, AppError> {
        settings.validate()?;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(settings.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.secret.as_bytes()),
            issuer: settings.issuer.clone(),
            expiry_seconds: settings.access_token_expiry,
        })
    }

    /// Lifetime of issued tokens in seconds
    pub fn expiry_seconds(&self) -> i64 {
        self.expiry_seconds
    }

    /// Sign a new access token for `principal`, valid from `now` for the configured TTL
    pub fn issue(&self, principal: &Principal, now: DateTime<Utc>) -> Result<String, AppError> {
        let claims = Claims::new(principal, now, self.expiry_seconds, &self.issuer);

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Verify signature and issuer, then check `exp > now`
    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iat", "sub", "iss"]);
        // Expiry is checked below against the caller's clock.
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("JWT validation error: {}", e);
                classify(e.kind())
            })?;

        if claims.is_expired_at(now) {
            return Err(AuthError::TokenExpired);
        }

        Ok(claims)
    }

    /// Read the subject without checking signature or expiry.
    ///
    /// The result is untrusted; it only selects which principal to load
    /// before `validate` runs.
    pub fn username(&self, token: &str) -> Result<String, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.set_required_spec_claims::<&str>(&[]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims.sub)
            .map_err(|_| AuthError::TokenMalformed)
    }
}

fn classify(kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => AuthError::BadSignature,
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::TokenMalformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::Role;
    use chrono::Duration;

    fn get_test_config() -> AuthSettings {
        AuthSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            issuer: "test".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604800,
            password_hash_cost: crate::auth::MIN_HASH_COST,
        }
    }

    fn codec() -> AccessTokenCodec {
        AccessTokenCodec::new(&get_test_config()).expect("Failed to build codec")
    }

    fn alice() -> Principal {
        Principal {
            id: 1,
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            password_hash: String::new(),
            role: Role::User,
        }
    }

    #[test]
    fn test_issue_and_validate_token() {
        let codec = codec();
        let now = Utc::now();

        let token = codec.issue(&alice(), now).expect("Failed to issue token");
        let claims = codec.validate(&token, now + Duration::seconds(1)).expect("Failed to validate");

        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.id, 1);
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.iss, "test");
    }

    #[test]
    fn test_token_expires_exactly_at_ttl() {
        let codec = codec();
        let now = Utc::now();
        let token = codec.issue(&alice(), now).unwrap();

        assert!(codec.validate(&token, now + Duration::seconds(899)).is_ok());
        assert_eq!(
            codec.validate(&token, now + Duration::seconds(900)),
            Err(AuthError::TokenExpired)
        );
        assert_eq!(
            codec.validate(&token, now + Duration::hours(2)),
            Err(AuthError::TokenExpired)
        );
    }

    #[test]
    fn test_malformed_token() {
        assert_eq!(
            codec().validate("invalid.token.here", Utc::now()),
            Err(AuthError::TokenMalformed)
        );
        assert_eq!(codec().validate("", Utc::now()), Err(AuthError::TokenMalformed));
    }

    #[test]
    fn test_token_signed_with_other_key() {
        let mut other = get_test_config();
        other.secret = "another-secret-key-at-least-32-characters".to_string();
        let token = AccessTokenCodec::new(&other).unwrap().issue(&alice(), Utc::now()).unwrap();

        assert_eq!(codec().validate(&token, Utc::now()), Err(AuthError::BadSignature));
    }

    #[test]
    fn test_tampered_token() {
        let codec = codec();
        let token = codec.issue(&alice(), Utc::now()).unwrap();

        let tampered = format!("{}X", token);
        assert!(codec.validate(&tampered, Utc::now()).is_err());
    }

    #[test]
    fn test_wrong_issuer() {
        let token = codec().issue(&alice(), Utc::now()).unwrap();

        let mut config = get_test_config();
        config.issuer = "wrong-issuer".to_string();
        let result = AccessTokenCodec::new(&config).unwrap().validate(&token, Utc::now());

        assert!(result.is_err());
    }

    #[test]
    fn test_username_is_read_without_validation() {
        let codec = codec();
        let issued_long_ago = Utc::now() - Duration::days(30);
        let token = codec.issue(&alice(), issued_long_ago).unwrap();

        assert_eq!(codec.username(&token).unwrap(), "alice");
        assert!(codec.validate(&token, Utc::now()).is_err());
    }

    #[test]
    fn test_username_of_garbage() {
        assert_eq!(codec().username("garbage"), Err(AuthError::TokenMalformed));
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut config = get_test_config();
        config.secret = "short".to_string();
        assert!(AccessTokenCodec::new(&config).is_err());
    }
}
