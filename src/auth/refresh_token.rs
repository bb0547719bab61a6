/// Refresh Token Management
///
/// Refresh tokens are:
/// - Cryptographically secure random 64-character strings
/// - Hashed with SHA-256 before storage (never store plaintext)
/// - One per principal; issuing a new one replaces the old row
/// - Single-use: rotation atomically replaces the string, the old one is dead

use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::error::{AppError, AuthError};
use crate::store::{RefreshTokenRecord, RefreshTokenRepository, RotationOutcome};

const TOKEN_LENGTH: usize = 64;

/// A refresh token as handed to the client, plaintext included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl RefreshToken {
    fn from_record(record: RefreshTokenRecord, token: String) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            token,
            expires_at: record.expires_at,
        }
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Generate a new opaque refresh token (~380 bits of entropy)
pub fn generate_refresh_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Issues, looks up, rotates and revokes refresh tokens on top of a repository.
#[derive(Clone)]
pub struct RefreshTokenStore {
    repository: Arc<dyn RefreshTokenRepository>,
    expiry: Duration,
}

impl RefreshTokenStore {
    pub fn new(repository: Arc<dyn RefreshTokenRepository>, expiry_seconds: i64) -> Self {
        Self {
            repository,
            expiry: Duration::seconds(expiry_seconds),
        }
    }

    /// Issue a token for `user_id`, replacing any token the owner already has
    pub async fn create(&self, user_id: i64, now: DateTime<Utc>) -> Result<RefreshToken, AppError> {
        let token = generate_refresh_token();
        let record = self
            .repository
            .upsert_for_owner(user_id, &hash_token(&token), now + self.expiry)
            .await?;

        tracing::debug!(user_id = user_id, "Refresh token issued");
        Ok(RefreshToken::from_record(record, token))
    }

    /// # Errors
    /// `RefreshTokenInvalid` if no stored token matches
    pub async fn find_by_token(&self, token: &str) -> Result<RefreshToken, AppError> {
        match self.repository.find_by_hash(&hash_token(token)).await? {
            Some(record) => Ok(RefreshToken::from_record(record, token.to_string())),
            None => {
                tracing::warn!("Refresh token not found");
                Err(AuthError::RefreshTokenInvalid.into())
            }
        }
    }

    /// The owner's stored token; the plaintext is not recoverable from storage.
    pub async fn find_by_owner(&self, user_id: i64) -> Result<RefreshTokenRecord, AppError> {
        self.repository
            .find_by_owner(user_id)
            .await?
            .ok_or_else(|| AuthError::RefreshTokenInvalid.into())
    }

    /// Exchange `old_token` for a fresh token of the same owner.
    ///
    /// # Errors
    /// - `RefreshTokenInvalid` if the token is unknown, already rotated, or revoked
    /// - `RefreshTokenExpired` if the token exists but `expires_at <= now`
    pub async fn rotate(&self, old_token: &str, now: DateTime<Utc>) -> Result<RefreshToken, AppError> {
        let token = generate_refresh_token();
        let outcome = self
            .repository
            .rotate(&hash_token(old_token), &hash_token(&token), now + self.expiry, now)
            .await?;

        match outcome {
            RotationOutcome::Rotated(record) => {
                tracing::debug!(user_id = record.user_id, "Refresh token rotated");
                Ok(RefreshToken::from_record(record, token))
            }
            RotationOutcome::NotFound => {
                tracing::warn!("Attempt to rotate an unknown or already used refresh token");
                Err(AuthError::RefreshTokenInvalid.into())
            }
            RotationOutcome::Expired => {
                tracing::info!("Refresh token expired");
                Err(AuthError::RefreshTokenExpired.into())
            }
        }
    }

    pub async fn revoke_all(&self) -> Result<u64, AppError> {
        let revoked = self.repository.delete_all().await?;
        tracing::info!(revoked = revoked, "All refresh tokens revoked");
        Ok(revoked)
    }

    pub async fn revoke_by_owner(&self, user_id: i64) -> Result<u64, AppError> {
        let revoked = self.repository.delete_by_owner(user_id).await?;
        tracing::info!(user_id = user_id, revoked = revoked, "Refresh tokens revoked for user");
        Ok(revoked)
    }
}
