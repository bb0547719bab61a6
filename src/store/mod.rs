/// Persistence contracts
///
/// The core only needs key lookups on users and a handful of atomic
/// operations on refresh tokens. `PgStore` backs production; `InMemoryStore`
/// backs tests and local runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DatabaseError;
use crate::principal::{NewPrincipal, Principal};

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Persisted refresh token row. Only the SHA-256 digest of the token is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub user_id: i64,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationOutcome {
    Rotated(RefreshTokenRecord),
    /// No live row carries the old hash: never issued, already rotated, or revoked
    NotFound,
    Expired,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Principal>, DatabaseError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Principal>, DatabaseError>;

    async fn exists_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<bool, DatabaseError>;

    /// Fails with `UniqueConstraintViolation` if the username or email is taken
    async fn insert(&self, principal: NewPrincipal) -> Result<Principal, DatabaseError>;
}

#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    /// Insert the owner's token or replace the existing one; one row per owner.
    async fn upsert_for_owner(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord, DatabaseError>;

    async fn find_by_hash(&self, token_hash: &str)
        -> Result<Option<RefreshTokenRecord>, DatabaseError>;

    async fn find_by_owner(&self, user_id: i64) -> Result<Option<RefreshTokenRecord>, DatabaseError>;

    /// Atomically swap `old_hash` for `new_hash` if the row exists and
    /// `expires_at > now`. Of two concurrent calls with the same `old_hash`,
    /// at most one sees `Rotated`.
    async fn rotate(
        &self,
        old_hash: &str,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<RotationOutcome, DatabaseError>;

    async fn delete_all(&self) -> Result<u64, DatabaseError>;

    async fn delete_by_owner(&self, user_id: i64) -> Result<u64, DatabaseError>;
}
