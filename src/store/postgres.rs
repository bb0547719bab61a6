use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{RefreshTokenRecord, RefreshTokenRepository, RotationOutcome, UserRepository};
use crate::error::DatabaseError;
use crate::principal::{NewPrincipal, Principal, Role};

type UserRow = (i64, String, String, String, String);
type TokenRow = (i64, i64, String, DateTime<Utc>);

/// Postgres-backed store; schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn into_principal(row: UserRow) -> Result<Principal, DatabaseError> {
    let (id, username, email, password_hash, role) = row;
    Ok(Principal {
        id,
        username,
        email,
        password_hash,
        role: role.parse::<Role>()?,
    })
}

fn into_record(row: TokenRow) -> RefreshTokenRecord {
    let (id, user_id, token_hash, expires_at) = row;
    RefreshTokenRecord {
        id,
        user_id,
        token_hash,
        expires_at,
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Principal>, DatabaseError> {
        sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, password_hash, role FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(into_principal)
        .transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Principal>, DatabaseError> {
        sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, password_hash, role FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?
        .map(into_principal)
        .transpose()
    }

    async fn exists_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<bool, DatabaseError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE username = $1 OR email = $2)",
        )
        .bind(username)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn insert(&self, principal: NewPrincipal) -> Result<Principal, DatabaseError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users (username, email, password_hash, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING id
            "#,
        )
        .bind(&principal.username)
        .bind(&principal.email)
        .bind(&principal.password_hash)
        .bind(principal.role.as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(Principal {
            id,
            username: principal.username,
            email: principal.email,
            password_hash: principal.password_hash,
            role: principal.role,
        })
    }
}

#[async_trait]
impl RefreshTokenRepository for PgStore {
    async fn upsert_for_owner(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord, DatabaseError> {
        // The unique index on user_id turns concurrent sign-ins into a single row.
        let row = sqlx::query_as::<_, TokenRow>(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET token_hash = EXCLUDED.token_hash,
                expires_at = EXCLUDED.expires_at,
                created_at = EXCLUDED.created_at
            RETURNING id, user_id, token_hash, expires_at
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(into_record(row))
    }

    async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, DatabaseError> {
        let row = sqlx::query_as::<_, TokenRow>(
            "SELECT id, user_id, token_hash, expires_at FROM refresh_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(into_record))
    }

    async fn find_by_owner(&self, user_id: i64) -> Result<Option<RefreshTokenRecord>, DatabaseError> {
        let row = sqlx::query_as::<_, TokenRow>(
            "SELECT id, user_id, token_hash, expires_at FROM refresh_tokens WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(into_record))
    }

    async fn rotate(
        &self,
        old_hash: &str,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<RotationOutcome, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        // A concurrent rotation of the same row blocks here; once it commits the
        // row no longer matches old_hash and this call sees NotFound.
        let current = sqlx::query_as::<_, TokenRow>(
            r#"
            SELECT id, user_id, token_hash, expires_at
            FROM refresh_tokens
            WHERE token_hash = $1
            FOR UPDATE
            "#,
        )
        .bind(old_hash)
        .fetch_optional(&mut tx)
        .await?;

        let current = match current {
            Some(row) => into_record(row),
            None => {
                tx.rollback().await?;
                return Ok(RotationOutcome::NotFound);
            }
        };

        if current.expires_at <= now {
            tx.rollback().await?;
            return Ok(RotationOutcome::Expired);
        }

        let updated = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET token_hash = $1, expires_at = $2
            WHERE id = $3 AND token_hash = $4
            "#,
        )
        .bind(new_hash)
        .bind(new_expires_at)
        .bind(current.id)
        .bind(old_hash)
        .execute(&mut tx)
        .await?;

        if updated.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(RotationOutcome::NotFound);
        }

        tx.commit().await?;

        Ok(RotationOutcome::Rotated(RefreshTokenRecord {
            token_hash: new_hash.to_string(),
            expires_at: new_expires_at,
            ..current
        }))
    }

    async fn delete_all(&self) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM refresh_tokens")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_by_owner(&self, user_id: i64) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
