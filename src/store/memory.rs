use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{RefreshTokenRecord, RefreshTokenRepository, RotationOutcome, UserRepository};
use crate::error::DatabaseError;
use crate::principal::{NewPrincipal, Principal};

/// Process-local store. Every operation runs under a single lock, which
/// gives the same atomicity the Postgres store gets from transactions.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    next_user_id: i64,
    next_token_id: i64,
    users: HashMap<i64, Principal>,
    // owner id -> token row
    tokens: HashMap<i64, RefreshTokenRecord>,
    // token hash -> owner id
    token_owners: HashMap<String, i64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl State {
    fn remove_token_of(&mut self, user_id: i64) -> bool {
        match self.tokens.remove(&user_id) {
            Some(record) => {
                self.token_owners.remove(&record.token_hash);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Principal>, DatabaseError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Principal>, DatabaseError> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.username == username).cloned())
    }

    async fn exists_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<bool, DatabaseError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .any(|u| u.username == username || u.email == email))
    }

    async fn insert(&self, principal: NewPrincipal) -> Result<Principal, DatabaseError> {
        let mut state = self.state.lock().await;

        if let Some(existing) = state
            .users
            .values()
            .find(|u| u.username == principal.username || u.email == principal.email)
        {
            let constraint = if existing.username == principal.username {
                "users_username_key"
            } else {
                "users_email_key"
            };
            return Err(DatabaseError::UniqueConstraintViolation(constraint.to_string()));
        }

        state.next_user_id += 1;
        let stored = Principal {
            id: state.next_user_id,
            username: principal.username,
            email: principal.email,
            password_hash: principal.password_hash,
            role: principal.role,
        };
        state.users.insert(stored.id, stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl RefreshTokenRepository for InMemoryStore {
    async fn upsert_for_owner(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord, DatabaseError> {
        let mut state = self.state.lock().await;

        if state.token_owners.contains_key(token_hash) {
            return Err(DatabaseError::UniqueConstraintViolation(
                "refresh_tokens_token_hash_key".to_string(),
            ));
        }

        let id = match state.tokens.get(&user_id) {
            Some(existing) => existing.id,
            None => {
                state.next_token_id += 1;
                state.next_token_id
            }
        };
        state.remove_token_of(user_id);

        let record = RefreshTokenRecord {
            id,
            user_id,
            token_hash: token_hash.to_string(),
            expires_at,
        };
        state.token_owners.insert(record.token_hash.clone(), user_id);
        state.tokens.insert(user_id, record.clone());
        Ok(record)
    }

    async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, DatabaseError> {
        let state = self.state.lock().await;
        Ok(state
            .token_owners
            .get(token_hash)
            .and_then(|owner| state.tokens.get(owner))
            .cloned())
    }

    async fn find_by_owner(&self, user_id: i64) -> Result<Option<RefreshTokenRecord>, DatabaseError> {
        Ok(self.state.lock().await.tokens.get(&user_id).cloned())
    }

    async fn rotate(
        &self,
        old_hash: &str,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<RotationOutcome, DatabaseError> {
        let mut state = self.state.lock().await;

        let owner = match state.token_owners.get(old_hash) {
            Some(owner) => *owner,
            None => return Ok(RotationOutcome::NotFound),
        };
        let current = match state.tokens.get(&owner) {
            Some(record) => record.clone(),
            None => return Ok(RotationOutcome::NotFound),
        };
        if current.expires_at <= now {
            return Ok(RotationOutcome::Expired);
        }
        if state.token_owners.contains_key(new_hash) {
            return Err(DatabaseError::UniqueConstraintViolation(
                "refresh_tokens_token_hash_key".to_string(),
            ));
        }

        state.token_owners.remove(old_hash);
        let rotated = RefreshTokenRecord {
            token_hash: new_hash.to_string(),
            expires_at: new_expires_at,
            ..current
        };
        state.token_owners.insert(rotated.token_hash.clone(), owner);
        state.tokens.insert(owner, rotated.clone());
        Ok(RotationOutcome::Rotated(rotated))
    }

    async fn delete_all(&self) -> Result<u64, DatabaseError> {
        let mut state = self.state.lock().await;
        let removed = state.tokens.len() as u64;
        state.tokens.clear();
        state.token_owners.clear();
        Ok(removed)
    }

    async fn delete_by_owner(&self, user_id: i64) -> Result<u64, DatabaseError> {
        let mut state = self.state.lock().await;
        Ok(state.remove_token_of(user_id) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::Role;
    use chrono::Duration;

    fn new_principal(username: &str, email: &str) -> NewPrincipal {
        NewPrincipal {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role: Role::User,
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_ids_and_finds_user() {
        let store = InMemoryStore::new();
        let alice = store.insert(new_principal("alice", "a@x.com")).await.unwrap();
        let bob = store.insert(new_principal("bob", "b@x.com")).await.unwrap();

        assert_ne!(alice.id, bob.id);
        assert_eq!(store.find_by_username("alice").await.unwrap(), Some(alice.clone()));
        assert_eq!(store.find_by_id(bob.id).await.unwrap(), Some(bob));
        assert_eq!(store.find_by_username("carol").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_username_or_email() {
        let store = InMemoryStore::new();
        store.insert(new_principal("alice", "a@x.com")).await.unwrap();

        assert!(matches!(
            store.insert(new_principal("alice", "other@x.com")).await,
            Err(DatabaseError::UniqueConstraintViolation(_))
        ));
        assert!(matches!(
            store.insert(new_principal("other", "a@x.com")).await,
            Err(DatabaseError::UniqueConstraintViolation(_))
        ));
        assert!(store.exists_by_username_or_email("nobody", "a@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_keeps_one_row_per_owner() {
        let store = InMemoryStore::new();
        let expires = Utc::now() + Duration::hours(1);

        let first = store.upsert_for_owner(1, "h1", expires).await.unwrap();
        let second = store.upsert_for_owner(1, "h2", expires).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.find_by_hash("h1").await.unwrap(), None);
        assert_eq!(store.find_by_owner(1).await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_rotate_outcomes() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store.upsert_for_owner(1, "live", now + Duration::hours(1)).await.unwrap();
        store.upsert_for_owner(2, "stale", now - Duration::seconds(1)).await.unwrap();

        let rotated = store.rotate("live", "next", now + Duration::hours(2), now).await.unwrap();
        assert!(matches!(rotated, RotationOutcome::Rotated(ref r) if r.user_id == 1));
        assert_eq!(
            store.rotate("live", "again", now + Duration::hours(2), now).await.unwrap(),
            RotationOutcome::NotFound
        );
        assert_eq!(
            store.rotate("stale", "fresh", now + Duration::hours(2), now).await.unwrap(),
            RotationOutcome::Expired
        );
    }

    #[tokio::test]
    async fn test_delete_by_owner_and_all() {
        let store = InMemoryStore::new();
        let expires = Utc::now() + Duration::hours(1);
        store.upsert_for_owner(1, "h1", expires).await.unwrap();
        store.upsert_for_owner(2, "h2", expires).await.unwrap();

        assert_eq!(store.delete_by_owner(1).await.unwrap(), 1);
        assert_eq!(store.delete_by_owner(1).await.unwrap(), 0);
        assert_eq!(store.find_by_hash("h1").await.unwrap(), None);

        assert_eq!(store.delete_all().await.unwrap(), 1);
        assert_eq!(store.find_by_owner(2).await.unwrap(), None);
    }
}
