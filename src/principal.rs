/// Principals and roles
///
/// `Principal` is the stored identity; `AuthenticatedPrincipal` is the
/// read-only, request-scoped view produced by the authentication gate and
/// handed to route handlers as an extractor.

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::{ready, Ready};
use std::str::FromStr;

use crate::error::{AppError, AuthError, DatabaseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Moderator,
    User,
    Deleted,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Moderator => "MODERATOR",
            Role::User => "USER",
            Role::Deleted => "DELETED",
        }
    }

    /// Whether a principal holding `self` may access a route requiring `required`.
    pub fn satisfies(self, required: Role) -> bool {
        match (self, required) {
            (Role::Deleted, _) | (_, Role::Deleted) => false,
            (Role::Admin, _) => true,
            (Role::Moderator, Role::Moderator | Role::User) => true,
            (Role::User, Role::User) => true,
            _ => false,
        }
    }

    pub fn is_active(self) -> bool {
        !matches!(self, Role::Deleted)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "MODERATOR" => Ok(Role::Moderator),
            "USER" => Ok(Role::User),
            "DELETED" => Ok(Role::Deleted),
            other => Err(DatabaseError::CorruptedRecord(format!("unknown role {}", other))),
        }
    }
}

/// Stored user identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: i64,
    /// Always lowercase
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// A principal that has not been persisted yet
#[derive(Debug, Clone)]
pub struct NewPrincipal {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Identity of the caller for the current request.
///
/// Only the authentication gate inserts this into request extensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedPrincipal {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

impl AuthenticatedPrincipal {
    pub fn require_role(&self, required: Role) -> Result<(), AppError> {
        if self.role.satisfies(required) {
            Ok(())
        } else {
            tracing::warn!(
                user_id = self.id,
                role = %self.role,
                required = %required,
                "Role check failed"
            );
            Err(AuthError::PermissionDenied.into())
        }
    }
}

impl From<&Principal> for AuthenticatedPrincipal {
    fn from(principal: &Principal) -> Self {
        Self {
            id: principal.id,
            username: principal.username.clone(),
            role: principal.role,
        }
    }
}

/// Why the gate left a request unauthenticated despite a token being present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateRejection(pub AuthError);

impl FromRequest for AuthenticatedPrincipal {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let extensions = req.extensions();
        let result = match extensions.get::<AuthenticatedPrincipal>() {
            Some(principal) => Ok(principal.clone()),
            None => {
                let reason = extensions
                    .get::<GateRejection>()
                    .map(|rejection| rejection.0)
                    .unwrap_or(AuthError::Unauthenticated);
                Err(reason.into())
            }
        };
        ready(result)
    }
}
