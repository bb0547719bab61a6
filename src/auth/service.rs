/// Authentication Orchestrator
///
/// Sign-up, sign-in and refresh flows. Each flow is terminal: it either
/// returns a fresh pair of tokens or a typed error, and leaves no state
/// behind other than the refresh-token row.

use chrono::Utc;
use std::sync::Arc;

use crate::auth::jwt::AccessTokenCodec;
use crate::auth::password::CredentialVerifier;
use crate::auth::refresh_token::{generate_refresh_token, RefreshTokenStore};
use crate::configuration::AuthSettings;
use crate::error::{AppError, AuthError, DatabaseError, ErrorContext};
use crate::principal::{NewPrincipal, Principal, Role};
use crate::store::{RefreshTokenRepository, UserRepository};
use crate::validators::{check_password, parse_email, parse_username};

/// Access and refresh token pair returned by every successful flow
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub principal_id: i64,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    refresh_tokens: RefreshTokenStore,
    codec: Arc<AccessTokenCodec>,
    verifier: CredentialVerifier,
    /// Hash of a random secret at the configured cost. Sign-ins for unknown
    /// or deleted accounts are verified against it.
    decoy_hash: Arc<str>,
}

impl AuthService {
    /// # Errors
    /// Returns a configuration error if the signing settings are unusable
    pub fn new(
        settings: &AuthSettings,
        users: Arc<dyn UserRepository>,
        refresh_tokens: Arc<dyn RefreshTokenRepository>,
    ) -> Result<Self, AppError> {
        let codec = AccessTokenCodec::new(settings)?;
        let verifier = CredentialVerifier::new(settings.password_hash_cost);
        let decoy_hash = verifier.hash(&generate_refresh_token())?;

        Ok(Self {
            users,
            refresh_tokens: RefreshTokenStore::new(refresh_tokens, settings.refresh_token_expiry),
            codec: Arc::new(codec),
            verifier,
            decoy_hash: Arc::from(decoy_hash),
        })
    }

    pub fn codec(&self) -> &AccessTokenCodec {
        &self.codec
    }

    pub fn users(&self) -> &dyn UserRepository {
        self.users.as_ref()
    }

    pub fn refresh_tokens(&self) -> &RefreshTokenStore {
        &self.refresh_tokens
    }

    /// Register a new principal with role USER and log it in.
    ///
    /// # Errors
    /// - `ValidationError` for malformed input
    /// - `AlreadyExists` if the username or email is taken
    pub async fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<IssuedTokens, AppError> {
        let context = ErrorContext::new("sign_up");

        let username = parse_username(username)?;
        let email = parse_email(email)?;
        check_password(password)?;

        if self.users.exists_by_username_or_email(&username, &email).await? {
            let error = AppError::Auth(AuthError::AlreadyExists);
            context.log_error(&error);
            return Err(error);
        }

        let password_hash = self.verifier.hash(password)?;
        let principal = self
            .users
            .insert(NewPrincipal {
                username,
                email,
                password_hash,
                role: Role::User,
            })
            .await
            .map_err(|e| match e {
                // Lost a race against a concurrent sign-up
                DatabaseError::UniqueConstraintViolation(_) => AppError::Auth(AuthError::AlreadyExists),
                other => other.into(),
            })?;

        let tokens = self.issue_tokens(&principal).await?;

        tracing::info!(
            request_id = %context.request_id,
            user_id = principal.id,
            username = %principal.username,
            "User signed up"
        );
        Ok(tokens)
    }

    /// Authenticate with username and password.
    ///
    /// Unknown user, wrong password and deleted account all yield the same
    /// `AuthFailed`.
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<IssuedTokens, AppError> {
        let context = ErrorContext::new("sign_in");
        let username = username.trim().to_lowercase();

        let candidate = self
            .users
            .find_by_username(&username)
            .await?
            .filter(|principal| principal.role.is_active());

        // Exactly one bcrypt verification per attempt, whether or not the account exists.
        let stored_hash = candidate
            .as_ref()
            .map_or(&*self.decoy_hash, |principal| principal.password_hash.as_str());
        let verified = self.verifier.verify(password, stored_hash);

        let principal = match candidate {
            Some(principal) if verified => principal,
            Some(principal) => {
                let error = AppError::Auth(AuthError::AuthFailed);
                context.with_user_id(principal.id).log_error(&error);
                return Err(error);
            }
            None => {
                let error = AppError::Auth(AuthError::AuthFailed);
                context.log_error(&error);
                return Err(error);
            }
        };

        let tokens = self.issue_tokens(&principal).await?;

        tracing::info!(
            request_id = %context.request_id,
            user_id = principal.id,
            "User signed in"
        );
        Ok(tokens)
    }

    /// Exchange a refresh token for a new token pair; the old refresh token dies.
    ///
    /// # Errors
    /// `RefreshTokenInvalid` or `RefreshTokenExpired`; the client must sign in again.
    pub async fn refresh(&self, refresh_token: &str) -> Result<IssuedTokens, AppError> {
        let context = ErrorContext::new("refresh");
        let now = Utc::now();

        let rotated = self.refresh_tokens.rotate(refresh_token, now).await.map_err(|e| {
            context.log_error(&e);
            e
        })?;

        let principal = match self.users.find_by_id(rotated.user_id).await? {
            Some(principal) if principal.role.is_active() => principal,
            _ => {
                self.refresh_tokens.revoke_by_owner(rotated.user_id).await?;
                let error = AppError::Auth(AuthError::RefreshTokenInvalid);
                context.with_user_id(rotated.user_id).log_error(&error);
                return Err(error);
            }
        };

        let access_token = self.codec.issue(&principal, now)?;

        tracing::info!(
            request_id = %context.request_id,
            user_id = principal.id,
            "Token refreshed"
        );
        Ok(IssuedTokens {
            access_token,
            refresh_token: rotated.token,
            expires_in: self.codec.expiry_seconds(),
            principal_id: principal.id,
        })
    }

    /// Revoke the principal's refresh token. Access tokens already issued stay
    /// valid until they expire.
    pub async fn logout(&self, principal_id: i64) -> Result<(), AppError> {
        self.refresh_tokens.revoke_by_owner(principal_id).await?;
        tracing::info!(user_id = principal_id, "User logged out");
        Ok(())
    }

    async fn issue_tokens(&self, principal: &Principal) -> Result<IssuedTokens, AppError> {
        let now = Utc::now();
        let access_token = self.codec.issue(principal, now)?;
        let refresh_token = self.refresh_tokens.create(principal.id, now).await?;

        Ok(IssuedTokens {
            access_token,
            refresh_token: refresh_token.token,
            expires_in: self.codec.expiry_seconds(),
            principal_id: principal.id,
        })
    }
}
