/// Authentication Routes (JSON delivery)
///
/// Tokens travel in the response body; the client replays the access token
/// in `Authorization: Bearer <token>` and posts the refresh token back to
/// `/api/auth/refresh`.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthService, IssuedTokens};
use crate::error::{AppError, ValidationError};
use crate::principal::AuthenticatedPrincipal;

#[derive(Deserialize)]
pub struct SignUpRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct SignInRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    #[serde(default)]
    pub refresh_token: String,
}

/// Access and refresh tokens in the response body
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

impl From<IssuedTokens> for AuthResponse {
    fn from(tokens: IssuedTokens) -> Self {
        Self {
            access_token: tokens.access_token,
            token_type: "Bearer".to_string(),
            refresh_token: tokens.refresh_token,
            expires_in: tokens.expires_in,
        }
    }
}

/// POST /api/auth/signup
///
/// # Errors
/// - 400: Validation error or username/email already taken
pub async fn sign_up(
    form: web::Json<SignUpRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let tokens = auth.sign_up(&form.username, &form.email, &form.password).await?;
    Ok(HttpResponse::Created().json(AuthResponse::from(tokens)))
}

/// POST /api/auth/login
///
/// # Errors
/// - 401: Invalid credentials. Same response for unknown user and wrong password.
pub async fn sign_in(
    form: web::Json<SignInRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let tokens = auth.sign_in(&form.username, &form.password).await?;
    Ok(HttpResponse::Ok().json(AuthResponse::from(tokens)))
}

/// POST /api/auth/refresh
///
/// Rotates the refresh token: the posted token is dead after this call.
///
/// # Errors
/// - 400: Empty refresh token
/// - 401: Unknown, already used, revoked or expired refresh token
pub async fn refresh(
    form: web::Json<RefreshTokenRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let refresh_token = form.refresh_token.trim();
    if refresh_token.is_empty() {
        return Err(ValidationError::EmptyField("refreshToken".to_string()).into());
    }

    let tokens = auth.refresh(refresh_token).await?;
    Ok(HttpResponse::Ok().json(AuthResponse::from(tokens)))
}

/// POST /api/auth/logout
///
/// **Requires an authenticated caller.** Revokes the caller's refresh token.
pub async fn logout(
    principal: AuthenticatedPrincipal,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    auth.logout(principal.id).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_response_shape() {
        let response = AuthResponse::from(IssuedTokens {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_in: 900,
            principal_id: 1,
        });
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["accessToken"], "a");
        assert_eq!(json["refreshToken"], "r");
        assert_eq!(json["type"], "Bearer");
        assert_eq!(json["expiresIn"], 900);
    }

    #[test]
    fn test_refresh_request_reads_camel_case() {
        let request: RefreshTokenRequest =
            serde_json::from_str(r#"{"refreshToken":"abc"}"#).unwrap();
        assert_eq!(request.refresh_token, "abc");

        let empty: RefreshTokenRequest = serde_json::from_str("{}").unwrap();
        assert!(empty.refresh_token.is_empty());
    }
}
