/// Authentication Routes (cookie delivery)
///
/// Same flows as the JSON routes, but both tokens are set as HttpOnly
/// cookies. The access cookie is scoped to the whole API, the refresh cookie
/// only to the refresh endpoint, so browsers send it nowhere else.

use actix_web::cookie::{time::Duration, Cookie, SameSite};
use actix_web::{web, HttpRequest, HttpResponse, HttpResponseBuilder};

use crate::auth::{AuthService, IssuedTokens};
use crate::configuration::DeliverySettings;
use crate::error::{AppError, ValidationError};
use crate::principal::AuthenticatedPrincipal;
use crate::routes::auth::{SignInRequest, SignUpRequest};

fn token_cookie(name: &str, value: String, path: &str, settings: &DeliverySettings) -> Cookie<'static> {
    Cookie::build(name.to_string(), value)
        .path(path.to_string())
        .http_only(true)
        .secure(settings.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(Duration::seconds(settings.cookie_max_age))
        .finish()
}

fn removal_cookie(name: &str, path: &str, settings: &DeliverySettings) -> Cookie<'static> {
    let mut cookie = token_cookie(name, String::new(), path, settings);
    cookie.make_removal();
    cookie
}

pub fn access_cookie(token: String, settings: &DeliverySettings) -> Cookie<'static> {
    token_cookie(&settings.access_cookie_name, token, &settings.access_cookie_path, settings)
}

pub fn refresh_cookie(token: String, settings: &DeliverySettings) -> Cookie<'static> {
    token_cookie(&settings.refresh_cookie_name, token, &settings.refresh_cookie_path, settings)
}

fn with_token_cookies(
    mut builder: HttpResponseBuilder,
    tokens: IssuedTokens,
    settings: &DeliverySettings,
) -> HttpResponse {
    builder
        .cookie(access_cookie(tokens.access_token, settings))
        .cookie(refresh_cookie(tokens.refresh_token, settings))
        .finish()
}

/// POST /api/auth/signup
pub async fn sign_up(
    form: web::Json<SignUpRequest>,
    auth: web::Data<AuthService>,
    delivery: web::Data<DeliverySettings>,
) -> Result<HttpResponse, AppError> {
    let tokens = auth.sign_up(&form.username, &form.email, &form.password).await?;
    Ok(with_token_cookies(HttpResponse::Created(), tokens, &delivery))
}

/// POST /api/auth/login
pub async fn sign_in(
    form: web::Json<SignInRequest>,
    auth: web::Data<AuthService>,
    delivery: web::Data<DeliverySettings>,
) -> Result<HttpResponse, AppError> {
    let tokens = auth.sign_in(&form.username, &form.password).await?;
    Ok(with_token_cookies(HttpResponse::Ok(), tokens, &delivery))
}

/// POST /api/auth/refresh
///
/// Reads the refresh token from its scoped cookie instead of the body.
///
/// # Errors
/// - 400: Refresh cookie missing or empty
/// - 401: Unknown, already used, revoked or expired refresh token
pub async fn refresh(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    delivery: web::Data<DeliverySettings>,
) -> Result<HttpResponse, AppError> {
    let refresh_token = req
        .cookie(&delivery.refresh_cookie_name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ValidationError::EmptyField(delivery.refresh_cookie_name.clone()))?;

    let tokens = auth.refresh(&refresh_token).await?;
    Ok(with_token_cookies(HttpResponse::Ok(), tokens, &delivery))
}

/// POST /api/auth/logout
///
/// Revokes the caller's refresh token and expires both cookies.
pub async fn logout(
    principal: AuthenticatedPrincipal,
    auth: web::Data<AuthService>,
    delivery: web::Data<DeliverySettings>,
) -> Result<HttpResponse, AppError> {
    auth.logout(principal.id).await?;

    Ok(HttpResponse::NoContent()
        .cookie(removal_cookie(&delivery.access_cookie_name, &delivery.access_cookie_path, &delivery))
        .cookie(removal_cookie(&delivery.refresh_cookie_name, &delivery.refresh_cookie_path, &delivery))
        .finish())
}
