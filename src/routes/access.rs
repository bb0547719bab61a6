/// Routes that only need to know who is calling
///
/// Handlers receive an `AuthenticatedPrincipal` resolved by the gate; they
/// never see the raw token.

use actix_web::HttpResponse;

use crate::error::AppError;
use crate::principal::{AuthenticatedPrincipal, Role};

/// GET /api/auth/me
pub async fn current_user(principal: AuthenticatedPrincipal) -> HttpResponse {
    HttpResponse::Ok().json(principal)
}

/// GET /api/test/user
pub async fn user_area(principal: AuthenticatedPrincipal) -> Result<HttpResponse, AppError> {
    principal.require_role(Role::User)?;
    Ok(greeting(&principal))
}

/// GET /api/test/admin
pub async fn admin_area(principal: AuthenticatedPrincipal) -> Result<HttpResponse, AppError> {
    principal.require_role(Role::Admin)?;
    Ok(greeting(&principal))
}

fn greeting(principal: &AuthenticatedPrincipal) -> HttpResponse {
    HttpResponse::Ok().body(format!("Hello, {}!", principal.username))
}
