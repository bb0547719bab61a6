/// Administrative refresh-token revocation
///
/// Both endpoints require role ADMIN. Revocation only affects refresh
/// tokens; access tokens already issued expire on their own.

use actix_web::{web, HttpResponse};

use crate::auth::AuthService;
use crate::error::AppError;
use crate::principal::{AuthenticatedPrincipal, Role};

/// DELETE /api/admin/refresh-tokens
pub async fn revoke_all_refresh_tokens(
    principal: AuthenticatedPrincipal,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    principal.require_role(Role::Admin)?;

    let revoked = auth.refresh_tokens().revoke_all().await?;
    tracing::info!(admin_id = principal.id, revoked = revoked, "Admin revoked all refresh tokens");
    Ok(HttpResponse::NoContent().finish())
}

/// DELETE /api/admin/refresh-tokens/{user_id}
pub async fn revoke_user_refresh_tokens(
    principal: AuthenticatedPrincipal,
    path: web::Path<i64>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    principal.require_role(Role::Admin)?;

    let user_id = path.into_inner();
    auth.refresh_tokens().revoke_by_owner(user_id).await?;
    tracing::info!(admin_id = principal.id, user_id = user_id, "Admin revoked refresh token");
    Ok(HttpResponse::NoContent().finish())
}
