/// Request Authentication Gate
///
/// Runs before every handler under the wrapped scope. Finds a candidate
/// access token, resolves it to a principal and stores the result in the
/// request extensions. It never rejects a request because of a bad token;
/// handlers that need a caller ask for `AuthenticatedPrincipal`, which fails
/// with the recorded reason. Store failures are returned as errors.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, HttpMessage, HttpRequest,
};
use chrono::{DateTime, Utc};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::AuthService;
use crate::error::{AppError, AuthError};
use crate::principal::{AuthenticatedPrincipal, GateRejection};

const BEARER_PREFIX: &str = "Bearer ";

/// Where the gate looks for the access token. Fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    /// `Authorization: Bearer <token>`
    AuthorizationHeader,
    /// HttpOnly cookie with the given name
    Cookie(String),
}

impl TokenSource {
    pub fn extract(&self, req: &HttpRequest) -> Option<String> {
        let token = match self {
            TokenSource::AuthorizationHeader => req
                .headers()
                .get(AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .and_then(|h| h.strip_prefix(BEARER_PREFIX))
                .map(|t| t.trim().to_string()),
            TokenSource::Cookie(name) => req.cookie(name).map(|c| c.value().to_string()),
        };
        token.filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Authenticated(AuthenticatedPrincipal),
    Rejected(AuthError),
}

/// Resolve a raw token into a principal.
///
/// The subject is read unverified only to pick the principal; the token is
/// then fully validated and must name that same principal.
///
/// # Errors
/// Only storage failures; every token problem is a `Rejected` outcome.
pub async fn resolve_principal(
    auth: &AuthService,
    token: &str,
    now: DateTime<Utc>,
) -> Result<GateOutcome, AppError> {
    let username = match auth.codec().username(token) {
        Ok(username) => username,
        Err(reason) => return Ok(GateOutcome::Rejected(reason)),
    };

    let principal = match auth.users().find_by_username(&username).await? {
        Some(principal) if principal.role.is_active() => principal,
        _ => return Ok(GateOutcome::Rejected(AuthError::Unauthenticated)),
    };

    let claims = match auth.codec().validate(token, now) {
        Ok(claims) => claims,
        Err(reason) => return Ok(GateOutcome::Rejected(reason)),
    };

    if claims.sub != principal.username || claims.id != principal.id {
        return Ok(GateOutcome::Rejected(AuthError::TokenMalformed));
    }

    Ok(GateOutcome::Authenticated(AuthenticatedPrincipal::from(&principal)))
}

pub struct AuthGate {
    auth: AuthService,
    source: TokenSource,
}

impl AuthGate {
    pub fn new(auth: AuthService, source: TokenSource) -> Self {
        Self { auth, source }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthGateService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(AuthGateService {
            service: Rc::new(service),
            auth: self.auth.clone(),
            source: self.source.clone(),
        }))
    }
}

pub struct AuthGateService<S> {
    service: Rc<S>,
    auth: AuthService,
    source: TokenSource,
}

impl<S, B> Service<ServiceRequest> for AuthGateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = self.source.extract(req.request());
        let service = self.service.clone();
        let auth = self.auth.clone();

        Box::pin(async move {
            if let Some(token) = token {
                match resolve_principal(&auth, &token, Utc::now()).await {
                    Ok(GateOutcome::Authenticated(principal)) => {
                        tracing::debug!(
                            user_id = principal.id,
                            username = %principal.username,
                            "Access token accepted"
                        );
                        req.extensions_mut().insert(principal);
                    }
                    Ok(GateOutcome::Rejected(reason)) => {
                        tracing::debug!(reason = %reason, "Access token rejected");
                        req.extensions_mut().insert(GateRejection(reason));
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Authentication gate failed");
                        return Err(e.into());
                    }
                }
            }

            service.call(req).await
        })
    }
}
