use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::info;
use std::rc::Rc;
use std::time::Instant;

use crate::principal::{AuthenticatedPrincipal, GateRejection};

/// Access log middleware.
/// Logs method, path, status and latency, plus who the gate decided the
/// caller was. Never logs token values.
pub struct LoggerMiddleware;

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = LoggerMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(LoggerMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct LoggerMiddlewareService<S> {
    service: Rc<S>,
}

/// Describe the caller as resolved by the authentication gate
fn caller_label(extensions: &actix_web::dev::Extensions) -> String {
    if let Some(principal) = extensions.get::<AuthenticatedPrincipal>() {
        return format!("user={} role={}", principal.username, principal.role);
    }
    if let Some(GateRejection(reason)) = extensions.get::<GateRejection>() {
        return format!("rejected={}", reason);
    }
    "anonymous".to_string()
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
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
        let start_time = Instant::now();
        let method = req.method().to_string();
        let path = req.path().to_string();

        info!("Request started: {} {}", method, path);

        let service = self.service.clone();

        Box::pin(async move {
            let res = service.call(req).await?;

            let elapsed = start_time.elapsed();
            let caller = caller_label(&res.request().extensions());

            info!(
                "Request completed: {} {} - Status: {} ({}ms) [{}]",
                method,
                path,
                res.status().as_u16(),
                elapsed.as_millis(),
                caller
            );

            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use crate::principal::Role;
    use actix_web::dev::Extensions;

    #[test]
    fn test_caller_label_variants() {
        let mut extensions = Extensions::new();
        assert_eq!(caller_label(&extensions), "anonymous");

        extensions.insert(GateRejection(AuthError::TokenExpired));
        assert!(caller_label(&extensions).starts_with("rejected="));

        extensions.insert(AuthenticatedPrincipal {
            id: 1,
            username: "alice".to_string(),
            role: Role::Admin,
        });
        assert_eq!(caller_label(&extensions), "user=alice role=ADMIN");
    }
}
