use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer, Scope};
use std::net::TcpListener;

use crate::auth::AuthService;
use crate::configuration::{DeliveryMode, DeliverySettings};
use crate::logger::LoggerMiddleware;
use crate::middleware::{AuthGate, TokenSource};
use crate::routes::{
    admin_area, auth, cookie, current_user, health_check, revoke_all_refresh_tokens,
    revoke_user_refresh_tokens, user_area,
};

/// Sign-up, login, refresh and logout handlers for the configured delivery mode
fn auth_routes(mode: DeliveryMode) -> Scope {
    let scope = web::scope("/auth").route("/me", web::get().to(current_user));

    match mode {
        DeliveryMode::Json => scope
            .route("/signup", web::post().to(auth::sign_up))
            .route("/login", web::post().to(auth::sign_in))
            .route("/refresh", web::post().to(auth::refresh))
            .route("/logout", web::post().to(auth::logout)),
        DeliveryMode::Cookie => scope
            .route("/signup", web::post().to(cookie::sign_up))
            .route("/login", web::post().to(cookie::sign_in))
            .route("/refresh", web::post().to(cookie::refresh))
            .route("/logout", web::post().to(cookie::logout)),
    }
}

fn token_source(delivery: &DeliverySettings) -> TokenSource {
    match delivery.mode {
        DeliveryMode::Json => TokenSource::AuthorizationHeader,
        DeliveryMode::Cookie => TokenSource::Cookie(delivery.access_cookie_name.clone()),
    }
}

pub fn run(
    listener: TcpListener,
    auth: AuthService,
    delivery: DeliverySettings,
) -> Result<Server, std::io::Error> {
    let source = token_source(&delivery);
    let mode = delivery.mode;
    let auth_data = web::Data::new(auth.clone());
    let delivery_data = web::Data::new(delivery);

    tracing::info!(delivery = ?mode, "Mounting authentication routes");

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)

            // Shared state
            .app_data(auth_data.clone())
            .app_data(delivery_data.clone())

            .route("/health_check", web::get().to(health_check))

            // Everything under /api passes through the gate; public routes
            // simply never ask for a principal.
            .service(
                web::scope("/api")
                    .wrap(AuthGate::new(auth.clone(), source.clone()))
                    .service(auth_routes(mode))
                    .service(
                        web::scope("/test")
                            .route("/user", web::get().to(user_area))
                            .route("/admin", web::get().to(admin_area)),
                    )
                    .service(
                        web::scope("/admin")
                            .route("/refresh-tokens", web::delete().to(revoke_all_refresh_tokens))
                            .route(
                                "/refresh-tokens/{user_id}",
                                web::delete().to(revoke_user_refresh_tokens),
                            ),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
