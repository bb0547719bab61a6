//! Integration tests for the liveness endpoint

use gatekeeper::auth::{AuthService, MIN_HASH_COST};
use gatekeeper::configuration::{AuthSettings, DeliverySettings};
use gatekeeper::startup::run;
use gatekeeper::store::InMemoryStore;
use std::net::TcpListener;
use std::sync::Arc;

fn spawn_app() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let settings = AuthSettings {
        secret: "health-check-secret-at-least-32-characters".to_string(),
        issuer: "gatekeeper-test".to_string(),
        access_token_expiry: 900,
        refresh_token_expiry: 3600,
        password_hash_cost: MIN_HASH_COST,
    };
    let store = Arc::new(InMemoryStore::new());
    let auth = AuthService::new(&settings, store.clone(), store)
        .expect("Failed to build auth service");

    let server = run(listener, auth, DeliverySettings::default())
        .expect("Failed to create server");

    let _ = tokio::spawn(async move {
        let _ = server.await;
    });

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn health_check_works() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn health_check_ignores_garbage_credentials() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .header("Authorization", "Bearer not-a-token")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(200, response.status().as_u16());
}
