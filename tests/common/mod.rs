#![allow(dead_code)]

use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceResponse},
    http::StatusCode,
    test, web,
};
use serde_json::{json, Value};
use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use taskdeck::{
    clock::ManualClock,
    config::Config,
    store::{MemoryStore, Store},
    AppState,
};

pub const PASSWORD: &str = "Str0ng!Pass";

static NEXT_PEER: AtomicUsize = AtomicUsize::new(0);

/// Everything a test needs to drive the app and steer time.
pub struct TestContext {
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
    pub state: web::Data<AppState>,
}

/// App state over an in-memory store, with the cheapest bcrypt cost.
pub fn context() -> TestContext {
    let config = Config::from_lookup(|key| {
        let value = match key {
            "JWT_SECRET" => "integration-test-secret",
            "DATABASE_URL" => "postgres://unused",
            "BCRYPT_COST" => "4",
            _ => return None,
        };
        Some(value.to_string())
    })
    .expect("test configuration");

    let clock = Arc::new(ManualClock::default());
    let store = Arc::new(MemoryStore::new(clock.clone()));
    let shared: Arc<dyn Store> = store.clone();
    let state = web::Data::new(AppState::from_config(&config, shared, clock.clone()));
    TestContext {
        clock,
        store,
        state,
    }
}

pub fn peer(ip: &str) -> SocketAddr {
    format!("{}:40000", ip).parse().unwrap()
}

/// Sends a request and decodes the JSON body (`Null` when empty).
pub async fn send<S, B>(app: &S, req: actix_http::Request) -> (StatusCode, Value)
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|_| {
            panic!("non-JSON body: {}", String::from_utf8_lossy(&body))
        })
    };
    (status, json)
}

pub async fn register<S, B>(app: &S, email: &str, password: &str) -> (StatusCode, Value)
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({ "email": email, "password": password }))
        .to_request();
    send(app, req).await
}

pub async fn login_from<S, B>(
    app: &S,
    ip: &str,
    email: &str,
    password: &str,
) -> (StatusCode, Value)
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/auth/login")
        .peer_addr(peer(ip))
        .set_json(json!({ "email": email, "password": password }))
        .to_request();
    send(app, req).await
}

/// Registers `email` and returns a fresh access token for it.
pub async fn access_token<S, B>(app: &S, email: &str) -> String
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let (status, body) = register(app, email, PASSWORD).await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
    // Each login gets its own address so helper logins never share a rate-limit bucket.
    let n = NEXT_PEER.fetch_add(1, Ordering::SeqCst);
    let ip = format!("10.0.{}.{}", n / 250, n % 250 + 1);
    let (status, body) = login_from(app, &ip, email, PASSWORD).await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body["access_token"].as_str().unwrap().to_string()
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}
