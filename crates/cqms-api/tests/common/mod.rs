#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, Response};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use cqms_api::auth::{AppState, AppStateInner};
use cqms_db::Database;

pub const TEST_SECRET: &str = "integration-test-secret";

/// Full router over a fresh in-memory database.
pub fn build_test_app() -> Router {
    build_test_app_with_ttl(chrono::Duration::hours(1)).0
}

/// Same, with a chosen token lifetime, also handing back the shared state.
pub fn build_test_app_with_ttl(token_ttl: chrono::Duration) -> (Router, AppState) {
    let db = Database::open_in_memory().expect("in-memory database should open");
    let state = Arc::new(AppStateInner::new(db, TEST_SECRET.to_string(), token_ttl));
    (cqms_api::router::router(state.clone()), state)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.clone()
        .oneshot(builder.body(body).expect("request should build"))
        .await
        .expect("router is infallible")
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: &Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, None, Some(body)).await
}

pub async fn post_auth(app: &Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), None).await
}

pub async fn post_json_auth(app: &Router, uri: &str, token: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn put_json_auth(app: &Router, uri: &str, token: &str, body: Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(token), Some(body)).await
}

/// POST a body verbatim with a JSON content type.
pub async fn post_raw_json(app: &Router, uri: &str, token: Option<&str>, raw: &str) -> Response<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    app.clone()
        .oneshot(builder.body(Body::from(raw.to_string())).expect("request should build"))
        .await
        .expect("router is infallible")
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

/// Register through the API and log in, returning the bearer token.
pub async fn register_and_login(app: &Router, username: &str, role: &str) -> String {
    let creds = json!({ "username": username, "password": "pw-123", "role": role });
    let response = post_json(app, "/auth/register", creds).await;
    assert_eq!(response.status(), 201, "register {username}");

    let response = post_json(
        app,
        "/auth/login",
        json!({ "username": username, "password": "pw-123" }),
    )
    .await;
    assert_eq!(response.status(), 200, "login {username}");
    body_json(response).await["token"]
        .as_str()
        .expect("login returns a token")
        .to_string()
}

pub fn query_form(heading: &str) -> Value {
    json!({
        "email": "client@example.com",
        "mobile": "5550100",
        "heading": heading,
        "description": "details",
    })
}

/// Open the add form and submit it as the given client; returns the new id.
pub async fn create_query(app: &Router, token: &str, heading: &str) -> i64 {
    let response = post_auth(app, "/queries/add", token).await;
    assert_eq!(response.status(), 200);
    let response = post_json_auth(app, "/queries", token, query_form(heading)).await;
    assert_eq!(response.status(), 201);
    body_json(response).await["id"]
        .as_i64()
        .expect("created id")
}
