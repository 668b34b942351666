#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header, request},
};
use http_body_util::BodyExt;
use money_manager_server::database::{self, Db, init_db};
use money_manager_server::models::{Expense, User};
use money_manager_server::money::Cents;
use money_manager_server::server::{router, session_key};
use serde_json::Value;
use tempfile::{TempDir, tempdir};
use time::{Duration, OffsetDateTime, macros::datetime};
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_SESSION_SECRET: &str =
    "test-secret-test-secret-test-secret-test-secret-test-secret-test-secret";
pub const TEST_BASE_TIME: OffsetDateTime = datetime!(2024-01-01 08:00 UTC);

/// Fresh database in its own temporary directory; keep the `TempDir` alive.
pub async fn setup_test_environment() -> (Db, TempDir) {
    let temp_dir = tempdir().expect("Failed to create temporary directory");
    let data_path = temp_dir
        .path()
        .to_str()
        .expect("Failed to convert path to string")
        .to_string();

    let db = init_db(&data_path)
        .await
        .unwrap_or_else(|e| panic!("Failed to initialize database at {}: {}", data_path, e));

    (db, temp_dir)
}

pub async fn create_test_user(db: &Db, email: &str) -> String {
    let user = User {
        id: Uuid::new_v4().to_string(),
        name: "Test User".to_string(),
        email: email.to_string(),
        password_hash: "not-a-real-hash".to_string(),
    };
    database::insert_user_with_defaults(db, &user, TEST_BASE_TIME)
        .await
        .unwrap_or_else(|e| panic!("Failed to insert test user {}: {}", email, e));
    user.id
}

/// In-memory expense; `seq` offsets `created_at` by that many seconds.
pub fn sample_expense(user_id: &str, cents: i64, category: &str, date: &str, seq: i64) -> Expense {
    let created_at = TEST_BASE_TIME + Duration::seconds(seq);
    Expense {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        amount: Cents::new(cents),
        category: category.to_string(),
        description: String::new(),
        date: date.parse().expect("Invalid test date"),
        created_at,
        updated_at: created_at,
    }
}

pub async fn create_test_expense(
    db: &Db,
    user_id: &str,
    cents: i64,
    category: &str,
    date: &str,
    seq: i64,
) -> Expense {
    let expense = sample_expense(user_id, cents, category, date, seq);
    database::insert_expense(db, &expense)
        .await
        .unwrap_or_else(|e| panic!("Failed to insert test expense for {}: {}", user_id, e));
    expense
}

pub fn test_app(db: Db) -> Router {
    let key = session_key(TEST_SESSION_SECRET).expect("Invalid test session secret");
    router(db, key)
}

/// Response status, headers, JSON body (or `Null`), and the session cookie if one was set.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
    pub cookie: Option<String>,
}

pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> TestResponse {
    match body {
        Some(json) => send_raw(app, method, uri, cookie, &json.to_string()).await,
        None => dispatch(app, request_builder(method, uri, cookie).body(Body::empty())).await,
    }
}

/// Sends `body` verbatim as `application/json`, valid or not.
pub async fn send_raw(
    app: &Router,
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    body: &str,
) -> TestResponse {
    let request = request_builder(method, uri, cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()));
    dispatch(app, request).await
}

fn request_builder(method: &str, uri: &str, cookie: Option<&str>) -> request::Builder {
    let builder = Request::builder().method(method).uri(uri);
    match cookie {
        Some(cookie) => builder.header(header::COOKIE, cookie),
        None => builder,
    }
}

async fn dispatch(app: &Router, request: axum::http::Result<Request<Body>>) -> TestResponse {
    let request = request.expect("Failed to build request");
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("Router failed to respond");

    let status = response.status();
    let headers = response.headers().clone();
    let cookie = headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string);
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read response body")
        .to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Response body is not JSON")
    };

    TestResponse {
        status,
        headers,
        body,
        cookie,
    }
}

/// Registers a user through the API and returns its session cookie.
pub async fn register_user(app: &Router, email: &str) -> (String, Value) {
    let res = send(
        app,
        "POST",
        "/api/auth/register",
        None,
        Some(serde_json::json!({
            "name": "Test User",
            "email": email,
            "password": "password123",
        })),
    )
    .await;
    assert_eq!(res.status, StatusCode::CREATED, "register failed: {}", res.body);
    let cookie = res.cookie.expect("Register should start a session");
    (cookie, res.body["user"].clone())
}
