use axum::{
    Json, Router,
    http::{HeaderName, HeaderValue, header},
    routing::{get, post},
};
use time::Duration;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::Key};

use crate::constants::*;
use crate::database::Db;
use crate::error::AppError;
use crate::models::HealthResponse;
use crate::{auth, expenses, settings, statistics};

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        message: MSG_HEALTH.to_string(),
    })
}

async fn not_found() -> AppError {
    AppError::NotFound(ERR_ROUTE_NOT_FOUND.to_string())
}

fn security_header(name: HeaderName, value: &'static str) -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::if_not_present(name, HeaderValue::from_static(value))
}

/// Builds the API router with sessions signed by `key`.
pub fn router(db: Db, key: Key) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_name(SESSION_NAME)
        .with_expiry(Expiry::OnInactivity(Duration::days(SESSION_EXPIRY_DAYS)))
        .with_signed(key);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route(
            "/api/expenses",
            get(expenses::get_expenses).post(expenses::create_expense),
        )
        .route(
            "/api/expenses/{id}",
            get(expenses::get_expense)
                .put(expenses::update_expense)
                .delete(expenses::delete_expense),
        )
        .route("/api/statistics", get(statistics::get_statistics))
        .route(
            "/api/settings",
            get(settings::get_settings).put(settings::update_settings),
        )
        .route("/api/budget", get(settings::get_budget))
        .fallback(not_found)
        .layer(session_layer)
        .layer(security_header(header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
        .layer(security_header(header::X_FRAME_OPTIONS, "SAMEORIGIN"))
        .layer(security_header(header::REFERRER_POLICY, "no-referrer"))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(db)
}

/// Derives the cookie signing key from the configured secret.
pub fn session_key(secret: &str) -> anyhow::Result<Key> {
    Key::try_from(secret.as_bytes()).map_err(|e| anyhow::anyhow!("invalid session secret: {e}"))
}

pub async fn run(db: Db, key: Key, listener: tokio::net::TcpListener) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!("Money Manager API listening on http://{}", addr);

    axum::serve(listener, router(db, key)).await
}
