use anyhow::anyhow;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, extract::rejection::JsonRejection, http::StatusCode};
use time::OffsetDateTime;
use tower_sessions::Session;
use uuid::Uuid;

use crate::constants::*;
use crate::database::{self, Db};
use crate::error::AppError;
use crate::models::{AuthResponse, LoginPayload, PublicUser, RegisterPayload, User};
use crate::utils::validate_string_length;

fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Failed to hash password: {}", e))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| anyhow!("Failed to parse password hash: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_registration(payload: &RegisterPayload) -> Result<(), AppError> {
    validate_string_length(&payload.name, "Name", MAX_NAME_LENGTH)?;
    validate_string_length(&payload.email, "Email", MAX_EMAIL_LENGTH)?;

    let email = payload.email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
        _ => return Err(AppError::validation("Email must be a valid email address")),
    }

    if payload.password.len() < MIN_PASSWORD_LENGTH {
        return Err(AppError::validation(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

async fn start_session(session: &Session, user: &PublicUser) -> Result<(), AppError> {
    session.cycle_id().await?;
    session.insert(SESSION_USER_KEY, user).await?;
    Ok(())
}

pub async fn register(
    State(db): State<Db>,
    session: Session,
    payload: Result<Json<RegisterPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let Json(payload) = payload?;
    validate_registration(&payload)?;

    let email = normalize_email(&payload.email);
    if database::find_user_by_email(&db, &email).await?.is_some() {
        return Err(AppError::Conflict(ERR_EMAIL_TAKEN.to_string()));
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        name: payload.name.trim().to_string(),
        email,
        password_hash: hash_password(&payload.password)?,
    };

    database::insert_user_with_defaults(&db, &user, OffsetDateTime::now_utc())
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint failed") {
                AppError::Conflict(ERR_EMAIL_TAKEN.to_string())
            } else {
                AppError::Store(e)
            }
        })?;

    let public = PublicUser {
        id: user.id,
        name: user.name,
        email: user.email,
    };
    start_session(&session, &public).await?;
    tracing::info!(user_id = %public.id, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: MSG_REGISTERED.to_string(),
            user: public,
        }),
    ))
}

pub async fn login(
    State(db): State<Db>,
    session: Session,
    payload: Result<Json<LoginPayload>, JsonRejection>,
) -> Result<Json<AuthResponse>, AppError> {
    let Json(payload) = payload?;
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::validation("Email and password are required"));
    }

    let user = database::find_user_by_email(&db, &normalize_email(&payload.email))
        .await?
        .ok_or_else(|| AppError::Unauthorized(ERR_INVALID_CREDENTIALS.to_string()))?;

    if !verify_password(&payload.password, &user.password_hash)? {
        return Err(AppError::Unauthorized(ERR_INVALID_CREDENTIALS.to_string()));
    }

    let public = PublicUser {
        id: user.id,
        name: user.name,
        email: user.email,
    };
    start_session(&session, &public).await?;
    tracing::debug!(user_id = %public.id, "user logged in");

    Ok(Json(AuthResponse {
        message: MSG_LOGGED_IN.to_string(),
        user: public,
    }))
}

/// Resolves the authenticated user for a request.
pub async fn get_current_user(session: &Session) -> Result<PublicUser, AppError> {
    session
        .get::<PublicUser>(SESSION_USER_KEY)
        .await?
        .ok_or_else(|| AppError::Unauthorized(ERR_UNAUTHORIZED.to_string()))
}

pub async fn me(session: Session) -> Result<Json<PublicUser>, AppError> {
    let user = get_current_user(&session).await?;
    Ok(Json(user))
}

pub async fn logout(session: Session) -> Result<StatusCode, AppError> {
    session.flush().await?;

    Ok(StatusCode::NO_CONTENT)
}
