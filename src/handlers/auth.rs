use axum::{response::Json, Extension};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{generate_jwt, hash_password, verify_password, Claims};
use crate::database::manager::DatabaseManager;
use crate::database::models::User;
use crate::error::ApiError;
use crate::handlers::validate;
use crate::middleware::auth::AuthUser;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/auth/register - Create an account and return a bearer token
pub async fn register(Json(payload): Json<RegisterRequest>) -> Result<Json<Value>, ApiError> {
    validate::email(&payload.email)?;
    validate::password(&payload.password)?;

    let pool = DatabaseManager::pool().await?;

    let existing: Option<(uuid::Uuid,)> =
        sqlx::query_as("SELECT id FROM users WHERE email = $1")
            .bind(&payload.email)
            .fetch_optional(&pool)
            .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("Email already registered"));
    }

    let password_hash = hash_password(&payload.password).map_err(|e| {
        tracing::error!("Password hashing failed: {}", e);
        ApiError::internal_server_error("Failed to create account")
    })?;

    let user: User = sqlx::query_as(
        "INSERT INTO users (email, password_hash) VALUES ($1, $2) \
         RETURNING id, email, password_hash, is_seller, balance_cents, payout_account_id, created_at",
    )
    .bind(&payload.email)
    .bind(&password_hash)
    .fetch_one(&pool)
    .await?;

    let token = generate_jwt(Claims::new(user.id, user.email.clone()))?;
    Ok(Json(json!({ "token": token, "email": user.email })))
}

/// POST /api/auth/login - Authenticate and return a bearer token
pub async fn login(Json(payload): Json<LoginRequest>) -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let user: Option<User> = sqlx::query_as(
        "SELECT id, email, password_hash, is_seller, balance_cents, payout_account_id, created_at \
         FROM users WHERE email = $1",
    )
    .bind(&payload.email)
    .fetch_optional(&pool)
    .await?;

    // Same message for unknown email and wrong password
    let user = match user {
        Some(u) if verify_password(&payload.password, &u.password_hash) => u,
        _ => return Err(ApiError::unauthorized("Invalid credentials")),
    };

    let token = generate_jwt(Claims::new(user.id, user.email.clone()))?;
    Ok(Json(json!({ "token": token, "email": user.email })))
}

/// GET /api/auth/whoami - Current account details
pub async fn whoami(Extension(auth): Extension<AuthUser>) -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let user: Option<User> = sqlx::query_as(
        "SELECT id, email, password_hash, is_seller, balance_cents, payout_account_id, created_at \
         FROM users WHERE id = $1",
    )
    .bind(auth.user_id)
    .fetch_optional(&pool)
    .await?;

    let user = user.ok_or_else(|| ApiError::unauthorized("User not found"))?;

    Ok(Json(json!({
        "id": user.id,
        "email": user.email,
        "is_seller": user.is_seller,
        "balance_cents": user.balance_cents,
        "created_at": user.created_at,
    })))
}
