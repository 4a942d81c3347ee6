use axum::{body::Bytes, http::HeaderMap, response::Json, Extension};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config;
use crate::database::manager::DatabaseManager;
use crate::database::models::{Prompt, User};
use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::services::PaymentClient;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub prompt_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct PayoutRequest {
    pub amount_cents: i64,
}

/// POST /api/payments/checkout - Start a purchase for one prompt.
///
/// With a configured provider this creates a hosted checkout session and
/// the purchase lands later via the webhook. Without one (dev mode) the
/// purchase is granted immediately.
pub async fn checkout(
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let prompt: Option<Prompt> = sqlx::query_as(
        "SELECT id, owner_id, title, description, content, price_cents, license_type, \
                is_active, is_featured, views, downloads, created_at \
         FROM prompts WHERE id = $1 AND is_active",
    )
    .bind(payload.prompt_id)
    .fetch_optional(&pool)
    .await?;
    let prompt = prompt.ok_or_else(|| ApiError::not_found("Prompt not found"))?;

    if prompt.owner_id == auth.user_id {
        return Err(ApiError::bad_request("Cannot purchase your own prompt"));
    }

    let already_purchased: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM purchases WHERE user_id = $1 AND prompt_id = $2)",
    )
    .bind(auth.user_id)
    .bind(prompt.id)
    .fetch_one(&pool)
    .await?;
    if already_purchased {
        return Err(ApiError::conflict("Prompt already purchased"));
    }

    match PaymentClient::from_config() {
        Some(client) => {
            let session = client.create_checkout_session(&prompt, auth.user_id).await?;
            Ok(Json(json!({
                "session_id": session.id,
                "checkout_url": session.url,
            })))
        }
        None => {
            // Dev mode: instant purchase, same confirmation path as the webhook
            let payment_id = format!("dev_{}", prompt.id);
            confirm_purchase(&pool, auth.user_id, &prompt, &payment_id, prompt.price_cents)
                .await?;
            Ok(Json(json!({
                "dev": true,
                "message": "DEV purchase complete",
                "redirect_url": format!("{}/success", config::config().payments.app_url),
            })))
        }
    }
}

/// POST /api/payments/webhook - Provider event sink.
///
/// Signature-verified against the raw body. A completed checkout session
/// creates the purchase; redelivery of the same event is a no-op thanks to
/// the unique (user, prompt) constraint.
pub async fn webhook(headers: HeaderMap, body: Bytes) -> Result<Json<Value>, ApiError> {
    let Some(client) = PaymentClient::from_config() else {
        // Dev mode has no provider to receive events from
        return Ok(Json(json!({ "ok": true })));
    };

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::bad_request("Missing webhook signature"))?;

    if !client.verify_webhook_signature(&body, signature)? {
        return Err(ApiError::bad_request("Invalid webhook signature"));
    }

    let event = client.parse_event(&body)?;
    if event.event_type == "checkout.session.completed" {
        let (user_id, prompt_id) = event.data.object.purchase_refs()?;

        let pool = DatabaseManager::pool().await?;
        let prompt: Option<Prompt> = sqlx::query_as(
            "SELECT id, owner_id, title, description, content, price_cents, license_type, \
                    is_active, is_featured, views, downloads, created_at \
             FROM prompts WHERE id = $1",
        )
        .bind(prompt_id)
        .fetch_optional(&pool)
        .await?;
        let prompt = prompt.ok_or_else(|| ApiError::not_found("Prompt not found"))?;

        let amount = event.data.object.amount_total.unwrap_or(prompt.price_cents);
        let created =
            confirm_purchase(&pool, user_id, &prompt, &event.data.object.id, amount).await?;
        if !created {
            tracing::info!(
                "Duplicate purchase confirmation for user {} prompt {}",
                user_id,
                prompt_id
            );
        }
    }

    Ok(Json(json!({ "ok": true })))
}

/// GET /api/payments/balance - Current seller balance
pub async fn balance(Extension(auth): Extension<AuthUser>) -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let balance_cents: Option<i64> =
        sqlx::query_scalar("SELECT balance_cents FROM users WHERE id = $1")
            .bind(auth.user_id)
            .fetch_optional(&pool)
            .await?;
    let balance_cents = balance_cents.ok_or_else(|| ApiError::unauthorized("User not found"))?;

    Ok(Json(json!({
        "balance_cents": balance_cents,
        "balance_formatted": format!("${:.2}", balance_cents as f64 / 100.0),
    })))
}

/// POST /api/payments/payout - Withdraw from the seller balance
pub async fn payout(
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<PayoutRequest>,
) -> Result<Json<Value>, ApiError> {
    let payments = &config::config().payments;
    if payload.amount_cents < payments.min_payout_cents {
        return Err(ApiError::bad_request(format!(
            "Minimum withdrawal amount is ${:.2}",
            payments.min_payout_cents as f64 / 100.0
        )));
    }

    let pool = DatabaseManager::pool().await?;

    let user: Option<User> = sqlx::query_as(
        "SELECT id, email, password_hash, is_seller, balance_cents, payout_account_id, created_at \
         FROM users WHERE id = $1",
    )
    .bind(auth.user_id)
    .fetch_optional(&pool)
    .await?;
    let user = user.ok_or_else(|| ApiError::unauthorized("User not found"))?;

    if payload.amount_cents > user.balance_cents {
        return Err(ApiError::bad_request("Insufficient balance"));
    }

    if let (Some(client), Some(destination)) =
        (PaymentClient::from_config(), user.payout_account_id.as_deref())
    {
        client.create_transfer(payload.amount_cents, destination).await?;
    }

    // Conditional deduction guards against a concurrent withdrawal draining
    // the balance between the read above and this write.
    let remaining: Option<i64> = sqlx::query_scalar(
        "UPDATE users SET balance_cents = balance_cents - $1 \
         WHERE id = $2 AND balance_cents >= $1 \
         RETURNING balance_cents",
    )
    .bind(payload.amount_cents)
    .bind(auth.user_id)
    .fetch_optional(&pool)
    .await?;
    let remaining = remaining.ok_or_else(|| ApiError::bad_request("Insufficient balance"))?;

    Ok(Json(json!({
        "message": "Payout initiated successfully",
        "balance_cents": remaining,
    })))
}

/// Record a confirmed purchase. Returns false when the (user, prompt) pair
/// is already recorded - the duplicate confirmation changes nothing: no
/// second balance credit, no second downloads bump, no second event.
pub async fn confirm_purchase(
    pool: &PgPool,
    user_id: Uuid,
    prompt: &Prompt,
    payment_id: &str,
    amount_cents: i64,
) -> Result<bool, ApiError> {
    let mut tx = pool.begin().await?;

    let inserted: Option<(Uuid,)> = sqlx::query_as(
        "INSERT INTO purchases (user_id, prompt_id, payment_id, amount_cents) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (user_id, prompt_id) DO NOTHING \
         RETURNING id",
    )
    .bind(user_id)
    .bind(prompt.id)
    .bind(payment_id)
    .bind(amount_cents)
    .fetch_optional(&mut *tx)
    .await?;

    if inserted.is_none() {
        tx.rollback().await?;
        return Ok(false);
    }

    let seller_share_percent = config::config().payments.seller_share_percent as i64;
    let seller_share = amount_cents * seller_share_percent / 100;

    sqlx::query("UPDATE users SET balance_cents = balance_cents + $1 WHERE id = $2")
        .bind(seller_share)
        .bind(prompt.owner_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE prompts SET downloads = downloads + 1 WHERE id = $1")
        .bind(prompt.id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "INSERT INTO analytics_events (prompt_id, user_id, event_type) VALUES ($1, $2, 'purchase')",
    )
    .bind(prompt.id)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}
