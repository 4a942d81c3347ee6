use axum::{response::Json, Extension};
use serde_json::{json, Value};

use crate::database::manager::DatabaseManager;
use crate::database::models::{Prompt, Purchase};
use crate::error::ApiError;
use crate::middleware::auth::AuthUser;

/// GET /api/dashboard/my-prompts - Own listings, including inactive ones
pub async fn my_prompts(Extension(auth): Extension<AuthUser>) -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let prompts: Vec<Prompt> = sqlx::query_as(
        "SELECT id, owner_id, title, description, content, price_cents, license_type, \
                is_active, is_featured, views, downloads, created_at \
         FROM prompts WHERE owner_id = $1 \
         ORDER BY created_at DESC",
    )
    .bind(auth.user_id)
    .fetch_all(&pool)
    .await?;

    let listing: Vec<Value> = prompts
        .iter()
        .map(|p| {
            json!({
                "id": p.id,
                "title": p.title,
                "price_cents": p.price_cents,
                "price_formatted": p.price_formatted(),
                "views": p.views,
                "downloads": p.downloads,
                "is_active": p.is_active,
                "created_at": p.created_at,
            })
        })
        .collect();

    Ok(Json(json!(listing)))
}

/// GET /api/dashboard/my-purchases
pub async fn my_purchases(Extension(auth): Extension<AuthUser>) -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let purchases: Vec<Purchase> = sqlx::query_as(
        "SELECT id, user_id, prompt_id, payment_id, amount_cents, created_at \
         FROM purchases WHERE user_id = $1 \
         ORDER BY created_at DESC",
    )
    .bind(auth.user_id)
    .fetch_all(&pool)
    .await?;

    let listing: Vec<Value> = purchases
        .iter()
        .map(|p| {
            json!({
                "id": p.id,
                "prompt_id": p.prompt_id,
                "payment_id": p.payment_id,
                "amount_cents": p.amount_cents,
                "created_at": p.created_at,
            })
        })
        .collect();

    Ok(Json(json!(listing)))
}

/// GET /api/dashboard/earnings - Seller only; totals summed in SQL
pub async fn earnings(Extension(auth): Extension<AuthUser>) -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let is_seller: Option<bool> = sqlx::query_scalar("SELECT is_seller FROM users WHERE id = $1")
        .bind(auth.user_id)
        .fetch_optional(&pool)
        .await?;
    let is_seller = is_seller.ok_or_else(|| ApiError::unauthorized("User not found"))?;
    if !is_seller {
        return Err(ApiError::forbidden("Seller access required"));
    }

    let (total_earnings_cents, total_sales): (i64, i64) = sqlx::query_as(
        "SELECT COALESCE(SUM(p.price_cents), 0)::bigint, COUNT(pu.id)::bigint \
         FROM purchases pu \
         JOIN prompts p ON p.id = pu.prompt_id \
         WHERE p.owner_id = $1",
    )
    .bind(auth.user_id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(json!({
        "total_earnings_cents": total_earnings_cents,
        "total_earnings_formatted": format!("${:.2}", total_earnings_cents as f64 / 100.0),
        "total_sales": total_sales,
    })))
}
