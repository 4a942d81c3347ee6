use axum::{response::Json, Extension};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sqlx::FromRow;
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::error::ApiError;
use crate::middleware::auth::AuthUser;

#[derive(Debug, FromRow)]
struct PurchaseWithTitle {
    purchase_id: Uuid,
    prompt_id: Uuid,
    title: String,
    payment_id: String,
    amount_cents: i64,
    created_at: DateTime<Utc>,
}

/// GET /api/purchases/mine - Purchase history for the current user
pub async fn mine(Extension(auth): Extension<AuthUser>) -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let rows: Vec<PurchaseWithTitle> = sqlx::query_as(
        "SELECT pu.id AS purchase_id, p.id AS prompt_id, p.title, pu.payment_id, \
                pu.amount_cents, pu.created_at \
         FROM purchases pu \
         JOIN prompts p ON p.id = pu.prompt_id \
         WHERE pu.user_id = $1 \
         ORDER BY pu.created_at DESC",
    )
    .bind(auth.user_id)
    .fetch_all(&pool)
    .await?;

    let purchases: Vec<Value> = rows
        .into_iter()
        .map(|row| {
            json!({
                "purchase_id": row.purchase_id,
                "prompt_id": row.prompt_id,
                "title": row.title,
                "payment_id": row.payment_id,
                "amount_cents": row.amount_cents,
                "created_at": row.created_at,
            })
        })
        .collect();

    Ok(Json(json!(purchases)))
}
