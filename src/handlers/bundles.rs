use axum::{extract::Path, response::Json, Extension};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::{Bundle, Prompt};
use crate::error::ApiError;
use crate::handlers::validate;
use crate::middleware::auth::AuthUser;

#[derive(Debug, Deserialize)]
pub struct BundleCreateRequest {
    pub title: String,
    pub description: String,
    pub price_cents: i64,
    pub prompt_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct BundleUpdateRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub is_active: Option<bool>,
}

/// POST /api/bundles - Create a bundle of the caller's own prompts
pub async fn create(
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<BundleCreateRequest>,
) -> Result<Json<Value>, ApiError> {
    validate::non_empty("title", &payload.title)?;
    validate::non_empty("description", &payload.description)?;
    validate::price_cents(payload.price_cents)?;
    if payload.prompt_ids.is_empty() {
        return Err(ApiError::field_error("prompt_ids", "Bundle needs at least one prompt"));
    }

    let pool = DatabaseManager::pool().await?;

    // Every prompt must exist and belong to the caller before anything is written
    for prompt_id in &payload.prompt_ids {
        let owner_id: Option<Uuid> =
            sqlx::query_scalar("SELECT owner_id FROM prompts WHERE id = $1")
                .bind(prompt_id)
                .fetch_optional(&pool)
                .await?;
        match owner_id {
            None => {
                return Err(ApiError::not_found(format!("Prompt {} not found", prompt_id)))
            }
            Some(owner) if owner != auth.user_id => {
                return Err(ApiError::forbidden(format!(
                    "Prompt {} does not belong to you",
                    prompt_id
                )))
            }
            Some(_) => {}
        }
    }

    let mut tx = pool.begin().await?;

    let bundle_id: Uuid = sqlx::query_scalar(
        "INSERT INTO bundles (owner_id, title, description, price_cents) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(auth.user_id)
    .bind(payload.title.trim())
    .bind(payload.description.trim())
    .bind(payload.price_cents)
    .fetch_one(&mut *tx)
    .await?;

    for prompt_id in &payload.prompt_ids {
        sqlx::query(
            "INSERT INTO bundle_prompts (bundle_id, prompt_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(bundle_id)
        .bind(prompt_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(Json(json!({ "id": bundle_id, "message": "Bundle created successfully" })))
}

/// GET /api/bundles - Active bundles with prompt counts
pub async fn list() -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let rows: Vec<(Uuid, String, String, i64, i64, chrono::DateTime<chrono::Utc>)> =
        sqlx::query_as(
            "SELECT b.id, b.title, b.description, b.price_cents, \
                    COUNT(bp.prompt_id)::bigint AS prompt_count, b.created_at \
             FROM bundles b \
             LEFT JOIN bundle_prompts bp ON bp.bundle_id = b.id \
             WHERE b.is_active \
             GROUP BY b.id \
             ORDER BY b.created_at DESC",
        )
        .fetch_all(&pool)
        .await?;

    let bundles: Vec<Value> = rows
        .into_iter()
        .map(|(id, title, description, price_cents, prompt_count, created_at)| {
            json!({
                "id": id,
                "title": title,
                "description": description,
                "price_cents": price_cents,
                "price_formatted": format!("${:.2}", price_cents as f64 / 100.0),
                "prompt_count": prompt_count,
                "created_at": created_at,
            })
        })
        .collect();

    Ok(Json(json!(bundles)))
}

/// GET /api/bundles/mine - The caller's bundles, active or not
pub async fn mine(Extension(auth): Extension<AuthUser>) -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let rows: Vec<(Uuid, String, String, i64, bool, i64, chrono::DateTime<chrono::Utc>)> =
        sqlx::query_as(
            "SELECT b.id, b.title, b.description, b.price_cents, b.is_active, \
                    COUNT(bp.prompt_id)::bigint AS prompt_count, b.created_at \
             FROM bundles b \
             LEFT JOIN bundle_prompts bp ON bp.bundle_id = b.id \
             WHERE b.owner_id = $1 \
             GROUP BY b.id \
             ORDER BY b.created_at DESC",
        )
        .bind(auth.user_id)
        .fetch_all(&pool)
        .await?;

    let bundles: Vec<Value> = rows
        .into_iter()
        .map(
            |(id, title, description, price_cents, is_active, prompt_count, created_at)| {
                json!({
                    "id": id,
                    "title": title,
                    "description": description,
                    "price_cents": price_cents,
                    "price_formatted": format!("${:.2}", price_cents as f64 / 100.0),
                    "prompt_count": prompt_count,
                    "is_active": is_active,
                    "created_at": created_at,
                })
            },
        )
        .collect();

    Ok(Json(json!(bundles)))
}

/// GET /api/bundles/:id - Bundle detail with prompt summaries
pub async fn get(Path(bundle_id): Path<Uuid>) -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let bundle: Option<Bundle> = sqlx::query_as(
        "SELECT id, owner_id, title, description, price_cents, is_active, created_at \
         FROM bundles WHERE id = $1 AND is_active",
    )
    .bind(bundle_id)
    .fetch_optional(&pool)
    .await?;
    let bundle = bundle.ok_or_else(|| ApiError::not_found("Bundle not found"))?;

    let prompts: Vec<Prompt> = sqlx::query_as(
        "SELECT p.id, p.owner_id, p.title, p.description, p.content, p.price_cents, \
                p.license_type, p.is_active, p.is_featured, p.views, p.downloads, p.created_at \
         FROM prompts p \
         JOIN bundle_prompts bp ON bp.prompt_id = p.id \
         WHERE bp.bundle_id = $1 \
         ORDER BY p.created_at DESC",
    )
    .bind(bundle_id)
    .fetch_all(&pool)
    .await?;

    let prompt_list: Vec<Value> = prompts
        .iter()
        .map(|p| {
            json!({
                "id": p.id,
                "title": p.title,
                "description": p.description,
                "price_cents": p.price_cents,
                "price_formatted": p.price_formatted(),
            })
        })
        .collect();

    Ok(Json(json!({
        "id": bundle.id,
        "title": bundle.title,
        "description": bundle.description,
        "price_cents": bundle.price_cents,
        "price_formatted": bundle.price_formatted(),
        "prompts": prompt_list,
        "created_at": bundle.created_at,
    })))
}

/// PUT /api/bundles/:id - Partial update, owner only
pub async fn update(
    Path(bundle_id): Path<Uuid>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<BundleUpdateRequest>,
) -> Result<Json<Value>, ApiError> {
    if let Some(price) = payload.price_cents {
        validate::price_cents(price)?;
    }
    if let Some(title) = &payload.title {
        validate::non_empty("title", title)?;
    }

    let pool = DatabaseManager::pool().await?;

    let owner_id: Option<Uuid> = sqlx::query_scalar("SELECT owner_id FROM bundles WHERE id = $1")
        .bind(bundle_id)
        .fetch_optional(&pool)
        .await?;
    let owner_id = owner_id.ok_or_else(|| ApiError::not_found("Bundle not found"))?;
    if owner_id != auth.user_id {
        return Err(ApiError::forbidden("Only bundle owner can update"));
    }

    sqlx::query(
        "UPDATE bundles SET \
            title = COALESCE($1, title), \
            description = COALESCE($2, description), \
            price_cents = COALESCE($3, price_cents), \
            is_active = COALESCE($4, is_active) \
         WHERE id = $5",
    )
    .bind(payload.title.as_deref().map(str::trim))
    .bind(payload.description.as_deref().map(str::trim))
    .bind(payload.price_cents)
    .bind(payload.is_active)
    .bind(bundle_id)
    .execute(&pool)
    .await?;

    Ok(Json(json!({ "message": "Bundle updated successfully" })))
}

/// DELETE /api/bundles/:id - Owner only
pub async fn delete(
    Path(bundle_id): Path<Uuid>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let owner_id: Option<Uuid> = sqlx::query_scalar("SELECT owner_id FROM bundles WHERE id = $1")
        .bind(bundle_id)
        .fetch_optional(&pool)
        .await?;
    let owner_id = owner_id.ok_or_else(|| ApiError::not_found("Bundle not found"))?;
    if owner_id != auth.user_id {
        return Err(ApiError::forbidden("Only bundle owner can delete"));
    }

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM bundle_prompts WHERE bundle_id = $1")
        .bind(bundle_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM bundles WHERE id = $1")
        .bind(bundle_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(Json(json!({ "message": "Bundle deleted successfully" })))
}
