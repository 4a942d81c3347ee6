use axum::{
    extract::{Path, Query},
    response::Json,
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::{prompt::LICENSE_TYPES, Prompt, Tag};
use crate::entitlement::{Entitlements, PgEntitlementStore};
use crate::error::ApiError;
use crate::handlers::validate;
use crate::middleware::auth::AuthUser;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Filter by tag name
    pub tag: Option<String>,
    /// Show only featured prompts
    #[serde(default)]
    pub featured: bool,
}

#[derive(Debug, Deserialize)]
pub struct PromptCreateRequest {
    pub title: String,
    pub description: String,
    pub content: String,
    pub price_cents: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_license")]
    pub license_type: String,
}

fn default_license() -> String {
    "personal".to_string()
}

/// GET /api/prompts - Active prompts, optionally filtered by tag/featured
pub async fn list(Query(query): Query<ListQuery>) -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let prompts: Vec<Prompt> = match &query.tag {
        Some(tag) => {
            sqlx::query_as(
                "SELECT p.id, p.owner_id, p.title, p.description, p.content, p.price_cents, \
                        p.license_type, p.is_active, p.is_featured, p.views, p.downloads, p.created_at \
                 FROM prompts p \
                 JOIN prompt_tags pt ON pt.prompt_id = p.id \
                 JOIN tags t ON t.id = pt.tag_id \
                 WHERE p.is_active AND (NOT $1 OR p.is_featured) AND t.name = $2 \
                 ORDER BY p.created_at DESC",
            )
            .bind(query.featured)
            .bind(tag)
            .fetch_all(&pool)
            .await?
        }
        None => {
            sqlx::query_as(
                "SELECT id, owner_id, title, description, content, price_cents, license_type, \
                        is_active, is_featured, views, downloads, created_at \
                 FROM prompts \
                 WHERE is_active AND (NOT $1 OR is_featured) \
                 ORDER BY created_at DESC",
            )
            .bind(query.featured)
            .fetch_all(&pool)
            .await?
        }
    };

    let tags = tags_for_prompts(&pool, &prompts).await?;
    let listing: Vec<Value> = prompts
        .iter()
        .map(|p| summary(p, tags.get(&p.id)))
        .collect();
    Ok(Json(json!(listing)))
}

/// GET /api/prompts/featured
pub async fn featured(Query(mut query): Query<ListQuery>) -> Result<Json<Value>, ApiError> {
    query.featured = true;
    list(Query(query)).await
}

/// GET /api/prompts/:id - Public detail. Bumps the view counter in the
/// same statement that reads the row, so concurrent views never lose an
/// increment. Inactive prompts are invisible here too.
pub async fn get(Path(prompt_id): Path<Uuid>) -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let prompt: Option<Prompt> = sqlx::query_as(
        "UPDATE prompts SET views = views + 1 \
         WHERE id = $1 AND is_active \
         RETURNING id, owner_id, title, description, content, price_cents, license_type, \
                   is_active, is_featured, views, downloads, created_at",
    )
    .bind(prompt_id)
    .fetch_optional(&pool)
    .await?;
    let prompt = prompt.ok_or_else(|| ApiError::not_found("Prompt not found"))?;

    let tags: Vec<Tag> = sqlx::query_as(
        "SELECT t.id, t.name FROM tags t \
         JOIN prompt_tags pt ON pt.tag_id = t.id \
         WHERE pt.prompt_id = $1 ORDER BY t.name",
    )
    .bind(prompt_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(json!({
        "id": prompt.id,
        "title": prompt.title,
        "description": prompt.description,
        "preview": prompt.preview(),
        "price_cents": prompt.price_cents,
        "price_formatted": prompt.price_formatted(),
        "views": prompt.views,
        "downloads": prompt.downloads,
        "license_type": prompt.license_type,
        "is_featured": prompt.is_featured,
        "created_at": prompt.created_at,
        "tags": tags.iter().map(|t| json!({"id": t.id, "name": t.name})).collect::<Vec<_>>(),
    })))
}

/// POST /api/prompts - Create a listing with tags
pub async fn create(
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<PromptCreateRequest>,
) -> Result<Json<Value>, ApiError> {
    validate::non_empty("title", &payload.title)?;
    validate::non_empty("description", &payload.description)?;
    validate::non_empty("content", &payload.content)?;
    validate::price_cents(payload.price_cents)?;
    validate::one_of("license_type", &payload.license_type, LICENSE_TYPES)?;

    let pool = DatabaseManager::pool().await?;

    let prompt_id: Uuid = sqlx::query_scalar(
        "INSERT INTO prompts (owner_id, title, description, content, price_cents, license_type) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
    )
    .bind(auth.user_id)
    .bind(payload.title.trim())
    .bind(payload.description.trim())
    .bind(&payload.content)
    .bind(payload.price_cents)
    .bind(&payload.license_type)
    .fetch_one(&pool)
    .await?;

    for tag_name in &payload.tags {
        let name = tag_name.trim().to_lowercase();
        if name.is_empty() {
            continue;
        }
        let tag_id = get_or_create_tag(&pool, &name).await?;
        sqlx::query(
            "INSERT INTO prompt_tags (prompt_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(prompt_id)
        .bind(tag_id)
        .execute(&pool)
        .await?;
    }

    Ok(Json(json!({ "id": prompt_id })))
}

/// GET /api/prompts/:id/ownership
pub async fn ownership(
    Path(prompt_id): Path<Uuid>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let owner_id: Option<Uuid> = sqlx::query_scalar("SELECT owner_id FROM prompts WHERE id = $1")
        .bind(prompt_id)
        .fetch_optional(&pool)
        .await?;
    let owner_id = owner_id.ok_or_else(|| ApiError::not_found("Prompt not found"))?;

    Ok(Json(json!({ "owns_prompt": owner_id == auth.user_id })))
}

/// GET /api/prompts/:id/full - Full content through the entitlement
/// resolver: raw for the owner, watermarked for purchasers, 403 otherwise.
pub async fn full(
    Path(prompt_id): Path<Uuid>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let resolver = Entitlements::new(PgEntitlementStore::new(pool));

    let released = resolver.get_content(prompt_id, Some(auth.user_id)).await?;
    Ok(Json(json!({ "id": released.id, "content": released.content })))
}

/// Public list projection shared with search.
pub(crate) fn summary(prompt: &Prompt, tags: Option<&Vec<String>>) -> Value {
    json!({
        "id": prompt.id,
        "title": prompt.title,
        "description": prompt.description,
        "price_cents": prompt.price_cents,
        "price_formatted": prompt.price_formatted(),
        "views": prompt.views,
        "license_type": prompt.license_type,
        "is_featured": prompt.is_featured,
        "tags": tags.cloned().unwrap_or_default(),
    })
}

/// Tag names for a batch of prompts in one query.
pub(crate) async fn tags_for_prompts(
    pool: &PgPool,
    prompts: &[Prompt],
) -> Result<HashMap<Uuid, Vec<String>>, ApiError> {
    if prompts.is_empty() {
        return Ok(HashMap::new());
    }
    let ids: Vec<Uuid> = prompts.iter().map(|p| p.id).collect();

    let rows: Vec<(Uuid, String)> = sqlx::query_as(
        "SELECT pt.prompt_id, t.name FROM prompt_tags pt \
         JOIN tags t ON t.id = pt.tag_id \
         WHERE pt.prompt_id = ANY($1) ORDER BY t.name",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let mut by_prompt: HashMap<Uuid, Vec<String>> = HashMap::new();
    for (prompt_id, name) in rows {
        by_prompt.entry(prompt_id).or_default().push(name);
    }
    Ok(by_prompt)
}

pub(crate) async fn get_or_create_tag(pool: &PgPool, name: &str) -> Result<Uuid, ApiError> {
    // DO UPDATE makes the RETURNING clause yield the id on conflict too
    let tag_id: Uuid = sqlx::query_scalar(
        "INSERT INTO tags (name) VALUES ($1) \
         ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
         RETURNING id",
    )
    .bind(name)
    .fetch_one(pool)
    .await?;
    Ok(tag_id)
}
