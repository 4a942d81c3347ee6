use axum::{extract::Query, response::Json, Extension};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::Tag;
use crate::error::ApiError;
use crate::handlers::{prompts::get_or_create_tag, validate};
use crate::middleware::auth::AuthUser;

#[derive(Debug, Deserialize)]
pub struct PopularQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    10
}

#[derive(Debug, Deserialize)]
pub struct TagCreateRequest {
    pub name: String,
}

/// GET /api/tags - All tags, alphabetical
pub async fn list() -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let tags: Vec<Tag> = sqlx::query_as("SELECT id, name FROM tags ORDER BY name")
        .fetch_all(&pool)
        .await?;

    Ok(Json(json!(tags
        .iter()
        .map(|t| json!({"id": t.id, "name": t.name}))
        .collect::<Vec<_>>())))
}

/// GET /api/tags/popular - Most-used tags
pub async fn popular(Query(query): Query<PopularQuery>) -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let rows: Vec<(Uuid, String, i64)> = sqlx::query_as(
        "SELECT t.id, t.name, COUNT(pt.prompt_id)::bigint AS uses \
         FROM tags t \
         JOIN prompt_tags pt ON pt.tag_id = t.id \
         GROUP BY t.id, t.name \
         ORDER BY COUNT(pt.prompt_id) DESC, t.name \
         LIMIT $1",
    )
    .bind(query.limit.clamp(1, 100))
    .fetch_all(&pool)
    .await?;

    Ok(Json(json!(rows
        .iter()
        .map(|(id, name, uses)| json!({"id": id, "name": name, "uses": uses}))
        .collect::<Vec<_>>())))
}

/// POST /api/tags - Create (or fetch) a tag by name
pub async fn create(
    Extension(_auth): Extension<AuthUser>,
    Json(payload): Json<TagCreateRequest>,
) -> Result<Json<Value>, ApiError> {
    validate::non_empty("name", &payload.name)?;
    let name = payload.name.trim().to_lowercase();

    let pool = DatabaseManager::pool().await?;
    let tag_id = get_or_create_tag(&pool, &name).await?;

    Ok(Json(json!({ "id": tag_id, "name": name })))
}
