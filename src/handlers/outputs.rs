use axum::{extract::Path, response::Json, Extension};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::{output::OUTPUT_TYPES, PromptOutput};
use crate::entitlement::{AccessDecision, Entitlements, PgEntitlementStore};
use crate::error::ApiError;
use crate::handlers::validate;
use crate::middleware::auth::AuthUser;

#[derive(Debug, Deserialize)]
pub struct OutputCreateRequest {
    pub prompt_id: Uuid,
    pub content: String,
    #[serde(default = "default_output_type")]
    pub output_type: String,
    pub rating: Option<i32>,
    pub feedback: Option<String>,
}

fn default_output_type() -> String {
    "text".to_string()
}

#[derive(Debug, Deserialize)]
pub struct OutputUpdateRequest {
    pub content: Option<String>,
    pub output_type: Option<String>,
    pub rating: Option<i32>,
    pub feedback: Option<String>,
}

/// POST /api/outputs - Post an example output. Only the prompt's owner or
/// a purchaser may post; the entitlement resolver makes that call.
pub async fn create(
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<OutputCreateRequest>,
) -> Result<Json<Value>, ApiError> {
    validate::non_empty("content", &payload.content)?;
    validate::one_of("output_type", &payload.output_type, OUTPUT_TYPES)?;
    validate::rating(payload.rating)?;

    let pool = DatabaseManager::pool().await?;

    let resolver = Entitlements::new(PgEntitlementStore::new(pool.clone()));
    let decision = resolver
        .resolve_access(payload.prompt_id, Some(auth.user_id))
        .await?;
    if decision == AccessDecision::Denied {
        return Err(ApiError::forbidden(
            "Must own or purchase prompt to create outputs",
        ));
    }

    let mut tx = pool.begin().await?;

    let output_id: Uuid = sqlx::query_scalar(
        "INSERT INTO prompt_outputs (prompt_id, user_id, content, output_type, rating, feedback) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
    )
    .bind(payload.prompt_id)
    .bind(auth.user_id)
    .bind(&payload.content)
    .bind(&payload.output_type)
    .bind(payload.rating)
    .bind(payload.feedback.as_deref())
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO analytics_events (prompt_id, user_id, event_type) VALUES ($1, $2, 'output')",
    )
    .bind(payload.prompt_id)
    .bind(auth.user_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Json(json!({ "id": output_id, "message": "Output created successfully" })))
}

/// GET /api/outputs/prompt/:id - Public output listing with author emails
pub async fn list_for_prompt(Path(prompt_id): Path<Uuid>) -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let rows: Vec<(Uuid, String, String, Option<i32>, Option<String>, String, chrono::DateTime<chrono::Utc>)> =
        sqlx::query_as(
            "SELECT o.id, o.content, o.output_type, o.rating, o.feedback, u.email, o.created_at \
             FROM prompt_outputs o \
             JOIN users u ON u.id = o.user_id \
             WHERE o.prompt_id = $1 \
             ORDER BY o.created_at DESC",
        )
        .bind(prompt_id)
        .fetch_all(&pool)
        .await?;

    let outputs: Vec<Value> = rows
        .into_iter()
        .map(|(id, content, output_type, rating, feedback, email, created_at)| {
            json!({
                "id": id,
                "content": content,
                "output_type": output_type,
                "rating": rating,
                "feedback": feedback,
                "user_email": email,
                "created_at": created_at,
            })
        })
        .collect();

    Ok(Json(json!(outputs)))
}

/// GET /api/outputs/prompt/:id/stats - Rating aggregates for a prompt
pub async fn stats(Path(prompt_id): Path<Uuid>) -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let (average_rating, total_outputs): (Option<f64>, i64) = sqlx::query_as(
        "SELECT AVG(rating)::float8, COUNT(*)::bigint \
         FROM prompt_outputs WHERE prompt_id = $1",
    )
    .bind(prompt_id)
    .fetch_one(&pool)
    .await?;

    let distribution_rows: Vec<(i32, i64)> = sqlx::query_as(
        "SELECT rating, COUNT(*)::bigint FROM prompt_outputs \
         WHERE prompt_id = $1 AND rating IS NOT NULL \
         GROUP BY rating ORDER BY rating",
    )
    .bind(prompt_id)
    .fetch_all(&pool)
    .await?;

    let mut rating_distribution = serde_json::Map::new();
    for (rating, count) in distribution_rows {
        rating_distribution.insert(rating.to_string(), json!(count));
    }

    Ok(Json(json!({
        "average_rating": average_rating.map(|avg| (avg * 100.0).round() / 100.0),
        "total_outputs": total_outputs,
        "rating_distribution": rating_distribution,
    })))
}

/// PUT /api/outputs/:id - Creator only
pub async fn update(
    Path(output_id): Path<Uuid>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<OutputUpdateRequest>,
) -> Result<Json<Value>, ApiError> {
    validate::rating(payload.rating)?;
    if let Some(output_type) = &payload.output_type {
        validate::one_of("output_type", output_type, OUTPUT_TYPES)?;
    }

    let pool = DatabaseManager::pool().await?;

    let output: Option<PromptOutput> = sqlx::query_as(
        "SELECT id, prompt_id, user_id, content, output_type, rating, feedback, created_at \
         FROM prompt_outputs WHERE id = $1",
    )
    .bind(output_id)
    .fetch_optional(&pool)
    .await?;
    let output = output.ok_or_else(|| ApiError::not_found("Output not found"))?;

    if output.user_id != auth.user_id {
        return Err(ApiError::forbidden("Can only update your own outputs"));
    }

    sqlx::query(
        "UPDATE prompt_outputs SET \
            content = COALESCE($1, content), \
            output_type = COALESCE($2, output_type), \
            rating = COALESCE($3, rating), \
            feedback = COALESCE($4, feedback) \
         WHERE id = $5",
    )
    .bind(payload.content.as_deref())
    .bind(payload.output_type.as_deref())
    .bind(payload.rating)
    .bind(payload.feedback.as_deref())
    .bind(output_id)
    .execute(&pool)
    .await?;

    Ok(Json(json!({ "message": "Output updated successfully" })))
}

/// DELETE /api/outputs/:id - Creator only
pub async fn delete(
    Path(output_id): Path<Uuid>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let creator_id: Option<Uuid> =
        sqlx::query_scalar("SELECT user_id FROM prompt_outputs WHERE id = $1")
            .bind(output_id)
            .fetch_optional(&pool)
            .await?;
    let creator_id = creator_id.ok_or_else(|| ApiError::not_found("Output not found"))?;

    if creator_id != auth.user_id {
        return Err(ApiError::forbidden("Can only delete your own outputs"));
    }

    sqlx::query("DELETE FROM prompt_outputs WHERE id = $1")
        .bind(output_id)
        .execute(&pool)
        .await?;

    Ok(Json(json!({ "message": "Output deleted successfully" })))
}
