use axum::{extract::Query, response::Json};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::{FromRow, QueryBuilder};
use std::collections::HashMap;
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::Prompt;
use crate::error::ApiError;
use crate::handlers::prompts::{summary, tags_for_prompts};
use crate::middleware::auth::OptionalAuthUser;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Substring match against title, description and content
    pub q: Option<String>,
    pub tag: Option<String>,
    pub min_rating: Option<f64>,
    pub max_price: Option<i64>,
    pub license_type: Option<String>,
    #[serde(default)]
    pub featured: bool,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, FromRow)]
struct PromptStats {
    prompt_id: Uuid,
    average_rating: Option<f64>,
    total_outputs: i64,
}

/// GET /api/search - Filtered prompt search
pub async fn search(Query(query): Query<SearchQuery>) -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;

    let mut builder = QueryBuilder::new(
        "SELECT p.id, p.owner_id, p.title, p.description, p.content, p.price_cents, \
                p.license_type, p.is_active, p.is_featured, p.views, p.downloads, p.created_at \
         FROM prompts p WHERE p.is_active",
    );

    if let Some(q) = query.q.as_deref().filter(|q| !q.trim().is_empty()) {
        let like = format!("%{}%", q.trim());
        builder
            .push(" AND (p.title ILIKE ")
            .push_bind(like.clone())
            .push(" OR p.description ILIKE ")
            .push_bind(like.clone())
            .push(" OR p.content ILIKE ")
            .push_bind(like)
            .push(")");
    }

    if let Some(tag) = query.tag.as_deref() {
        builder
            .push(
                " AND EXISTS (SELECT 1 FROM prompt_tags pt \
                 JOIN tags t ON t.id = pt.tag_id \
                 WHERE pt.prompt_id = p.id AND t.name = ",
            )
            .push_bind(tag.to_string())
            .push(")");
    }

    if let Some(max_price) = query.max_price {
        builder.push(" AND p.price_cents <= ").push_bind(max_price);
    }

    if let Some(license_type) = query.license_type.as_deref() {
        builder
            .push(" AND p.license_type = ")
            .push_bind(license_type.to_string());
    }

    if query.featured {
        builder.push(" AND p.is_featured");
    }

    builder.push(" ORDER BY p.created_at DESC");

    let prompts: Vec<Prompt> = builder.build_query_as().fetch_all(&pool).await?;

    let tags = tags_for_prompts(&pool, &prompts).await?;
    let stats = stats_for_prompts(&pool, &prompts).await?;

    let mut results: Vec<Value> = Vec::with_capacity(prompts.len());
    for prompt in &prompts {
        let (average_rating, total_outputs) = stats
            .get(&prompt.id)
            .map(|s| (s.average_rating, s.total_outputs))
            .unwrap_or((None, 0));

        // min_rating also drops prompts with no ratings yet
        if let Some(min_rating) = query.min_rating {
            match average_rating {
                Some(avg) if avg >= min_rating => {}
                _ => continue,
            }
        }

        let mut entry = summary(prompt, tags.get(&prompt.id));
        entry["average_rating"] =
            json!(average_rating.map(|avg| (avg * 100.0).round() / 100.0));
        entry["total_outputs"] = json!(total_outputs);
        results.push(entry);
    }

    Ok(Json(json!(results)))
}

/// GET /api/search/trending - Ranked by recent output activity, then views
pub async fn trending(Query(query): Query<LimitQuery>) -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let week_ago = Utc::now() - Duration::days(7);
    let limit = query.limit.unwrap_or(10).clamp(1, 50);

    #[derive(Debug, FromRow)]
    struct TrendingRow {
        #[sqlx(flatten)]
        prompt: Prompt,
        recent_outputs: i64,
    }

    let rows: Vec<TrendingRow> = sqlx::query_as(
        "SELECT p.id, p.owner_id, p.title, p.description, p.content, p.price_cents, \
                p.license_type, p.is_active, p.is_featured, p.views, p.downloads, p.created_at, \
                COUNT(o.id)::bigint AS recent_outputs \
         FROM prompts p \
         LEFT JOIN prompt_outputs o ON o.prompt_id = p.id AND o.created_at >= $1 \
         WHERE p.is_active \
         GROUP BY p.id \
         ORDER BY COUNT(o.id) DESC, p.views DESC \
         LIMIT $2",
    )
    .bind(week_ago)
    .bind(limit)
    .fetch_all(&pool)
    .await?;

    let listing: Vec<Value> = rows
        .iter()
        .map(|row| {
            let mut entry = summary(&row.prompt, None);
            entry["recent_outputs"] = json!(row.recent_outputs);
            entry
        })
        .collect();

    Ok(Json(json!(listing)))
}

/// GET /api/search/recommendations - Personalized when authenticated:
/// tag overlap with past purchases, excluding what the user already owns.
/// Anonymous callers get featured prompts; buyers with no history get
/// popular ones.
pub async fn recommendations(
    OptionalAuthUser(auth): OptionalAuthUser,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let limit = query.limit.unwrap_or(6).clamp(1, 50);

    let Some(auth) = auth else {
        let featured: Vec<Prompt> = sqlx::query_as(
            "SELECT id, owner_id, title, description, content, price_cents, license_type, \
                    is_active, is_featured, views, downloads, created_at \
             FROM prompts WHERE is_active AND is_featured \
             ORDER BY views DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&pool)
        .await?;
        return Ok(Json(with_reason(&featured, "Featured")));
    };

    let purchased: Vec<Uuid> =
        sqlx::query_scalar("SELECT prompt_id FROM purchases WHERE user_id = $1")
            .bind(auth.user_id)
            .fetch_all(&pool)
            .await?;

    if purchased.is_empty() {
        let popular: Vec<Prompt> = sqlx::query_as(
            "SELECT id, owner_id, title, description, content, price_cents, license_type, \
                    is_active, is_featured, views, downloads, created_at \
             FROM prompts WHERE is_active \
             ORDER BY views DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&pool)
        .await?;
        return Ok(Json(with_reason(&popular, "Popular")));
    }

    let purchased_tags: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT t.name FROM tags t \
         JOIN prompt_tags pt ON pt.tag_id = t.id \
         WHERE pt.prompt_id = ANY($1)",
    )
    .bind(&purchased)
    .fetch_all(&pool)
    .await?;

    if !purchased_tags.is_empty() {
        let similar: Vec<Prompt> = sqlx::query_as(
            "SELECT DISTINCT p.id, p.owner_id, p.title, p.description, p.content, p.price_cents, \
                    p.license_type, p.is_active, p.is_featured, p.views, p.downloads, p.created_at \
             FROM prompts p \
             JOIN prompt_tags pt ON pt.prompt_id = p.id \
             JOIN tags t ON t.id = pt.tag_id \
             WHERE p.is_active AND t.name = ANY($1) AND NOT (p.id = ANY($2)) \
             ORDER BY p.views DESC LIMIT $3",
        )
        .bind(&purchased_tags)
        .bind(&purchased)
        .bind(limit)
        .fetch_all(&pool)
        .await?;

        if !similar.is_empty() {
            return Ok(Json(with_reason(&similar, "Based on your interests")));
        }
    }

    let popular: Vec<Prompt> = sqlx::query_as(
        "SELECT id, owner_id, title, description, content, price_cents, license_type, \
                is_active, is_featured, views, downloads, created_at \
         FROM prompts WHERE is_active AND NOT (id = ANY($1)) \
         ORDER BY views DESC LIMIT $2",
    )
    .bind(&purchased)
    .bind(limit)
    .fetch_all(&pool)
    .await?;
    Ok(Json(with_reason(&popular, "Popular")))
}

fn with_reason(prompts: &[Prompt], reason: &str) -> Value {
    json!(prompts
        .iter()
        .map(|p| {
            let mut entry = summary(p, None);
            entry["reason"] = json!(reason);
            entry
        })
        .collect::<Vec<_>>())
}

async fn stats_for_prompts(
    pool: &sqlx::PgPool,
    prompts: &[Prompt],
) -> Result<HashMap<Uuid, PromptStats>, ApiError> {
    if prompts.is_empty() {
        return Ok(HashMap::new());
    }
    let ids: Vec<Uuid> = prompts.iter().map(|p| p.id).collect();

    let rows: Vec<PromptStats> = sqlx::query_as(
        "SELECT prompt_id, AVG(rating)::float8 AS average_rating, COUNT(*)::bigint AS total_outputs \
         FROM prompt_outputs WHERE prompt_id = ANY($1) \
         GROUP BY prompt_id",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|s| (s.prompt_id, s)).collect())
}
