use axum::{
    extract::{Path, Query},
    response::Json,
    Extension,
};
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::FromRow;
use uuid::Uuid;

use crate::config;
use crate::database::manager::DatabaseManager;
use crate::database::models::event::EVENT_TYPES;
use crate::error::ApiError;
use crate::handlers::validate;
use crate::middleware::auth::{AuthUser, OptionalAuthUser};

#[derive(Debug, Deserialize)]
pub struct TrackRequest {
    pub prompt_id: Uuid,
    pub event_type: String,
    pub event_data: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    /// Number of days to analyze
    #[serde(default = "default_days")]
    pub days: i64,
}

fn default_days() -> i64 {
    30
}

/// POST /api/analytics/track - Record an event, anonymously or not
pub async fn track(
    OptionalAuthUser(auth): OptionalAuthUser,
    Json(payload): Json<TrackRequest>,
) -> Result<Json<Value>, ApiError> {
    validate::one_of("event_type", &payload.event_type, EVENT_TYPES)?;

    let pool = DatabaseManager::pool().await?;

    let prompt_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM prompts WHERE id = $1)")
            .bind(payload.prompt_id)
            .fetch_one(&pool)
            .await?;
    if !prompt_exists {
        return Err(ApiError::not_found("Prompt not found"));
    }

    sqlx::query(
        "INSERT INTO analytics_events (prompt_id, user_id, event_type, event_data) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(payload.prompt_id)
    .bind(auth.map(|a| a.user_id))
    .bind(&payload.event_type)
    .bind(payload.event_data)
    .execute(&pool)
    .await?;

    Ok(Json(json!({ "message": "Event tracked successfully" })))
}

/// GET /api/analytics/prompt/:id - Windowed stats for one prompt, owner only
pub async fn prompt_analytics(
    Path(prompt_id): Path<Uuid>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let days = query.days.clamp(1, 365);
    let since = Utc::now() - Duration::days(days);

    let owner_id: Option<Uuid> = sqlx::query_scalar("SELECT owner_id FROM prompts WHERE id = $1")
        .bind(prompt_id)
        .fetch_optional(&pool)
        .await?;
    let owner_id = owner_id.ok_or_else(|| ApiError::not_found("Prompt not found"))?;
    if owner_id != auth.user_id {
        return Err(ApiError::forbidden("Only prompt owner can view analytics"));
    }

    let event_counts: Vec<(String, i64)> = sqlx::query_as(
        "SELECT event_type, COUNT(*)::bigint FROM analytics_events \
         WHERE prompt_id = $1 AND created_at >= $2 \
         GROUP BY event_type",
    )
    .bind(prompt_id)
    .bind(since)
    .fetch_all(&pool)
    .await?;

    let daily_views: Vec<(NaiveDate, i64)> = sqlx::query_as(
        "SELECT created_at::date AS day, COUNT(*)::bigint FROM analytics_events \
         WHERE prompt_id = $1 AND event_type = 'view' AND created_at >= $2 \
         GROUP BY day ORDER BY day",
    )
    .bind(prompt_id)
    .bind(since)
    .fetch_all(&pool)
    .await?;

    let count_of = |event: &str| -> i64 {
        event_counts
            .iter()
            .find(|(event_type, _)| event_type == event)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    };
    let total_views = count_of("view");
    let total_purchases = count_of("purchase");
    let total_outputs = count_of("output");

    let view_to_purchase_rate = if total_views > 0 {
        total_purchases as f64 / total_views as f64 * 100.0
    } else {
        0.0
    };
    let purchase_to_output_rate = if total_purchases > 0 {
        total_outputs as f64 / total_purchases as f64 * 100.0
    } else {
        0.0
    };

    let mut counts = serde_json::Map::new();
    for (event_type, count) in &event_counts {
        counts.insert(event_type.clone(), json!(count));
    }

    Ok(Json(json!({
        "prompt_id": prompt_id,
        "period_days": days,
        "event_counts": counts,
        "daily_views": daily_views
            .iter()
            .map(|(date, count)| json!({"date": date.to_string(), "count": count}))
            .collect::<Vec<_>>(),
        "conversion_metrics": {
            "total_views": total_views,
            "total_purchases": total_purchases,
            "total_outputs": total_outputs,
            "view_to_purchase_rate": (view_to_purchase_rate * 100.0).round() / 100.0,
            "purchase_to_output_rate": (purchase_to_output_rate * 100.0).round() / 100.0,
        },
    })))
}

#[derive(Debug, FromRow)]
struct PromptPerformance {
    id: Uuid,
    title: String,
    price_cents: i64,
    views: i64,
    purchases: i64,
}

/// GET /api/analytics/dashboard - Per-seller overview across own prompts
pub async fn dashboard(
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let days = query.days.clamp(1, 365);
    let since = Utc::now() - Duration::days(days);

    // One aggregated pass instead of a query per prompt
    let mut performance: Vec<PromptPerformance> = sqlx::query_as(
        "SELECT p.id, p.title, p.price_cents, \
                COUNT(a.id) FILTER (WHERE a.event_type = 'view')::bigint AS views, \
                COUNT(a.id) FILTER (WHERE a.event_type = 'purchase')::bigint AS purchases \
         FROM prompts p \
         LEFT JOIN analytics_events a ON a.prompt_id = p.id AND a.created_at >= $2 \
         WHERE p.owner_id = $1 \
         GROUP BY p.id",
    )
    .bind(auth.user_id)
    .bind(since)
    .fetch_all(&pool)
    .await?;

    if performance.is_empty() {
        return Ok(Json(json!({
            "total_prompts": 0,
            "total_views": 0,
            "total_purchases": 0,
            "total_revenue": 0.0,
            "top_performing_prompts": [],
            "recent_activity": [],
        })));
    }

    let seller_share = config::config().payments.seller_share_percent as i64;
    let revenue_cents =
        |p: &PromptPerformance| -> i64 { p.price_cents * p.purchases * seller_share / 100 };

    let total_views: i64 = performance.iter().map(|p| p.views).sum();
    let total_purchases: i64 = performance.iter().map(|p| p.purchases).sum();
    let total_revenue_cents: i64 = performance.iter().map(revenue_cents).sum();
    let total_prompts = performance.len();

    performance.sort_by(|a, b| revenue_cents(b).cmp(&revenue_cents(a)));
    let top_performing: Vec<Value> = performance
        .iter()
        .take(5)
        .map(|p| {
            json!({
                "id": p.id,
                "title": p.title,
                "views": p.views,
                "purchases": p.purchases,
                "revenue": revenue_cents(p) as f64 / 100.0,
            })
        })
        .collect();

    let recent: Vec<(Uuid, String, String, chrono::DateTime<Utc>)> = sqlx::query_as(
        "SELECT a.prompt_id, p.title, a.event_type, a.created_at \
         FROM analytics_events a \
         JOIN prompts p ON p.id = a.prompt_id \
         WHERE p.owner_id = $1 AND a.created_at >= $2 \
         ORDER BY a.created_at DESC LIMIT 10",
    )
    .bind(auth.user_id)
    .bind(since)
    .fetch_all(&pool)
    .await?;

    Ok(Json(json!({
        "total_prompts": total_prompts,
        "total_views": total_views,
        "total_purchases": total_purchases,
        "total_revenue": total_revenue_cents as f64 / 100.0,
        "top_performing_prompts": top_performing,
        "recent_activity": recent
            .iter()
            .map(|(prompt_id, title, event_type, created_at)| json!({
                "prompt_id": prompt_id,
                "prompt_title": title,
                "event_type": event_type,
                "created_at": created_at,
            }))
            .collect::<Vec<_>>(),
    })))
}

/// GET /api/analytics/marketplace - Public marketplace-wide totals
pub async fn marketplace(Query(query): Query<WindowQuery>) -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let days = query.days.clamp(1, 365);
    let since = Utc::now() - Duration::days(days);

    let total_prompts: i64 = sqlx::query_scalar("SELECT COUNT(*)::bigint FROM prompts")
        .fetch_one(&pool)
        .await?;

    let event_counts: Vec<(String, i64)> = sqlx::query_as(
        "SELECT event_type, COUNT(*)::bigint FROM analytics_events \
         WHERE created_at >= $1 GROUP BY event_type",
    )
    .bind(since)
    .fetch_all(&pool)
    .await?;
    let count_of = |event: &str| -> i64 {
        event_counts
            .iter()
            .find(|(event_type, _)| event_type == event)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    };

    let trending: Vec<(String, i64)> = sqlx::query_as(
        "SELECT p.title, COUNT(a.id)::bigint AS views \
         FROM prompts p \
         JOIN analytics_events a ON a.prompt_id = p.id \
         WHERE a.event_type = 'view' AND a.created_at >= $1 \
         GROUP BY p.id, p.title \
         ORDER BY COUNT(a.id) DESC LIMIT 5",
    )
    .bind(since)
    .fetch_all(&pool)
    .await?;

    Ok(Json(json!({
        "period_days": days,
        "total_prompts": total_prompts,
        "total_views": count_of("view"),
        "total_purchases": count_of("purchase"),
        "total_outputs": count_of("output"),
        "trending_prompts": trending
            .iter()
            .map(|(title, views)| json!({"title": title, "views": views}))
            .collect::<Vec<_>>(),
    })))
}
