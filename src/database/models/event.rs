use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnalyticsEvent {
    pub id: Uuid,
    pub prompt_id: Uuid,
    pub user_id: Option<Uuid>,
    pub event_type: String,
    pub event_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Event types accepted by the tracking endpoint and recorded internally.
pub const EVENT_TYPES: &[&str] = &["view", "purchase", "output", "rating"];
