use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Per-buyer watermark token for a prompt. At most one row per
/// (prompt_id, buyer_id); once written the token is never changed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WatermarkRecord {
    pub id: Uuid,
    pub prompt_id: Uuid,
    pub buyer_id: Uuid,
    pub token: String,
    pub created_at: DateTime<Utc>,
}
