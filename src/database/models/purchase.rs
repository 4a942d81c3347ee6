use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One purchase per (user, prompt) pair, enforced by a unique constraint.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Purchase {
    pub id: Uuid,
    pub user_id: Uuid,
    pub prompt_id: Uuid,
    pub payment_id: String,
    pub amount_cents: i64,
    pub created_at: DateTime<Utc>,
}
