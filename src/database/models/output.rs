use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Example output posted against a prompt by its owner or a purchaser.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PromptOutput {
    pub id: Uuid,
    pub prompt_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub output_type: String,
    pub rating: Option<i32>,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub const OUTPUT_TYPES: &[&str] = &["text", "image"];
