use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A prompt listing. `content` is the paid-for text and is only released
/// through the entitlement resolver; list/detail endpoints serve a preview.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Prompt {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub content: String,
    pub price_cents: i64,
    pub license_type: String,
    pub is_active: bool,
    pub is_featured: bool,
    pub views: i64,
    pub downloads: i64,
    pub created_at: DateTime<Utc>,
}

impl Prompt {
    pub fn price_formatted(&self) -> String {
        format!("${:.2}", self.price_cents as f64 / 100.0)
    }

    /// First line of the content, truncated, for public listings.
    pub fn preview(&self) -> String {
        let first_line = self.content.lines().next().unwrap_or_default();
        let mut preview: String = first_line.chars().take(120).collect();
        if first_line.chars().count() > 120 || self.content.lines().count() > 1 {
            preview.push('…');
        }
        preview
    }
}

pub const LICENSE_TYPES: &[&str] = &["personal", "commercial"];

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn prompt_with_content(content: &str) -> Prompt {
        Prompt {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            title: "t".into(),
            description: "d".into(),
            content: content.into(),
            price_cents: 499,
            license_type: "personal".into(),
            is_active: true,
            is_featured: false,
            views: 0,
            downloads: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn price_formatting() {
        assert_eq!(prompt_with_content("x").price_formatted(), "$4.99");
    }

    #[test]
    fn preview_truncates_to_first_line() {
        let p = prompt_with_content("SYSTEM: summarizer\nPROMPT: full body here");
        assert_eq!(p.preview(), "SYSTEM: summarizer…");
        assert!(!p.preview().contains("full body"));
    }
}
