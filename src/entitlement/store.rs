use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::{Prompt, WatermarkRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Persistence seam for the entitlement resolver: point lookups by
/// (prompt, user) plus an atomic insert-if-absent for watermark records.
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    async fn prompt(&self, prompt_id: Uuid) -> Result<Option<Prompt>, StoreError>;

    async fn purchase_exists(&self, user_id: Uuid, prompt_id: Uuid) -> Result<bool, StoreError>;

    async fn find_watermark(
        &self,
        prompt_id: Uuid,
        buyer_id: Uuid,
    ) -> Result<Option<WatermarkRecord>, StoreError>;

    /// Insert a watermark record unless one already exists for the pair.
    /// Always returns the persisted record: the caller's candidate token
    /// when the insert won, the pre-existing record when it lost.
    async fn insert_watermark_if_absent(
        &self,
        prompt_id: Uuid,
        buyer_id: Uuid,
        token: &str,
    ) -> Result<WatermarkRecord, StoreError>;
}

/// Postgres-backed store. The insert-if-absent contract rides on the
/// UNIQUE (prompt_id, buyer_id) constraint: ON CONFLICT DO NOTHING, then
/// reread the winning row when the insert returned nothing.
pub struct PgEntitlementStore {
    pool: PgPool,
}

impl PgEntitlementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntitlementStore for PgEntitlementStore {
    async fn prompt(&self, prompt_id: Uuid) -> Result<Option<Prompt>, StoreError> {
        let prompt = sqlx::query_as(
            "SELECT id, owner_id, title, description, content, price_cents, license_type, \
                    is_active, is_featured, views, downloads, created_at \
             FROM prompts WHERE id = $1",
        )
        .bind(prompt_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(prompt)
    }

    async fn purchase_exists(&self, user_id: Uuid, prompt_id: Uuid) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM purchases WHERE user_id = $1 AND prompt_id = $2)",
        )
        .bind(user_id)
        .bind(prompt_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn find_watermark(
        &self,
        prompt_id: Uuid,
        buyer_id: Uuid,
    ) -> Result<Option<WatermarkRecord>, StoreError> {
        let record = sqlx::query_as(
            "SELECT id, prompt_id, buyer_id, token, created_at \
             FROM watermarks WHERE prompt_id = $1 AND buyer_id = $2",
        )
        .bind(prompt_id)
        .bind(buyer_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn insert_watermark_if_absent(
        &self,
        prompt_id: Uuid,
        buyer_id: Uuid,
        token: &str,
    ) -> Result<WatermarkRecord, StoreError> {
        let inserted: Option<WatermarkRecord> = sqlx::query_as(
            "INSERT INTO watermarks (prompt_id, buyer_id, token) VALUES ($1, $2, $3) \
             ON CONFLICT (prompt_id, buyer_id) DO NOTHING \
             RETURNING id, prompt_id, buyer_id, token, created_at",
        )
        .bind(prompt_id)
        .bind(buyer_id)
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(record) = inserted {
            return Ok(record);
        }

        // Lost the race: a concurrent first read persisted its token first.
        self.find_watermark(prompt_id, buyer_id)
            .await?
            .ok_or_else(|| {
                StoreError::Unavailable("watermark row missing after conflict".to_string())
            })
    }
}
