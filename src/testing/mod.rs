//! Test doubles and fixtures for the entitlement resolver.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::database::models::{Prompt, WatermarkRecord};
use crate::entitlement::{EntitlementStore, StoreError};

/// In-memory record store with the same insert-if-absent contract as the
/// Postgres store, plus failure injection for persistence-error paths.
pub struct MemoryEntitlementStore {
    prompts: Mutex<HashMap<Uuid, Prompt>>,
    purchases: Mutex<HashSet<(Uuid, Uuid)>>,
    watermarks: Mutex<HashMap<(Uuid, Uuid), WatermarkRecord>>,
    fail_inserts: AtomicBool,
}

impl MemoryEntitlementStore {
    pub fn new() -> Self {
        Self {
            prompts: Mutex::new(HashMap::new()),
            purchases: Mutex::new(HashSet::new()),
            watermarks: Mutex::new(HashMap::new()),
            fail_inserts: AtomicBool::new(false),
        }
    }

    pub fn add_prompt(&self, prompt: Prompt) {
        self.prompts.lock().unwrap().insert(prompt.id, prompt);
    }

    pub fn add_purchase(&self, user_id: Uuid, prompt_id: Uuid) {
        self.purchases.lock().unwrap().insert((user_id, prompt_id));
    }

    pub fn watermark_count(&self) -> usize {
        self.watermarks.lock().unwrap().len()
    }

    /// Make subsequent watermark inserts fail with a store error.
    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }
}

impl Default for MemoryEntitlementStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntitlementStore for MemoryEntitlementStore {
    async fn prompt(&self, prompt_id: Uuid) -> Result<Option<Prompt>, StoreError> {
        Ok(self.prompts.lock().unwrap().get(&prompt_id).cloned())
    }

    async fn purchase_exists(&self, user_id: Uuid, prompt_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.purchases.lock().unwrap().contains(&(user_id, prompt_id)))
    }

    async fn find_watermark(
        &self,
        prompt_id: Uuid,
        buyer_id: Uuid,
    ) -> Result<Option<WatermarkRecord>, StoreError> {
        Ok(self
            .watermarks
            .lock()
            .unwrap()
            .get(&(prompt_id, buyer_id))
            .cloned())
    }

    async fn insert_watermark_if_absent(
        &self,
        prompt_id: Uuid,
        buyer_id: Uuid,
        token: &str,
    ) -> Result<WatermarkRecord, StoreError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected insert failure".to_string()));
        }

        let mut watermarks = self.watermarks.lock().unwrap();
        let record = watermarks
            .entry((prompt_id, buyer_id))
            .or_insert_with(|| WatermarkRecord {
                id: Uuid::new_v4(),
                prompt_id,
                buyer_id,
                token: token.to_string(),
                created_at: Utc::now(),
            });
        Ok(record.clone())
    }
}

/// An active prompt owned by `owner_id` with the given content.
pub fn prompt_fixture(owner_id: Uuid, content: &str) -> Prompt {
    Prompt {
        id: Uuid::new_v4(),
        owner_id,
        title: "Alpha".to_string(),
        description: "Test prompt".to_string(),
        content: content.to_string(),
        price_cents: 499,
        license_type: "personal".to_string(),
        is_active: true,
        is_featured: false,
        views: 0,
        downloads: 0,
        created_at: Utc::now(),
    }
}
