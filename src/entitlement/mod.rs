//! Entitlement and watermark resolver.
//!
//! Decides whether a requester may read a prompt's full content (owner /
//! purchaser / neither) and, when content is released to a purchaser,
//! attaches that buyer's watermark token - issued exactly once per
//! (prompt, buyer) pair and replayed verbatim on every later read.

pub mod store;
pub mod watermark;

use thiserror::Error;
use uuid::Uuid;

pub use store::{EntitlementStore, PgEntitlementStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Owner,
    Purchaser,
    Denied,
}

#[derive(Debug, Error)]
pub enum EntitlementError {
    #[error("prompt not found")]
    PromptNotFound,

    #[error("purchase required")]
    PurchaseRequired,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Full content released to an entitled requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContent {
    pub id: Uuid,
    pub content: String,
}

pub struct Entitlements<S> {
    store: S,
}

impl<S: EntitlementStore> Entitlements<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Pure access decision for (prompt, requester). Inactive prompts are
    /// treated as missing. No side effects.
    pub async fn resolve_access(
        &self,
        prompt_id: Uuid,
        requester: Option<Uuid>,
    ) -> Result<AccessDecision, EntitlementError> {
        let prompt = self
            .store
            .prompt(prompt_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or(EntitlementError::PromptNotFound)?;

        let Some(user_id) = requester else {
            return Ok(AccessDecision::Denied);
        };

        if prompt.owner_id == user_id {
            return Ok(AccessDecision::Owner);
        }

        if self.store.purchase_exists(user_id, prompt_id).await? {
            return Ok(AccessDecision::Purchaser);
        }

        Ok(AccessDecision::Denied)
    }

    /// Release content to an entitled requester. Owners get the raw bytes;
    /// purchasers get the content with their watermark appended. First
    /// access by a purchaser persists the watermark record, so this call
    /// is not side-effect-free.
    pub async fn get_content(
        &self,
        prompt_id: Uuid,
        requester: Option<Uuid>,
    ) -> Result<PromptContent, EntitlementError> {
        let prompt = self
            .store
            .prompt(prompt_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or(EntitlementError::PromptNotFound)?;

        if let Some(user_id) = requester {
            if prompt.owner_id == user_id {
                return Ok(PromptContent {
                    id: prompt.id,
                    content: prompt.content,
                });
            }

            if self.store.purchase_exists(user_id, prompt_id).await? {
                // A persistence failure here fails the whole call; content
                // must never go out to a non-owner without its marker.
                let token = self.get_or_create_watermark(prompt_id, user_id).await?;
                return Ok(PromptContent {
                    id: prompt.id,
                    content: watermark::embed(&prompt.content, &token),
                });
            }
        }

        Err(EntitlementError::PurchaseRequired)
    }

    /// Return the buyer's token for this prompt, issuing it on first use.
    /// A buyer that already has a token always gets it back verbatim; a
    /// concurrent first read converges on whichever candidate won the
    /// conditional insert.
    pub async fn get_or_create_watermark(
        &self,
        prompt_id: Uuid,
        buyer_id: Uuid,
    ) -> Result<String, EntitlementError> {
        if let Some(existing) = self.store.find_watermark(prompt_id, buyer_id).await? {
            return Ok(existing.token);
        }

        let candidate = watermark::generate_token(buyer_id);
        let record = self
            .store
            .insert_watermark_if_absent(prompt_id, buyer_id, &candidate)
            .await?;
        Ok(record.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{prompt_fixture, MemoryEntitlementStore};
    use std::sync::Arc;

    fn service() -> Entitlements<MemoryEntitlementStore> {
        Entitlements::new(MemoryEntitlementStore::new())
    }

    #[tokio::test]
    async fn owner_gets_owner_access_and_raw_content() {
        let svc = service();
        let owner = Uuid::new_v4();
        let prompt = prompt_fixture(owner, "SECRET");
        svc.store.add_prompt(prompt.clone());

        let decision = svc.resolve_access(prompt.id, Some(owner)).await.unwrap();
        assert_eq!(decision, AccessDecision::Owner);

        let released = svc.get_content(prompt.id, Some(owner)).await.unwrap();
        assert_eq!(released.content, "SECRET");
        assert_eq!(svc.store.watermark_count(), 0);
    }

    #[tokio::test]
    async fn purchaser_gets_purchaser_access() {
        let svc = service();
        let owner = Uuid::new_v4();
        let buyer = Uuid::new_v4();
        let prompt = prompt_fixture(owner, "SECRET");
        svc.store.add_prompt(prompt.clone());
        svc.store.add_purchase(buyer, prompt.id);

        let decision = svc.resolve_access(prompt.id, Some(buyer)).await.unwrap();
        assert_eq!(decision, AccessDecision::Purchaser);
    }

    #[tokio::test]
    async fn stranger_and_anonymous_are_denied() {
        let svc = service();
        let owner = Uuid::new_v4();
        let prompt = prompt_fixture(owner, "SECRET");
        svc.store.add_prompt(prompt.clone());

        let stranger = Uuid::new_v4();
        assert_eq!(
            svc.resolve_access(prompt.id, Some(stranger)).await.unwrap(),
            AccessDecision::Denied
        );
        assert_eq!(
            svc.resolve_access(prompt.id, None).await.unwrap(),
            AccessDecision::Denied
        );

        let err = svc.get_content(prompt.id, Some(stranger)).await.unwrap_err();
        assert!(matches!(err, EntitlementError::PurchaseRequired));
        let err = svc.get_content(prompt.id, None).await.unwrap_err();
        assert!(matches!(err, EntitlementError::PurchaseRequired));
    }

    #[tokio::test]
    async fn missing_prompt_is_not_found_for_everyone() {
        let svc = service();
        let nobody = Uuid::new_v4();

        let err = svc.resolve_access(Uuid::new_v4(), Some(nobody)).await.unwrap_err();
        assert!(matches!(err, EntitlementError::PromptNotFound));
        let err = svc.get_content(Uuid::new_v4(), None).await.unwrap_err();
        assert!(matches!(err, EntitlementError::PromptNotFound));
    }

    #[tokio::test]
    async fn inactive_prompt_is_not_found_even_for_owner() {
        let svc = service();
        let owner = Uuid::new_v4();
        let mut prompt = prompt_fixture(owner, "SECRET");
        prompt.is_active = false;
        svc.store.add_prompt(prompt.clone());

        let err = svc.resolve_access(prompt.id, Some(owner)).await.unwrap_err();
        assert!(matches!(err, EntitlementError::PromptNotFound));
    }

    #[tokio::test]
    async fn watermark_issuance_is_idempotent() {
        let svc = service();
        let owner = Uuid::new_v4();
        let buyer = Uuid::new_v4();
        let prompt = prompt_fixture(owner, "SECRET");
        svc.store.add_prompt(prompt.clone());
        svc.store.add_purchase(buyer, prompt.id);

        let first = svc.get_or_create_watermark(prompt.id, buyer).await.unwrap();
        let second = svc.get_or_create_watermark(prompt.id, buyer).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(svc.store.watermark_count(), 1);
    }

    #[tokio::test]
    async fn purchaser_content_is_byte_stable_across_reads() {
        let svc = service();
        let owner = Uuid::new_v4();
        let buyer = Uuid::new_v4();
        let prompt = prompt_fixture(owner, "SECRET");
        svc.store.add_prompt(prompt.clone());
        svc.store.add_purchase(buyer, prompt.id);

        let first = svc.get_content(prompt.id, Some(buyer)).await.unwrap();
        let second = svc.get_content(prompt.id, Some(buyer)).await.unwrap();

        assert!(first.content.starts_with("SECRET"));
        assert_ne!(first.content, "SECRET");
        assert_eq!(first.content, second.content);
        assert_eq!(svc.store.watermark_count(), 1);
    }

    #[tokio::test]
    async fn different_buyers_get_different_tokens() {
        let svc = service();
        let owner = Uuid::new_v4();
        let prompt = prompt_fixture(owner, "SECRET");
        svc.store.add_prompt(prompt.clone());

        let buyer_b = Uuid::new_v4();
        let buyer_c = Uuid::new_v4();
        svc.store.add_purchase(buyer_b, prompt.id);
        svc.store.add_purchase(buyer_c, prompt.id);

        let token_b = svc.get_or_create_watermark(prompt.id, buyer_b).await.unwrap();
        let token_c = svc.get_or_create_watermark(prompt.id, buyer_c).await.unwrap();
        assert_ne!(token_b, token_c);
        assert_eq!(svc.store.watermark_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_first_reads_converge_on_one_token() {
        let svc = Arc::new(service());
        let owner = Uuid::new_v4();
        let buyer = Uuid::new_v4();
        let prompt = prompt_fixture(owner, "SECRET");
        svc.store.add_prompt(prompt.clone());
        svc.store.add_purchase(buyer, prompt.id);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let svc = Arc::clone(&svc);
            let prompt_id = prompt.id;
            handles.push(tokio::spawn(async move {
                svc.get_or_create_watermark(prompt_id, buyer).await.unwrap()
            }));
        }

        let tokens: Vec<String> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(svc.store.watermark_count(), 1);
        let winner = &tokens[0];
        assert!(tokens.iter().all(|t| t == winner));
    }

    #[tokio::test]
    async fn persistence_failure_fails_the_whole_read() {
        let svc = service();
        let owner = Uuid::new_v4();
        let buyer = Uuid::new_v4();
        let prompt = prompt_fixture(owner, "SECRET");
        svc.store.add_prompt(prompt.clone());
        svc.store.add_purchase(buyer, prompt.id);
        svc.store.fail_inserts(true);

        // Unwatermarked content must not leak when the record can't be stored
        let err = svc.get_content(prompt.id, Some(buyer)).await.unwrap_err();
        assert!(matches!(err, EntitlementError::Store(_)));

        // Owner reads are unaffected; no watermark write happens for them
        let released = svc.get_content(prompt.id, Some(owner)).await.unwrap();
        assert_eq!(released.content, "SECRET");
    }

    #[tokio::test]
    async fn alpha_scenario_end_to_end() {
        // Prompt "Alpha" owned by A; B purchases; C has nothing.
        let svc = service();
        let user_a = Uuid::new_v4();
        let user_b = Uuid::new_v4();
        let user_c = Uuid::new_v4();
        let alpha = prompt_fixture(user_a, "SECRET");
        svc.store.add_prompt(alpha.clone());
        svc.store.add_purchase(user_b, alpha.id);

        let b_first = svc.get_content(alpha.id, Some(user_b)).await.unwrap();
        assert!(b_first.content.starts_with("SECRET"));
        let token = svc.get_or_create_watermark(alpha.id, user_b).await.unwrap();
        assert_eq!(b_first.content, format!("SECRET\u{200B}{}\u{200B}", token));

        let b_second = svc.get_content(alpha.id, Some(user_b)).await.unwrap();
        assert_eq!(b_first.content, b_second.content);

        let err = svc.get_content(alpha.id, Some(user_c)).await.unwrap_err();
        assert!(matches!(err, EntitlementError::PurchaseRequired));

        let a_read = svc.get_content(alpha.id, Some(user_a)).await.unwrap();
        assert_eq!(a_read.content, "SECRET");
    }
}
