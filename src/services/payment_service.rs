use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::config;
use crate::database::models::Prompt;

type HmacSha256 = Hmac<Sha256>;

/// Seconds a webhook timestamp may lag before it is rejected.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payments are not configured")]
    NotConfigured,

    #[error("invalid webhook signature")]
    InvalidSignature,

    #[error("invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Hosted checkout session returned by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

/// Webhook event envelope. Only the fields this API consumes are modeled.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    pub object: CheckoutObject,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutObject {
    pub id: String,
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutObject {
    /// Buyer and prompt ids carried through the session metadata.
    pub fn purchase_refs(&self) -> Result<(Uuid, Uuid), PaymentError> {
        let user_id = self
            .metadata
            .get("user_id")
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| PaymentError::InvalidPayload("missing user_id metadata".to_string()))?;
        let prompt_id = self
            .metadata
            .get("prompt_id")
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| {
                PaymentError::InvalidPayload("missing prompt_id metadata".to_string())
            })?;
        Ok((user_id, prompt_id))
    }
}

/// REST client for the payment provider. Constructed only when a secret
/// key is configured; without one the API runs in dev mode and checkout
/// grants purchases directly.
pub struct PaymentClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: Option<String>,
    base_url: String,
}

impl PaymentClient {
    pub fn from_config() -> Option<Self> {
        let payments = &config::config().payments;
        let secret_key = payments.secret_key.clone()?;
        Some(Self {
            http: reqwest::Client::new(),
            secret_key,
            webhook_secret: payments.webhook_secret.clone(),
            base_url: payments.provider_base_url.clone(),
        })
    }

    pub fn new(secret_key: String, webhook_secret: Option<String>, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            webhook_secret,
            base_url,
        }
    }

    /// Create a hosted checkout session for one prompt. The buyer and
    /// prompt ids ride along as metadata and come back in the webhook.
    pub async fn create_checkout_session(
        &self,
        prompt: &Prompt,
        buyer_id: Uuid,
    ) -> Result<CheckoutSession, PaymentError> {
        let payments = &config::config().payments;
        let success_url = format!(
            "{}/success?session_id={{CHECKOUT_SESSION_ID}}&prompt_id={}",
            payments.app_url, prompt.id
        );
        let cancel_url = format!("{}/prompts/{}", payments.app_url, prompt.id);

        let unit_amount = prompt.price_cents.to_string();
        let buyer = buyer_id.to_string();
        let prompt_ref = prompt.id.to_string();

        let params: Vec<(&str, &str)> = vec![
            ("mode", "payment"),
            ("line_items[0][price_data][currency]", &payments.currency),
            ("line_items[0][price_data][product_data][name]", &prompt.title),
            ("line_items[0][price_data][unit_amount]", &unit_amount),
            ("line_items[0][quantity]", "1"),
            ("success_url", &success_url),
            ("cancel_url", &cancel_url),
            ("metadata[user_id]", &buyer),
            ("metadata[prompt_id]", &prompt_ref),
        ];

        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Provider(body));
        }

        Ok(response.json::<CheckoutSession>().await?)
    }

    /// Move funds to a seller's connected payout account.
    pub async fn create_transfer(
        &self,
        amount_cents: i64,
        destination: &str,
    ) -> Result<(), PaymentError> {
        let payments = &config::config().payments;
        let amount = amount_cents.to_string();
        let params: Vec<(&str, &str)> = vec![
            ("amount", &amount),
            ("currency", &payments.currency),
            ("destination", destination),
        ];

        let response = self
            .http
            .post(format!("{}/v1/transfers", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Provider(body));
        }

        Ok(())
    }

    /// Verify the provider's `t=<ts>,v1=<hex>` signature header against the
    /// raw payload: HMAC-SHA256 over `"{t}.{payload}"`, with a timestamp
    /// tolerance window. Returns Ok(false) for a well-formed but wrong
    /// signature, Err for structural problems.
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<bool, PaymentError> {
        let secret = self
            .webhook_secret
            .as_deref()
            .ok_or(PaymentError::NotConfigured)?;

        let mut timestamp: Option<&str> = None;
        let mut signature: Option<&str> = None;
        for part in signature_header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = Some(value),
                Some(("v1", value)) => signature = Some(value),
                _ => {}
            }
        }

        let (timestamp, signature) = match (timestamp, signature) {
            (Some(t), Some(s)) => (t, s),
            _ => return Err(PaymentError::InvalidSignature),
        };

        let ts: i64 = timestamp
            .parse()
            .map_err(|_| PaymentError::InvalidSignature)?;
        let age = chrono::Utc::now().timestamp() - ts;
        if age.abs() > SIGNATURE_TOLERANCE_SECS {
            return Ok(false);
        }

        let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| PaymentError::InvalidSignature)?;
        mac.update(signed_payload.as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());

        Ok(constant_time_eq(expected.as_bytes(), signature.as_bytes()))
    }

    pub fn parse_event(&self, payload: &[u8]) -> Result<WebhookEvent, PaymentError> {
        serde_json::from_slice(payload)
            .map_err(|e| PaymentError::InvalidPayload(e.to_string()))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> PaymentClient {
        PaymentClient::new(
            "sk_test_xxx".to_string(),
            Some("whsec_test123secret456".to_string()),
            "https://api.stripe.com".to_string(),
        )
    }

    fn sign(payload: &[u8], secret: &str, timestamp: &str) -> String {
        let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(signed_payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn current_timestamp() -> String {
        chrono::Utc::now().timestamp().to_string()
    }

    #[test]
    fn valid_signature_accepted() {
        let client = test_client();
        let payload = b"{\"type\":\"checkout.session.completed\"}";
        let timestamp = current_timestamp();
        let signature = sign(payload, "whsec_test123secret456", &timestamp);
        let header = format!("t={},v1={}", timestamp, signature);

        assert!(client.verify_webhook_signature(payload, &header).unwrap());
    }

    #[test]
    fn wrong_secret_rejected() {
        let client = test_client();
        let payload = b"{\"type\":\"checkout.session.completed\"}";
        let timestamp = current_timestamp();
        let signature = sign(payload, "wrong_secret", &timestamp);
        let header = format!("t={},v1={}", timestamp, signature);

        assert!(!client.verify_webhook_signature(payload, &header).unwrap());
    }

    #[test]
    fn modified_payload_rejected() {
        let client = test_client();
        let payload = b"{\"type\":\"checkout.session.completed\"}";
        let timestamp = current_timestamp();
        let signature = sign(payload, "whsec_test123secret456", &timestamp);
        let header = format!("t={},v1={}", timestamp, signature);

        let tampered = b"{\"type\":\"checkout.session.expired\"}";
        assert!(!client.verify_webhook_signature(tampered, &header).unwrap());
    }

    #[test]
    fn stale_timestamp_rejected() {
        let client = test_client();
        let payload = b"{}";
        // 10 minutes ago - beyond the 5-minute tolerance
        let timestamp = (chrono::Utc::now().timestamp() - 600).to_string();
        let signature = sign(payload, "whsec_test123secret456", &timestamp);
        let header = format!("t={},v1={}", timestamp, signature);

        assert!(!client.verify_webhook_signature(payload, &header).unwrap());
    }

    #[test]
    fn malformed_header_is_an_error() {
        let client = test_client();
        assert!(client
            .verify_webhook_signature(b"{}", "no-parts-here")
            .is_err());
    }

    #[test]
    fn event_parsing_extracts_purchase_refs() {
        let client = test_client();
        let user_id = Uuid::new_v4();
        let prompt_id = Uuid::new_v4();
        let payload = serde_json::json!({
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_test_123",
                "amount_total": 499,
                "metadata": { "user_id": user_id, "prompt_id": prompt_id }
            }}
        });

        let event = client.parse_event(payload.to_string().as_bytes()).unwrap();
        assert_eq!(event.event_type, "checkout.session.completed");
        let (u, p) = event.data.object.purchase_refs().unwrap();
        assert_eq!((u, p), (user_id, prompt_id));
        assert_eq!(event.data.object.amount_total, Some(499));
    }

    #[test]
    fn event_without_metadata_is_invalid() {
        let client = test_client();
        let payload = br#"{"type":"checkout.session.completed","data":{"object":{"id":"cs_1"}}}"#;
        let event = client.parse_event(payload).unwrap();
        assert!(event.data.object.purchase_refs().is_err());
    }
}
