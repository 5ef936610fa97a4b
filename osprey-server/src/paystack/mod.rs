//! Paystack integration via REST API (no SDK dependency)
//!
//! Outbound calls carry a bounded timeout; a timed-out call is a retryable
//! failure and success is never assumed without an explicit response or a
//! later webhook.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha512;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Verify a Paystack webhook signature (HMAC-SHA512 of the raw body,
/// hex-encoded in the `x-paystack-signature` header).
///
/// Comparison is constant-time via `Mac::verify_slice`.
pub fn verify_webhook_signature(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
) -> Result<(), &'static str> {
    if sig_header.is_empty() {
        return Err("Empty signature header");
    }

    let sig_bytes = hex::decode(sig_header.trim()).map_err(|_| "Invalid signature hex")?;

    let mut mac =
        Hmac::<Sha512>::new_from_slice(secret.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(payload);
    mac.verify_slice(&sig_bytes)
        .map_err(|_| "Webhook signature mismatch")?;

    Ok(())
}

/// Webhook event envelope: `{ "event": "...", "data": { ... } }`
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub data: WebhookData,
}

/// Event payload — every field optional, the gateway varies them per event
#[derive(Debug, Default, Deserialize)]
pub struct WebhookData {
    pub reference: Option<String>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub status: Option<String>,
    pub id: Option<serde_json::Value>,
}

impl WebhookData {
    /// Gateway transaction id as a string (the gateway sends it numeric)
    pub fn gateway_tx_id(&self) -> Option<String> {
        match &self.id {
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            _ => None,
        }
    }
}

/// Status of a gateway-side transaction, from the verify endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayTxStatus {
    Success,
    Failed,
    Pending,
}

/// Paystack API client
#[derive(Clone)]
pub struct Gateway {
    client: reqwest::Client,
    secret_key: String,
    base_url: String,
}

impl Gateway {
    pub fn new(secret_key: &str, base_url: &str, timeout_secs: u64) -> Result<Self, BoxError> {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(timeout_secs.min(5)))
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            secret_key: secret_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Verify a transaction's gateway-side status by reference
    pub async fn verify_transaction(&self, reference: &str) -> Result<GatewayTxStatus, BoxError> {
        let url = format!("{}/transaction/verify/{}", self.base_url, reference);
        let resp: serde_json::Value = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await?
            .json()
            .await?;

        match resp["data"]["status"].as_str() {
            Some("success") => Ok(GatewayTxStatus::Success),
            Some("failed") | Some("abandoned") | Some("reversed") => Ok(GatewayTxStatus::Failed),
            Some(_) => Ok(GatewayTxStatus::Pending),
            None => Err(format!("Paystack verify failed: {resp}").into()),
        }
    }

    /// Initiate a balance transfer to a recipient; completion arrives via
    /// the transfer.* webhooks. Returns the gateway transfer code.
    pub async fn initiate_transfer(
        &self,
        recipient: &str,
        amount: i64,
        reference: &str,
        reason: &str,
    ) -> Result<String, BoxError> {
        let url = format!("{}/transfer", self.base_url);
        let body = serde_json::json!({
            "source": "balance",
            "amount": amount,
            "recipient": recipient,
            "reference": reference,
            "reason": reason,
        });
        let resp: serde_json::Value = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        resp["data"]["transfer_code"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| format!("Paystack transfer failed: {resp}").into())
    }

    /// Ask the gateway to refund a charge (full or partial, minor units)
    pub async fn refund_charge(
        &self,
        gateway_ref: &str,
        amount: Option<i64>,
    ) -> Result<(), BoxError> {
        let url = format!("{}/refund", self.base_url);
        let mut body = serde_json::json!({ "transaction": gateway_ref });
        if let Some(a) = amount {
            body["amount"] = serde_json::json!(a);
        }
        let resp: serde_json::Value = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if resp["status"].as_bool() == Some(true) {
            Ok(())
        } else {
            Err(format!("Paystack refund failed: {resp}").into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(payload: &[u8], secret: &str) -> String {
        let mut mac = Hmac::<Sha512>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_signature_accepts_valid() {
        let body = br#"{"event":"charge.success","data":{"reference":"TXN_1"}}"#;
        let sig = sign(body, "sk_test_secret");
        assert!(verify_webhook_signature(body, &sig, "sk_test_secret").is_ok());
    }

    #[test]
    fn test_signature_rejects_tampered_body() {
        let body = br#"{"event":"charge.success","data":{"reference":"TXN_1"}}"#;
        let sig = sign(body, "sk_test_secret");
        let tampered = br#"{"event":"charge.success","data":{"reference":"TXN_2"}}"#;
        assert!(verify_webhook_signature(tampered, &sig, "sk_test_secret").is_err());
    }

    #[test]
    fn test_signature_rejects_wrong_secret() {
        let body = br#"{"event":"charge.success","data":{"reference":"TXN_1"}}"#;
        let sig = sign(body, "sk_test_secret");
        assert!(verify_webhook_signature(body, &sig, "sk_live_other").is_err());
    }

    #[test]
    fn test_signature_rejects_malformed_hex() {
        let body = b"{}";
        assert!(verify_webhook_signature(body, "not-hex!", "secret").is_err());
        assert!(verify_webhook_signature(body, "", "secret").is_err());
    }

    #[test]
    fn test_event_parsing() {
        let raw = r#"{
            "event": "charge.success",
            "data": {
                "id": 302961,
                "reference": "TXN_1700000000000_abc123xyz",
                "amount": 5000,
                "currency": "NGN",
                "status": "success",
                "channel": "card",
                "paid_at": "2024-05-01T10:00:00.000Z"
            }
        }"#;
        let event: WebhookEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.event, "charge.success");
        assert_eq!(
            event.data.reference.as_deref(),
            Some("TXN_1700000000000_abc123xyz")
        );
        assert_eq!(event.data.amount, Some(5000));
        assert_eq!(event.data.gateway_tx_id().as_deref(), Some("302961"));
    }

    #[test]
    fn test_event_parsing_minimal() {
        // transfer events omit most charge fields
        let raw = r#"{"event":"transfer.success","data":{"reference":"TXN_9"}}"#;
        let event: WebhookEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.event, "transfer.success");
        assert_eq!(event.data.amount, None);
        assert_eq!(event.data.gateway_tx_id(), None);
    }

    #[test]
    fn test_event_parsing_string_id() {
        let raw = r#"{"event":"transfer.success","data":{"reference":"TXN_9","id":"TRF_1"}}"#;
        let event: WebhookEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.data.gateway_tx_id().as_deref(), Some("TRF_1"));
    }
}
