//! Transaction ledger types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ledger entry status
///
/// Once `COMPLETED` or `REFUNDED` a transaction is frozen: amounts are
/// never mutated, refunds append a compensating entry instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl TransactionStatus {
    /// Database string representation
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Refunded => "REFUNDED",
        }
    }

    /// Parse the database string representation
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            "REFUNDED" => Some(Self::Refunded),
            _ => None,
        }
    }

    /// Confirmation is only valid from `PENDING`
    pub fn can_confirm(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Refund is only valid from `COMPLETED`
    pub fn can_refund(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Frozen entries reject field edits
    pub fn is_frozen(&self) -> bool {
        matches!(self, Self::Completed | Self::Refunded)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db())
    }
}

/// Kind of money movement a ledger entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Payment,
    DeliveryEarnings,
    Refund,
    EscrowRelease,
    TransferIn,
    TransferOut,
}

impl TransactionType {
    /// Database string representation
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Payment => "PAYMENT",
            Self::DeliveryEarnings => "DELIVERY_EARNINGS",
            Self::Refund => "REFUND",
            Self::EscrowRelease => "ESCROW_RELEASE",
            Self::TransferIn => "TRANSFER_IN",
            Self::TransferOut => "TRANSFER_OUT",
        }
    }

    /// Parse the database string representation
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "PAYMENT" => Some(Self::Payment),
            "DELIVERY_EARNINGS" => Some(Self::DeliveryEarnings),
            "REFUND" => Some(Self::Refund),
            "ESCROW_RELEASE" => Some(Self::EscrowRelease),
            "TRANSFER_IN" => Some(Self::TransferIn),
            "TRANSFER_OUT" => Some(Self::TransferOut),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db())
    }
}

/// How the payer funded the transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    #[default]
    Card,
    BankTransfer,
    Wallet,
    Cash,
}

impl PaymentMethod {
    /// Database string representation
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Card => "CARD",
            Self::BankTransfer => "BANK_TRANSFER",
            Self::Wallet => "WALLET",
            Self::Cash => "CASH",
        }
    }

    /// Parse the database string representation
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "CARD" => Some(Self::Card),
            "BANK_TRANSFER" => Some(Self::BankTransfer),
            "WALLET" => Some(Self::Wallet),
            "CASH" => Some(Self::Cash),
            _ => None,
        }
    }
}

/// Structured transaction metadata
///
/// The known payload shapes are tagged; anything else round-trips through
/// the opaque map so old rows and future writers stay readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionMetadata {
    /// Raw gateway event captured during webhook reconciliation
    GatewayPayload {
        event: String,
        gateway_tx_id: Option<String>,
        payload: Value,
    },
    /// Provenance for a compensating refund entry
    Refund {
        refund_of: String,
        reason: String,
    },
    /// Escape hatch for unrecognized shapes
    #[serde(untagged)]
    Opaque(serde_json::Map<String, Value>),
}

impl TransactionMetadata {
    pub fn gateway(event: impl Into<String>, gateway_tx_id: Option<String>, payload: Value) -> Self {
        Self::GatewayPayload {
            event: event.into(),
            gateway_tx_id,
            payload,
        }
    }

    pub fn refund(refund_of: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Refund {
            refund_of: refund_of.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_db_roundtrip() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Completed,
            TransactionStatus::Failed,
            TransactionStatus::Refunded,
        ] {
            assert_eq!(TransactionStatus::from_db(status.as_db()), Some(status));
        }
        assert_eq!(TransactionStatus::from_db("SETTLED"), None);
    }

    #[test]
    fn test_type_db_roundtrip() {
        for ty in [
            TransactionType::Payment,
            TransactionType::DeliveryEarnings,
            TransactionType::Refund,
            TransactionType::EscrowRelease,
            TransactionType::TransferIn,
            TransactionType::TransferOut,
        ] {
            assert_eq!(TransactionType::from_db(ty.as_db()), Some(ty));
        }
    }

    #[test]
    fn test_confirm_only_from_pending() {
        assert!(TransactionStatus::Pending.can_confirm());
        assert!(!TransactionStatus::Completed.can_confirm());
        assert!(!TransactionStatus::Failed.can_confirm());
        assert!(!TransactionStatus::Refunded.can_confirm());
    }

    #[test]
    fn test_refund_only_from_completed() {
        assert!(TransactionStatus::Completed.can_refund());
        assert!(!TransactionStatus::Pending.can_refund());
        assert!(!TransactionStatus::Failed.can_refund());
        assert!(!TransactionStatus::Refunded.can_refund());
    }

    #[test]
    fn test_frozen_statuses() {
        assert!(TransactionStatus::Completed.is_frozen());
        assert!(TransactionStatus::Refunded.is_frozen());
        assert!(!TransactionStatus::Pending.is_frozen());
        assert!(!TransactionStatus::Failed.is_frozen());
    }

    #[test]
    fn test_metadata_gateway_roundtrip() {
        let meta = TransactionMetadata::gateway(
            "charge.success",
            Some("12345".into()),
            json!({"reference": "TXN_1", "amount": 5000}),
        );
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["kind"], "gateway_payload");
        assert_eq!(json["event"], "charge.success");
        let back: TransactionMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn test_metadata_refund_roundtrip() {
        let meta = TransactionMetadata::refund("TXN_123", "damaged goods");
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["kind"], "refund");
        assert_eq!(json["refund_of"], "TXN_123");
        let back: TransactionMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn test_metadata_opaque_fallback() {
        // Unknown shapes fall through to the opaque map instead of erroring
        let raw = json!({"legacy_field": true, "note": "imported"});
        let meta: TransactionMetadata = serde_json::from_value(raw).unwrap();
        match meta {
            TransactionMetadata::Opaque(map) => {
                assert_eq!(map.get("note").unwrap(), "imported");
            }
            other => panic!("expected opaque metadata, got {other:?}"),
        }
    }
}
