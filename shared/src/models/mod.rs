//! Domain status enums and their transition rules
//!
//! Every status enum carries its `as_db()`/`from_db()` string codec and the
//! pure transition rules the server's conditional updates enforce. Keeping
//! the rules here means the state graphs are unit-testable without a
//! database.

mod escrow;
mod order;
mod transaction;
mod user;

pub use escrow::EscrowStatus;
pub use order::OrderStatus;
pub use transaction::{PaymentMethod, TransactionMetadata, TransactionStatus, TransactionType};
pub use user::UserRole;

#[cfg(test)]
mod tests {
    use super::*;

    // The full custody flow, walked through the rule layer: payment webhook
    // confirms the order and opens the escrow, delivery gates the release,
    // and the terminal escrow rejects a late refund.
    #[test]
    fn test_custody_flow_rules() {
        // charge.success applies only to a PENDING payment
        let tx = TransactionStatus::Pending;
        assert!(tx.can_confirm());
        let tx = TransactionStatus::Completed;
        // a redelivered charge.success finds nothing to confirm
        assert!(!tx.can_confirm());

        // the winning apply advances the order and opens custody
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Confirmed));
        let escrow = EscrowStatus::Held;

        // release is blocked until the order is DELIVERED (for non-admins);
        // the delivery path itself must be walkable
        assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Accepted));
        assert!(OrderStatus::Accepted.can_transition_to(OrderStatus::PickedUp));
        assert!(OrderStatus::PickedUp.can_transition_to(OrderStatus::Delivered));

        // payer releases after delivery
        assert!(escrow.can_release());
        let escrow = EscrowStatus::Released;

        // a subsequent refund attempt is invalid — no path back to HELD
        assert!(!escrow.can_refund());
        assert!(!escrow.can_release());
    }

    #[test]
    fn test_failed_charge_cancels_order() {
        assert!(TransactionStatus::Pending.can_confirm());
        // charge.failed on a PENDING payment cancels the PENDING order
        assert!(OrderStatus::Pending.can_cancel());
        // but a FAILED transaction can never be confirmed later
        assert!(!TransactionStatus::Failed.can_confirm());
    }

    #[test]
    fn test_dispute_path_ends_in_refund_only() {
        let escrow = EscrowStatus::Held;
        assert!(escrow.can_dispute());
        let escrow = EscrowStatus::Disputed;
        assert!(!escrow.can_release());
        assert!(escrow.can_refund());
        let escrow = EscrowStatus::Refunded;
        assert!(escrow.is_terminal());
    }
}
