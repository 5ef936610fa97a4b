//! Order lifecycle state machine

use serde::{Deserialize, Serialize};

/// Order delivery lifecycle status
///
/// `PENDING → CONFIRMED → ACCEPTED → PICKED_UP → IN_TRANSIT → DELIVERED`,
/// with `CANCELLED` reachable from any non-terminal state. Acceptance may
/// skip `CONFIRMED` (cash-on-delivery orders have no payment confirmation
/// step), and a courier may report delivery directly from `PICKED_UP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Accepted,
    PickedUp,
    InTransit,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Database string representation
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Accepted => "ACCEPTED",
            Self::PickedUp => "PICKED_UP",
            Self::InTransit => "IN_TRANSIT",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Parse the database string representation
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "CONFIRMED" => Some(Self::Confirmed),
            "ACCEPTED" => Some(Self::Accepted),
            "PICKED_UP" => Some(Self::PickedUp),
            "IN_TRANSIT" => Some(Self::InTransit),
            "DELIVERED" => Some(Self::Delivered),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Statuses from which an order may be accepted
    pub fn can_accept(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    /// Statuses from which an order may be picked up
    pub fn can_pickup(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Statuses from which an order may be delivered
    pub fn can_deliver(&self) -> bool {
        matches!(self, Self::PickedUp | Self::InTransit)
    }

    /// Cancellation is allowed from any non-terminal state
    pub fn can_cancel(&self) -> bool {
        !self.is_terminal()
    }

    /// Full transition predicate for the order state graph
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            // cancel from any non-terminal state
            (from, Cancelled) => !from.is_terminal(),
            // reject puts an accepted order back into the pool
            (Accepted, Pending) => true,
            (Pending, Confirmed) => true,
            (Pending | Confirmed, Accepted) => true,
            (Accepted, PickedUp) => true,
            (PickedUp, InTransit) => true,
            (PickedUp | InTransit, Delivered) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    const ALL: [OrderStatus; 7] = [
        Pending, Confirmed, Accepted, PickedUp, InTransit, Delivered, Cancelled,
    ];

    #[test]
    fn test_db_roundtrip() {
        for status in ALL {
            assert_eq!(OrderStatus::from_db(status.as_db()), Some(status));
        }
        assert_eq!(OrderStatus::from_db("SHIPPED"), None);
        assert_eq!(OrderStatus::from_db(""), None);
    }

    #[test]
    fn test_serde_matches_db_repr() {
        for status in ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_db()));
        }
    }

    #[test]
    fn test_happy_path() {
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Accepted));
        assert!(Accepted.can_transition_to(PickedUp));
        assert!(PickedUp.can_transition_to(InTransit));
        assert!(InTransit.can_transition_to(Delivered));
    }

    #[test]
    fn test_accept_skips_confirmed() {
        assert!(Pending.can_transition_to(Accepted));
    }

    #[test]
    fn test_deliver_from_picked_up() {
        assert!(PickedUp.can_transition_to(Delivered));
    }

    #[test]
    fn test_reject_returns_to_pending() {
        assert!(Accepted.can_transition_to(Pending));
        assert!(!PickedUp.can_transition_to(Pending));
        assert!(!Delivered.can_transition_to(Pending));
    }

    #[test]
    fn test_cancel_from_non_terminal_only() {
        for status in [Pending, Confirmed, Accepted, PickedUp, InTransit] {
            assert!(status.can_cancel(), "{status} should be cancellable");
            assert!(status.can_transition_to(Cancelled));
        }
        assert!(!Delivered.can_cancel());
        assert!(!Delivered.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Cancelled));
    }

    #[test]
    fn test_no_backward_movement() {
        assert!(!Delivered.can_transition_to(PickedUp));
        assert!(!InTransit.can_transition_to(Accepted));
        assert!(!Confirmed.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Confirmed));
    }

    #[test]
    fn test_pickup_requires_accepted() {
        assert!(Accepted.can_pickup());
        for status in [Pending, Confirmed, PickedUp, InTransit, Delivered, Cancelled] {
            assert!(!status.can_pickup(), "{status} should not allow pickup");
        }
    }

    #[test]
    fn test_terminal_states_admit_nothing() {
        for terminal in [Delivered, Cancelled] {
            for next in ALL {
                assert!(
                    !terminal.can_transition_to(next),
                    "{terminal} -> {next} should be rejected"
                );
            }
        }
    }
}
