//! Escrow custody state machine

use serde::{Deserialize, Serialize};

/// Escrow custody status
///
/// `RELEASED` and `REFUNDED` are terminal and mutually exclusive; there is
/// no path back to `HELD`, which is what prevents a double payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscrowStatus {
    Held,
    Released,
    Refunded,
    Disputed,
}

impl EscrowStatus {
    /// Database string representation
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Held => "HELD",
            Self::Released => "RELEASED",
            Self::Refunded => "REFUNDED",
            Self::Disputed => "DISPUTED",
        }
    }

    /// Parse the database string representation
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "HELD" => Some(Self::Held),
            "RELEASED" => Some(Self::Released),
            "REFUNDED" => Some(Self::Refunded),
            "DISPUTED" => Some(Self::Disputed),
            _ => None,
        }
    }

    /// Released and refunded escrows admit no further money movement
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Released | Self::Refunded)
    }

    /// Release is only valid while funds are held
    pub fn can_release(&self) -> bool {
        matches!(self, Self::Held)
    }

    /// Refund is valid while held or under dispute
    pub fn can_refund(&self) -> bool {
        matches!(self, Self::Held | Self::Disputed)
    }

    /// A dispute can only be raised while funds are held
    pub fn can_dispute(&self) -> bool {
        matches!(self, Self::Held)
    }
}

impl std::fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use EscrowStatus::*;

    const ALL: [EscrowStatus; 4] = [Held, Released, Refunded, Disputed];

    #[test]
    fn test_db_roundtrip() {
        for status in ALL {
            assert_eq!(EscrowStatus::from_db(status.as_db()), Some(status));
        }
        assert_eq!(EscrowStatus::from_db("held"), None);
        assert_eq!(EscrowStatus::from_db("CLOSED"), None);
    }

    #[test]
    fn test_release_only_from_held() {
        assert!(Held.can_release());
        assert!(!Released.can_release());
        assert!(!Refunded.can_release());
        assert!(!Disputed.can_release());
    }

    #[test]
    fn test_refund_from_held_or_disputed() {
        assert!(Held.can_refund());
        assert!(Disputed.can_refund());
        assert!(!Released.can_refund());
        assert!(!Refunded.can_refund());
    }

    #[test]
    fn test_dispute_only_from_held() {
        assert!(Held.can_dispute());
        assert!(!Disputed.can_dispute());
        assert!(!Released.can_dispute());
        assert!(!Refunded.can_dispute());
    }

    #[test]
    fn test_terminal_states_are_frozen() {
        for status in [Released, Refunded] {
            assert!(status.is_terminal());
            assert!(!status.can_release());
            assert!(!status.can_refund());
            assert!(!status.can_dispute());
        }
        assert!(!Held.is_terminal());
        assert!(!Disputed.is_terminal());
    }
}
