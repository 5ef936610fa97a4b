//! Unified error codes for the Osprey backend
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 4xxx: Order errors
//! - 5xxx: Payment / escrow / ledger errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Required field missing
    RequiredField = 6,
    /// Value out of range
    ValueOutOfRange = 7,

    // ==================== 1xxx: Auth ====================
    /// User is not authenticated
    NotAuthenticated = 1001,
    /// Invalid credentials
    InvalidCredentials = 1002,
    /// Token has expired
    TokenExpired = 1003,
    /// Token is invalid
    TokenInvalid = 1004,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,
    /// Specific role required
    RoleRequired = 2002,
    /// Admin role required
    AdminRequired = 2003,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Operation not valid for the order's current status
    OrderInvalidState = 4002,
    /// Order has not been delivered yet
    OrderNotDelivered = 4003,
    /// Order has already been delivered
    OrderAlreadyDelivered = 4004,
    /// Caller is not assigned to the order
    OrderNotAssigned = 4005,

    // ==================== 5xxx: Payment / Escrow / Ledger ====================
    /// Payment processing failed
    PaymentFailed = 5001,
    /// Escrow not found
    EscrowNotFound = 5002,
    /// Operation not valid for the escrow's current status
    EscrowInvalidState = 5003,
    /// An active escrow already exists for the order
    EscrowAlreadyExists = 5004,
    /// Transaction not found
    TransactionNotFound = 5005,
    /// Operation not valid for the transaction's current status
    TransactionInvalidState = 5006,
    /// Refund amount exceeds original transaction amount
    RefundExceedsAmount = 5007,
    /// Transaction reference already exists
    DuplicateReference = 5008,
    /// Webhook signature verification failed
    WebhookSignatureInvalid = 5009,
    /// Payment gateway call failed
    GatewayError = 5010,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Configuration error
    ConfigError = 9003,
    /// Network error (transient)
    NetworkError = 9004,
    /// Timeout error (transient)
    TimeoutError = 9005,
}

impl ErrorCode {
    /// Get the numeric code value
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the default human-readable message for this error code
    pub fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Success",
            ErrorCode::Unknown => "Unknown error",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::RequiredField => "Required field missing",
            ErrorCode::ValueOutOfRange => "Value out of range",

            // Auth
            ErrorCode::NotAuthenticated => "Authentication required",
            ErrorCode::InvalidCredentials => "Invalid credentials",
            ErrorCode::TokenExpired => "Token has expired",
            ErrorCode::TokenInvalid => "Token is invalid",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::RoleRequired => "Role required for this operation",
            ErrorCode::AdminRequired => "Admin role required",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderInvalidState => "Operation not valid for order status",
            ErrorCode::OrderNotDelivered => "Order has not been delivered",
            ErrorCode::OrderAlreadyDelivered => "Order has already been delivered",
            ErrorCode::OrderNotAssigned => "Caller is not assigned to this order",

            // Payment / Escrow / Ledger
            ErrorCode::PaymentFailed => "Payment processing failed",
            ErrorCode::EscrowNotFound => "Escrow not found",
            ErrorCode::EscrowInvalidState => "Operation not valid for escrow status",
            ErrorCode::EscrowAlreadyExists => "An active escrow already exists for this order",
            ErrorCode::TransactionNotFound => "Transaction not found",
            ErrorCode::TransactionInvalidState => "Operation not valid for transaction status",
            ErrorCode::RefundExceedsAmount => "Refund amount exceeds original amount",
            ErrorCode::DuplicateReference => "Transaction reference already exists",
            ErrorCode::WebhookSignatureInvalid => "Webhook signature verification failed",
            ErrorCode::GatewayError => "Payment gateway call failed",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::NetworkError => "Network error",
            ErrorCode::TimeoutError => "Operation timed out",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error returned when converting an unknown u16 into an [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::RequiredField),
            7 => Ok(ErrorCode::ValueOutOfRange),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1002 => Ok(ErrorCode::InvalidCredentials),
            1003 => Ok(ErrorCode::TokenExpired),
            1004 => Ok(ErrorCode::TokenInvalid),

            // Permission
            2001 => Ok(ErrorCode::PermissionDenied),
            2002 => Ok(ErrorCode::RoleRequired),
            2003 => Ok(ErrorCode::AdminRequired),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::OrderInvalidState),
            4003 => Ok(ErrorCode::OrderNotDelivered),
            4004 => Ok(ErrorCode::OrderAlreadyDelivered),
            4005 => Ok(ErrorCode::OrderNotAssigned),

            // Payment / Escrow / Ledger
            5001 => Ok(ErrorCode::PaymentFailed),
            5002 => Ok(ErrorCode::EscrowNotFound),
            5003 => Ok(ErrorCode::EscrowInvalidState),
            5004 => Ok(ErrorCode::EscrowAlreadyExists),
            5005 => Ok(ErrorCode::TransactionNotFound),
            5006 => Ok(ErrorCode::TransactionInvalidState),
            5007 => Ok(ErrorCode::RefundExceedsAmount),
            5008 => Ok(ErrorCode::DuplicateReference),
            5009 => Ok(ErrorCode::WebhookSignatureInvalid),
            5010 => Ok(ErrorCode::GatewayError),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::ConfigError),
            9004 => Ok(ErrorCode::NetworkError),
            9005 => Ok(ErrorCode::TimeoutError),

            other => Err(InvalidErrorCode(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::NotFound.code(), 3);
        assert_eq!(ErrorCode::NotAuthenticated.code(), 1001);
        assert_eq!(ErrorCode::PermissionDenied.code(), 2001);
        assert_eq!(ErrorCode::OrderNotFound.code(), 4001);
        assert_eq!(ErrorCode::EscrowAlreadyExists.code(), 5004);
        assert_eq!(ErrorCode::WebhookSignatureInvalid.code(), 5009);
        assert_eq!(ErrorCode::InternalError.code(), 9001);
    }

    #[test]
    fn test_try_from_roundtrip() {
        let codes = [
            ErrorCode::Success,
            ErrorCode::ValidationFailed,
            ErrorCode::NotFound,
            ErrorCode::AlreadyExists,
            ErrorCode::NotAuthenticated,
            ErrorCode::TokenExpired,
            ErrorCode::PermissionDenied,
            ErrorCode::AdminRequired,
            ErrorCode::OrderNotFound,
            ErrorCode::OrderInvalidState,
            ErrorCode::OrderNotDelivered,
            ErrorCode::EscrowInvalidState,
            ErrorCode::TransactionInvalidState,
            ErrorCode::RefundExceedsAmount,
            ErrorCode::DuplicateReference,
            ErrorCode::GatewayError,
            ErrorCode::DatabaseError,
        ];
        for code in codes {
            assert_eq!(ErrorCode::try_from(code.code()), Ok(code));
        }
    }

    #[test]
    fn test_try_from_invalid() {
        assert_eq!(ErrorCode::try_from(9999), Err(InvalidErrorCode(9999)));
        assert_eq!(ErrorCode::try_from(1234), Err(InvalidErrorCode(1234)));
    }

    #[test]
    fn test_serialize_as_u16() {
        let json = serde_json::to_string(&ErrorCode::OrderNotFound).unwrap();
        assert_eq!(json, "4001");
        let code: ErrorCode = serde_json::from_str("5004").unwrap();
        assert_eq!(code, ErrorCode::EscrowAlreadyExists);
    }

    #[test]
    fn test_messages_nonempty() {
        assert_eq!(ErrorCode::NotFound.message(), "Resource not found");
        assert_eq!(
            ErrorCode::EscrowAlreadyExists.message(),
            "An active escrow already exists for this order"
        );
    }
}
