//! Error types for Cageledger
//!
//! Every failure is explicit and rolls back its entire transaction. There are
//! no internal retries; retry policy belongs to the caller.

use thiserror::Error;

/// Result type for Cageledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Cageledger error taxonomy
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// Malformed input, rejected before any transaction opens
    #[error("Invalid input: {field} - {reason}")]
    Validation { field: String, reason: String },

    /// Withdrawal exceeds available funds; no state change
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: i64, available: i64 },

    /// Optimistic-lock mismatch on the cached balance; retriable
    #[error("Balance write conflict for {player} ({currency})")]
    Conflict { player: String, currency: String },

    /// A settlement already exists for this visit
    #[error("Visit {visit} is already settled")]
    AlreadySettled { visit: String },

    /// FIFO allocation could not satisfy a withdrawal that passed its balance
    /// precondition. Indicates a concurrency-control defect; fatal, never
    /// silently retried.
    #[error("Ledger inconsistency: {unallocated} left unallocated for {player} ({currency})")]
    LedgerInconsistency {
        player: String,
        currency: String,
        unallocated: i64,
    },

    /// Amount overflow during arithmetic
    #[error("Amount overflow during arithmetic operation")]
    AmountOverflow,

    /// Division by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Storage layer fault
    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl LedgerError {
    /// Create a validation error
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Check if the caller may re-read and retry the whole operation
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Storage { .. })
    }

    /// Stable error code for API responses and logs
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::Conflict { .. } => "CONFLICT",
            Self::AlreadySettled { .. } => "ALREADY_SETTLED",
            Self::LedgerInconsistency { .. } => "LEDGER_INCONSISTENCY",
            Self::AmountOverflow => "AMOUNT_OVERFLOW",
            Self::DivisionByZero => "DIVISION_BY_ZERO",
            Self::Storage { .. } => "STORAGE_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = LedgerError::InsufficientBalance {
            requested: 100,
            available: 50,
        };
        assert_eq!(err.error_code(), "INSUFFICIENT_BALANCE");
    }

    #[test]
    fn test_retriable_errors() {
        let conflict = LedgerError::Conflict {
            player: "p".to_string(),
            currency: "WEB_COIN".to_string(),
        };
        assert!(conflict.is_retriable());

        let inconsistency = LedgerError::LedgerInconsistency {
            player: "p".to_string(),
            currency: "WEB_COIN".to_string(),
            unallocated: 10,
        };
        assert!(!inconsistency.is_retriable());
    }
}
