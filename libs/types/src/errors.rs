//! Error taxonomy
//!
//! The coordinator distinguishes a small, closed set of failure classes.
//! Invariant violations inside the engine are not represented here: those
//! panic rather than surface as recoverable errors.

use crate::ids::OrderId;
use crate::numeric::MAX_PRECISION;
use thiserror::Error;

/// Validation failures for submitted order input. The order is rejected
/// synchronously and never persisted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("quantity must be positive")]
    NonPositiveQuantity,

    #[error("price must be positive")]
    NonPositivePrice,

    #[error("limit order requires a price")]
    MissingPrice,

    #[error("market order must not carry a price")]
    UnexpectedPrice,

    #[error("{field} exceeds {MAX_PRECISION} fractional digits")]
    PrecisionExceeded { field: &'static str },
}

/// Client-facing errors produced by the coordinator.
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("order not found or already terminal: {order_id}")]
    NotFoundOrTerminal { order_id: OrderId },

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ExchangeError {
    /// Whether the error maps to a caller mistake (4xx-equivalent) rather
    /// than a venue fault (5xx-equivalent).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ExchangeError::Validation(_) | ExchangeError::NotFoundOrTerminal { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::PrecisionExceeded { field: "price" };
        assert_eq!(err.to_string(), "price exceeds 8 fractional digits");
    }

    #[test]
    fn test_exchange_error_from_validation() {
        let err: ExchangeError = ValidationError::MissingPrice.into();
        assert!(matches!(err, ExchangeError::Validation(_)));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_storage_error_is_server_fault() {
        let err = ExchangeError::Storage("connection reset".to_string());
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_not_found_display() {
        let id = OrderId::new();
        let err = ExchangeError::NotFoundOrTerminal { order_id: id };
        assert!(err.to_string().contains(&id.to_string()));
    }
}
