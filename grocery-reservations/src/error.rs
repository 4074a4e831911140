//! Reservation layer error types.

use grocery_domain::{ListId, ProductId};
use thiserror::Error;

/// Errors that can occur while moving stock between products and lists.
#[derive(Debug, Error)]
pub enum ReservationError {
    /// Product does not exist
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The list holds no row for the product
    #[error("Product {product_id} is not on list {list_id}")]
    NotOnList {
        /// List the session is working on
        list_id: ListId,
        /// Requested product
        product_id: ProductId,
    },

    /// Not enough free stock for the requested reservation
    #[error("Insufficient stock for product {product_id}: {stock} free, {amount} reserved")]
    InsufficientStock {
        /// Requested product
        product_id: ProductId,
        /// Free stock observed
        stock: u32,
        /// Amount already reserved on the list
        amount: u32,
    },

    /// The row is already at zero
    #[error("Nothing reserved for product {product_id} on list {list_id}")]
    NothingReserved {
        /// List the session is working on
        list_id: ListId,
        /// Requested product
        product_id: ProductId,
    },

    /// Operation requires the admin role
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    /// Concurrent writers kept invalidating the observed values
    #[error("Gave up after {attempts} conflicting attempts")]
    Contention {
        /// Attempts made before giving up
        attempts: u32,
    },

    /// Stock and ledger are inconsistent
    ///
    /// The transfer that detected it has written nothing. Run
    /// [`crate::ReservationCoordinator::reconcile`] before trusting the ledger again.
    #[error("INTEGRITY VIOLATION: {0}")]
    Integrity(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    Invalid(#[from] grocery_domain::DomainError),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] grocery_store::StoreError),
}

impl ReservationError {
    /// Whether this is a defined rejection that left all state unchanged.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::ProductNotFound(_)
                | Self::NotOnList { .. }
                | Self::InsufficientStock { .. }
                | Self::NothingReserved { .. }
                | Self::NotAuthorized(_)
                | Self::Invalid(_)
        )
    }

    /// Whether the error signals a broken stock/ledger invariant.
    pub fn is_integrity(&self) -> bool {
        match self {
            Self::Integrity(_) => true,
            Self::Store(e) => e.is_fatal(),
            _ => false,
        }
    }
}

/// Result type for reservation operations.
pub type ReservationResult<T> = Result<T, ReservationError>;

#[cfg(test)]
mod tests {
    use super::*;
    use grocery_store::StoreError;

    #[test]
    fn test_rejections() {
        let err = ReservationError::InsufficientStock {
            product_id: ProductId(1),
            stock: 3,
            amount: 3,
        };
        assert!(err.is_rejection());
        assert_eq!(err.to_string(), "Insufficient stock for product 1: 3 free, 3 reserved");

        assert!(!ReservationError::Contention { attempts: 8 }.is_rejection());
    }

    #[test]
    fn test_integrity_detection() {
        assert!(ReservationError::Integrity("x".to_string()).is_integrity());
        assert!(ReservationError::from(StoreError::Integrity("x".to_string())).is_integrity());
        assert!(!ReservationError::from(StoreError::conflict("product", 1)).is_integrity());
    }
}
