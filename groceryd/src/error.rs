//! Daemon error types.

use grocery_domain::DomainError;
use grocery_reservations::ReservationError;
use grocery_store::StoreError;
use thiserror::Error;

/// Daemon-level errors.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Domain error (invalid input)
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Reservation error
    #[error("{0}")]
    Reservation(#[from] ReservationError),

    /// Database setup error (connect, migrate, seed)
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DaemonError {
    /// Whether stock and ledger may be inconsistent.
    pub fn is_integrity(&self) -> bool {
        match self {
            DaemonError::Reservation(e) => e.is_integrity(),
            DaemonError::Store(e) => e.is_fatal(),
            _ => false,
        }
    }
}

/// Result type for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;
