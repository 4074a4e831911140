//! Storage layer errors

use thiserror::Error;

/// Errors that can occur in the storage layer
///
/// A missing row is not an error: read, update and delete paths return
/// `Ok(None)` instead.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write would break a uniqueness or reference constraint
    #[error("Constraint violation on {entity}: {detail}")]
    ConstraintViolation {
        /// Type of entity (product, list_item)
        entity: String,
        /// Which constraint and which values
        detail: String,
    },

    /// Values observed before a compare-and-swap write have changed
    #[error("Concurrent modification of {entity} {id}")]
    Conflict {
        /// Type of entity
        entity: String,
        /// Entity ID
        id: String,
    },

    /// The stock/ledger pair would be, or has been, left inconsistent.
    ///
    /// Fatal: callers must reconcile instead of continuing.
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Deserialization error (reading a stored row)
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Domain error passthrough
    #[error("Domain error: {0}")]
    Domain(#[from] grocery_domain::DomainError),
}

impl StoreError {
    /// Create a constraint violation error
    pub fn constraint(entity: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            entity: entity.into(),
            detail: detail.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::Conflict {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Whether the failed operation may succeed after re-reading
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Whether the error must stop the caller rather than be retried or shown
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Integrity(_))
    }
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation()
                    || db_err.is_foreign_key_violation()
                    || db_err.is_check_violation()
                {
                    StoreError::ConstraintViolation {
                        entity: "unknown".to_string(),
                        detail: db_err.message().to_string(),
                    }
                } else {
                    StoreError::Database(db_err.to_string())
                }
            },
            _ => StoreError::Database(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_is_retryable() {
        let err = StoreError::conflict("product", 1);
        assert!(err.is_conflict());
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "Concurrent modification of product 1");
    }

    #[test]
    fn test_integrity_is_fatal() {
        assert!(StoreError::Integrity("partial write".to_string()).is_fatal());
    }

    #[test]
    fn test_constraint_message() {
        let err = StoreError::constraint("product", "name 'Melk' already exists");
        assert_eq!(err.to_string(), "Constraint violation on product: name 'Melk' already exists");
    }
}
