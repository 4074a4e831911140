//! Repository trait definitions (Ports)
//!
//! These traits define the storage interface for the domain.
//! Implementations can be SQLite, in-memory, or mock for testing.

use crate::error::StoreError;
use async_trait::async_trait;
use grocery_domain::{
    ListId, ListItem, ListItemId, NewListItem, NewProduct, Product, ProductId, StockTransfer,
};
use serde::Serialize;

/// Repository for Product entities
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// All products in insertion order
    async fn get_all(&self) -> Result<Vec<Product>, StoreError>;

    /// Find a product by ID
    async fn get(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Insert a product and return it with its assigned ID
    ///
    /// Fails with `ConstraintViolation` if the name is taken.
    async fn add(&self, product: &NewProduct) -> Result<Product, StoreError>;

    /// Overwrite all mutable fields; `None` if the product no longer exists
    async fn update(&self, product: &Product) -> Result<Option<Product>, StoreError>;

    /// Remove a product, returning the value it had; `None` if absent
    ///
    /// Fails with `ConstraintViolation` while a ledger row references it.
    async fn delete(&self, product: &Product) -> Result<Option<Product>, StoreError>;
}

/// Repository for ledger rows
#[async_trait]
pub trait ListItemRepository: Send + Sync {
    /// Full ledger snapshot
    async fn get_all(&self) -> Result<Vec<ListItem>, StoreError>;

    /// Ledger rows of one list
    async fn get_all_on_list(&self, list_id: ListId) -> Result<Vec<ListItem>, StoreError>;

    /// Find a row by ID
    async fn get(&self, id: ListItemId) -> Result<Option<ListItem>, StoreError>;

    /// Find the row for a (list, product) pair
    async fn find(
        &self,
        list_id: ListId,
        product_id: ProductId,
    ) -> Result<Option<ListItem>, StoreError>;

    /// Upsert-merge
    ///
    /// If the pair already has a row, `item.amount` is added to it and the
    /// existing row is returned; otherwise a row is inserted. Atomic with
    /// respect to other ledger writers.
    async fn add(&self, item: &NewListItem) -> Result<ListItem, StoreError>;

    /// Overwrite a row by ID; `None` if it no longer exists
    ///
    /// Fails with `ConstraintViolation` if the row would move onto a pair
    /// that another row already holds.
    async fn update(&self, item: &ListItem) -> Result<Option<ListItem>, StoreError>;

    /// Remove a row, returning the value it had; `None` if absent
    async fn delete(&self, item: &ListItem) -> Result<Option<ListItem>, StoreError>;

    /// Collapse duplicate pairs into their lowest-id row and enforce uniqueness
    ///
    /// Idempotent: with no duplicates present this changes nothing.
    async fn repair_duplicates(&self) -> Result<RepairReport, StoreError>;
}

/// Outcome of [`ListItemRepository::repair_duplicates`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    /// Pairs that had more than one row
    pub merged_pairs: u64,
    /// Rows deleted after their amount was folded into the keeper
    pub removed_rows: u64,
}

impl RepairReport {
    /// True when nothing had to be repaired
    pub fn is_noop(&self) -> bool {
        self.merged_pairs == 0 && self.removed_rows == 0
    }
}

/// Rows written by a committed [`StockTransfer`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    /// Ledger row after the transfer
    pub item: ListItem,
    /// Product after the transfer
    pub product: Product,
}

/// Result of a store-wide consistency audit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    /// Pairs with more than one ledger row
    pub duplicate_pairs: Vec<(ListId, ProductId)>,
    /// Ledger rows whose product does not exist
    pub dangling_items: Vec<ListItemId>,
    /// Whether the (list, product) uniqueness constraint is installed
    pub unique_pairs_enforced: bool,
}

impl IntegrityReport {
    /// True when the audit found nothing to reconcile
    pub fn is_clean(&self) -> bool {
        self.duplicate_pairs.is_empty() && self.dangling_items.is_empty() && self.unique_pairs_enforced
    }

    /// One-line description of the findings
    pub fn summary(&self) -> String {
        format!(
            "{} duplicate pair(s), {} dangling row(s), uniqueness {}",
            self.duplicate_pairs.len(),
            self.dangling_items.len(),
            if self.unique_pairs_enforced { "enforced" } else { "missing" }
        )
    }
}

/// Combined store interface
#[async_trait]
pub trait Store: Send + Sync {
    /// Get product repository
    fn products(&self) -> &dyn ProductRepository;

    /// Get ledger repository
    fn list_items(&self) -> &dyn ListItemRepository;

    /// Apply a stock transfer: product row and ledger row, both or neither
    ///
    /// The transfer's before-values are checked inside the same unit of
    /// work. If either no longer matches, nothing is written and
    /// `StoreError::Conflict` is returned. A transfer that does not conserve
    /// units is refused with `StoreError::Integrity`.
    async fn commit_transfer(&self, transfer: &StockTransfer) -> Result<TransferReceipt, StoreError>;

    /// Check ledger invariants across the whole store
    async fn audit(&self) -> Result<IntegrityReport, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repair_report_noop() {
        assert!(RepairReport::default().is_noop());
        assert!(!RepairReport { merged_pairs: 1, removed_rows: 1 }.is_noop());
    }

    #[test]
    fn test_integrity_report_clean() {
        let report = IntegrityReport {
            unique_pairs_enforced: true,
            ..Default::default()
        };
        assert!(report.is_clean());
        assert_eq!(report.summary(), "0 duplicate pair(s), 0 dangling row(s), uniqueness enforced");

        let dirty = IntegrityReport {
            duplicate_pairs: vec![(ListId(1), ProductId(2))],
            unique_pairs_enforced: true,
            ..Default::default()
        };
        assert!(!dirty.is_clean());
    }
}
