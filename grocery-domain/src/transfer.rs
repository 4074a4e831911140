//! Stock transfers between a product's free stock and a ledger row.
//!
//! A transfer records the values observed before the move and the values to
//! write after it. Stores commit a transfer as one unit of work and only if
//! the observed values are still current, which makes it a compare-and-swap
//! over the (product, ledger row) pair.

use serde::{Deserialize, Serialize};

use crate::entities::{ListItem, Product};
use crate::value_objects::{DomainError, ListId, ListItemId, ProductId};

/// Direction of a one-unit move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferKind {
    /// Free stock → list
    Reserve,
    /// List → free stock
    Release,
}

impl std::fmt::Display for TransferKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferKind::Reserve => write!(f, "reserve"),
            TransferKind::Release => write!(f, "release"),
        }
    }
}

/// One unit moving between `Product.stock` and `ListItem.amount`.
///
/// # Invariants
/// - `stock_before + amount_before == stock_after + amount_after`
/// - exactly one unit moves
/// - `item_id == None` only for a reservation that creates the row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTransfer {
    pub list_id: ListId,
    pub product_id: ProductId,
    /// Existing ledger row, or `None` when the row is created by this transfer
    pub item_id: Option<ListItemId>,
    pub stock_before: u32,
    pub stock_after: u32,
    pub amount_before: u32,
    pub amount_after: u32,
}

impl StockTransfer {
    /// Move one free unit of `product` onto `list_id`.
    ///
    /// `item` is the current ledger row for the pair, if there is one.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidTransfer` if the product has no free unit
    /// or the row does not belong to the product.
    pub fn reserve(
        list_id: ListId,
        product: &Product,
        item: Option<&ListItem>,
    ) -> Result<Self, DomainError> {
        if let Some(item) = item {
            check_pair(list_id, product.id, item)?;
        }
        let amount_before = item.map(|i| i.amount).unwrap_or(0);
        let stock_after = product.stock.checked_sub(1).ok_or_else(|| {
            DomainError::InvalidTransfer(format!("product {} has no free stock", product.id))
        })?;
        let amount_after = amount_before.checked_add(1).ok_or_else(|| {
            DomainError::InvalidTransfer(format!("amount overflow for product {}", product.id))
        })?;

        Ok(Self {
            list_id,
            product_id: product.id,
            item_id: item.map(|i| i.id),
            stock_before: product.stock,
            stock_after,
            amount_before,
            amount_after,
        })
    }

    /// Move one reserved unit from `item` back to the product's free stock.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidTransfer` if nothing is reserved or the
    /// row does not belong to the product.
    pub fn release(product: &Product, item: &ListItem) -> Result<Self, DomainError> {
        check_pair(item.list_id, product.id, item)?;
        let amount_after = item.amount.checked_sub(1).ok_or_else(|| {
            DomainError::InvalidTransfer(format!("nothing reserved on ledger row {}", item.id))
        })?;
        let stock_after = product.stock.checked_add(1).ok_or_else(|| {
            DomainError::InvalidTransfer(format!("stock overflow for product {}", product.id))
        })?;

        Ok(Self {
            list_id: item.list_id,
            product_id: product.id,
            item_id: Some(item.id),
            stock_before: product.stock,
            stock_after,
            amount_before: item.amount,
            amount_after,
        })
    }

    /// Direction of this transfer.
    pub fn kind(&self) -> TransferKind {
        if self.amount_after > self.amount_before {
            TransferKind::Reserve
        } else {
            TransferKind::Release
        }
    }

    /// Whether committing this transfer inserts the ledger row.
    pub fn creates_row(&self) -> bool {
        self.item_id.is_none()
    }

    /// Units owned by the product on both sides; unchanged by the transfer.
    pub fn total_units(&self) -> u64 {
        u64::from(self.stock_before) + u64::from(self.amount_before)
    }

    /// Check the conservation and single-unit invariants.
    ///
    /// Stores call this before writing; a failure means the transfer must
    /// not be applied at all.
    pub fn validate(&self) -> Result<(), DomainError> {
        let after = u64::from(self.stock_after) + u64::from(self.amount_after);
        if self.total_units() != after {
            return Err(DomainError::InvalidTransfer(format!(
                "units not conserved: {} before, {} after",
                self.total_units(),
                after
            )));
        }
        if self.amount_before.abs_diff(self.amount_after) != 1 {
            return Err(DomainError::InvalidTransfer(format!(
                "transfer must move exactly one unit, moves {}",
                self.amount_before.abs_diff(self.amount_after)
            )));
        }
        if self.creates_row() && (self.amount_before != 0 || self.kind() != TransferKind::Reserve) {
            return Err(DomainError::InvalidTransfer(
                "only a first reservation may create a ledger row".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_pair(list_id: ListId, product_id: ProductId, item: &ListItem) -> Result<(), DomainError> {
    if item.pair() != (list_id, product_id) {
        return Err(DomainError::InvalidTransfer(format!(
            "ledger row {} belongs to list {} / product {}, not list {} / product {}",
            item.id, item.list_id, item.product_id, list_id, product_id
        )));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
