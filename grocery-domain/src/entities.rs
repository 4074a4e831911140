//! Domain Entities for the grocery ledger
//!
//! Products carry the free stock counter; list items (ledger rows) carry the
//! units of one product reserved on one list.

use crate::value_objects::{
    stock_from_i64, DomainError, ListId, ListItemId, Price, ProductId, ProductName,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Product
// =============================================================================

/// A product in the shared inventory
///
/// `stock` is the number of units that are not reserved on any list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: ProductName,
    pub stock: u32,
    /// Advisory best-before date
    pub shelf_life: Option<NaiveDate>,
    pub price: Price,
}

impl Product {
    /// Check whether at least one free unit remains
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Insert form of a product; the store assigns the id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: ProductName,
    pub stock: u32,
    pub shelf_life: Option<NaiveDate>,
    pub price: Price,
}

impl NewProduct {
    /// Create a new product from validated parts
    pub fn new(name: ProductName, stock: u32, shelf_life: Option<NaiveDate>, price: Price) -> Self {
        Self {
            name,
            stock,
            shelf_life,
            price,
        }
    }

    /// Build a product from raw form input
    ///
    /// Mirrors the admin product form: name is required, stock must be a
    /// non-negative integer, price must lie between 0.00 and 999.99.
    ///
    /// # Errors
    /// Returns the first `DomainError` encountered, in field order
    pub fn from_form(
        name: &str,
        stock: i64,
        shelf_life: Option<NaiveDate>,
        price: Decimal,
    ) -> Result<Self, DomainError> {
        let name = ProductName::new(name)?;
        let stock = stock_from_i64(stock)?;
        let price = Price::new(price)?;
        Ok(Self::new(name, stock, shelf_life, price))
    }

    /// Attach a store-assigned id
    pub fn with_id(self, id: ProductId) -> Product {
        Product {
            id,
            name: self.name,
            stock: self.stock,
            shelf_life: self.shelf_life,
            price: self.price,
        }
    }
}

// =============================================================================
// ListItem
// =============================================================================

/// A ledger row: how many units of one product are reserved on one list
///
/// The pair `(list_id, product_id)` is unique across the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    pub id: ListItemId,
    pub list_id: ListId,
    pub product_id: ProductId,
    pub amount: u32,
}

impl ListItem {
    /// The uniqueness key of this row
    pub fn pair(&self) -> (ListId, ProductId) {
        (self.list_id, self.product_id)
    }
}

/// Insert form of a ledger row, merged into an existing row for the same pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewListItem {
    pub list_id: ListId,
    pub product_id: ProductId,
    pub amount: u32,
}

impl NewListItem {
    pub fn new(list_id: ListId, product_id: ProductId, amount: u32) -> Self {
        Self {
            list_id,
            product_id,
            amount,
        }
    }

    /// The uniqueness key of this row
    pub fn pair(&self) -> (ListId, ProductId) {
        (self.list_id, self.product_id)
    }

    /// Attach a store-assigned id
    pub fn with_id(self, id: ListItemId) -> ListItem {
        ListItem {
            id,
            list_id: self.list_id,
            product_id: self.product_id,
            amount: self.amount,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_product_from_form() {
        let shelf_life = NaiveDate::from_ymd_opt(2025, 9, 25);
        let product = NewProduct::from_form(" Melk ", 300, shelf_life, dec!(0.95)).unwrap();

        assert_eq!(product.name.as_str(), "Melk");
        assert_eq!(product.stock, 300);
        assert_eq!(product.price.as_decimal(), dec!(0.95));
    }

    #[test]
    fn test_new_product_from_form_rejects_missing_name() {
        let result = NewProduct::from_form("", 1, None, dec!(1.00));
        assert!(matches!(result, Err(DomainError::InvalidName(_))));
    }

    #[test]
    fn test_new_product_from_form_rejects_negative_stock() {
        let result = NewProduct::from_form("Kaas", -1, None, dec!(7.98));
        assert!(matches!(result, Err(DomainError::InvalidStock(_))));
    }

    #[test]
    fn test_new_product_from_form_rejects_price_out_of_range() {
        let result = NewProduct::from_form("Kaas", 1, None, dec!(1000));
        assert!(matches!(result, Err(DomainError::InvalidPrice(_))));
    }

    #[test]
    fn test_product_in_stock() {
        let product = NewProduct::from_form("Cornflakes", 0, None, dec!(1.48))
            .unwrap()
            .with_id(ProductId(4));
        assert!(!product.in_stock());
    }

    #[test]
    fn test_list_item_pair() {
        let item = NewListItem::new(ListId(1), ProductId(2), 3).with_id(ListItemId(9));
        assert_eq!(item.pair(), (ListId(1), ProductId(2)));
        assert_eq!(item.amount, 3);
    }
}
