//! Reservation rules.
//!
//! Pure functions: given the observed product and ledger row, decide whether
//! an action is allowed and, if so, which [`StockTransfer`] realises it.
//! No I/O happens here; the coordinator supplies the reads and commits the
//! result.

use grocery_domain::{ListId, ListItem, Product, StockTransfer};
use serde::{Deserialize, Serialize};

use crate::error::{ReservationError, ReservationResult};

/// A one-unit change requested by a list owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Put the product on the list, or one more of it
    Add,
    /// One more of a product already on the list
    Increase,
    /// One fewer of a product already on the list
    Decrease,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Add => write!(f, "add"),
            Action::Increase => write!(f, "increase"),
            Action::Decrease => write!(f, "decrease"),
        }
    }
}

impl Action {
    /// Plan the transfer for this action against the observed values.
    ///
    /// # Errors
    /// - `InsufficientStock` when `Add` finds no free unit, or `Increase`
    ///   finds `amount >= stock`
    /// - `NotOnList` when `Increase`/`Decrease` find no row
    /// - `NothingReserved` when `Decrease` finds a row at zero
    pub fn plan(
        self,
        list_id: ListId,
        product: &Product,
        item: Option<&ListItem>,
    ) -> ReservationResult<StockTransfer> {
        let amount = item.map(|i| i.amount).unwrap_or(0);
        let insufficient = || ReservationError::InsufficientStock {
            product_id: product.id,
            stock: product.stock,
            amount,
        };

        match self {
            Action::Add => {
                if !product.in_stock() {
                    return Err(insufficient());
                }
                Ok(StockTransfer::reserve(list_id, product, item)?)
            },
            Action::Increase => {
                let item = item.ok_or(ReservationError::NotOnList {
                    list_id,
                    product_id: product.id,
                })?;
                if item.amount >= product.stock {
                    return Err(insufficient());
                }
                Ok(StockTransfer::reserve(list_id, product, Some(item))?)
            },
            Action::Decrease => {
                let item = item.ok_or(ReservationError::NotOnList {
                    list_id,
                    product_id: product.id,
                })?;
                if item.amount == 0 {
                    return Err(ReservationError::NothingReserved {
                        list_id,
                        product_id: product.id,
                    });
                }
                Ok(StockTransfer::release(product, item)?)
            },
        }
    }
}

/// Products a list can still take: not on the list and with free stock.
///
/// `search` narrows the result to names containing it, ignoring case.
/// A blank search matches everything.
pub fn available_products(
    products: &[Product],
    on_list: &[ListItem],
    search: Option<&str>,
) -> Vec<Product> {
    let search = search.map(str::trim).filter(|s| !s.is_empty());

    products
        .iter()
        .filter(|p| p.in_stock())
        .filter(|p| !on_list.iter().any(|i| i.product_id == p.id))
        .filter(|p| search.map_or(true, |s| p.name.matches(s)))
        .cloned()
        .collect()
}
