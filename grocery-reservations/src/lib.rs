//! Grocery Reservation Layer
//!
//! Keeps product stock and list reservations in lock-step. Every change
//! moves exactly one unit between `Product.stock` and a ledger row, and is
//! committed as a single compare-and-swap [`grocery_domain::StockTransfer`].
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use grocery_domain::{ListId, NewProduct, Session};
//! use grocery_reservations::ReservationCoordinator;
//! use grocery_store::{MemoryStore, ProductRepository};
//! use rust_decimal::Decimal;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(MemoryStore::new());
//!     let melk = NewProduct::from_form("Melk", 300, None, Decimal::new(95, 2)).unwrap();
//!     let melk = ProductRepository::add(store.as_ref(), &melk).await.unwrap();
//!
//!     let coordinator = ReservationCoordinator::new(store);
//!     let session = Session::client(ListId(1));
//!
//!     let transition = coordinator.add_product(&session, melk.id).await.unwrap();
//!     assert_eq!(transition.item.amount, 1);
//!     assert_eq!(transition.product.stock, 299);
//! }
//! ```

#![warn(clippy::all)]

pub mod coordinator;
pub mod error;
pub mod rules;

pub use coordinator::{ListLine, ReservationCoordinator, Transition, DEFAULT_MAX_ATTEMPTS};
pub use error::{ReservationError, ReservationResult};
pub use rules::{available_products, Action};
