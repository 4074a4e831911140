//! Grocery Storage Layer
//!
//! Provides persistence for products and the reservation ledger.
//!
//! # Architecture
//!
//! - **Repository traits**: Define the storage interface (ports)
//! - **In-memory store**: Fast implementation for testing
//! - **SQLite store**: Production implementation (feature `sqlite`)
//!
//! # Usage
//!
//! ```rust
//! use grocery_store::{ListItemRepository, MemoryStore, ProductRepository};
//! use grocery_domain::{ListId, NewListItem, NewProduct, Price, ProductName};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryStore::new();
//!
//!     let melk = NewProduct::new(
//!         ProductName::new("Melk").unwrap(),
//!         300,
//!         None,
//!         Price::parse("0.95").unwrap(),
//!     );
//!     let melk = ProductRepository::add(&store, &melk).await.unwrap();
//!
//!     // Adding the same pair twice merges into one row
//!     ListItemRepository::add(&store, &NewListItem::new(ListId(1), melk.id, 2)).await.unwrap();
//!     let row = ListItemRepository::add(&store, &NewListItem::new(ListId(1), melk.id, 1))
//!         .await
//!         .unwrap();
//!     assert_eq!(row.amount, 3);
//! }
//! ```

#![warn(clippy::all)]

// Modules
mod error;
mod memory;
mod repository;
#[cfg(feature = "sqlite")]
mod sqlite;

// Re-exports
pub use error::StoreError;
pub use memory::MemoryStore;
pub use repository::{
    IntegrityReport, ListItemRepository, ProductRepository, RepairReport, Store, TransferReceipt,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
