//! Grocery Domain Layer
//!
//! Pure domain logic with zero I/O dependencies.
//! Contains entities, value objects, stock transfers, and the session context.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod context;
#[allow(missing_docs)]
pub mod entities;
#[allow(missing_docs)]
pub mod transfer;
pub mod value_objects;

// Re-export commonly used types
pub use context::{Role, Session};
pub use entities::{ListItem, NewListItem, NewProduct, Product};
pub use transfer::{StockTransfer, TransferKind};
pub use value_objects::{
    stock_from_i64, DomainError, ListId, ListItemId, Price, ProductId, ProductName,
};
