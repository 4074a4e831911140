//! Grocery Daemon Library
//!
//! Runtime host for the grocery ledger.
//!
//! # Architecture
//!
//! ```text
//! HTTP client → API Server → Reservation Coordinator → Store (memory | SQLite)
//! ```
//!
//! # Components
//!
//! - **Daemon**: Opens the store, reconciles the ledger, serves the API
//! - **API**: HTTP endpoints for lists, products, and export
//! - **Export**: Shareable JSON document of one list
//! - **Config**: Environment-based configuration
//! - **db**: `groceryd db <migrate|status|seed>` (feature `sqlite`)
//!
//! # Example
//!
//! ```rust,ignore
//! use groceryd::{Config, Daemon};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("Failed to load config");
//!     let daemon = Daemon::in_memory(config);
//!     daemon.run().await.expect("Daemon error");
//! }
//! ```

#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod daemon;
#[cfg(feature = "sqlite")]
pub mod db;
pub mod error;
pub mod export;

// Re-exports for convenience
pub use config::{ApiConfig, Config, Environment, ReservationConfig, StoreConfig};
pub use daemon::Daemon;
pub use error::{DaemonError, DaemonResult};
pub use export::{ExportLine, ListExport};
