//! Daemon: Main runtime orchestrator.
//!
//! The Daemon ties together:
//! - Store (in-memory or SQLite)
//! - Reservation Coordinator
//! - API Server (HTTP endpoints)
//!
//! # Lifecycle
//!
//! 1. Load configuration
//! 2. Open the store (SQLite: migrate, collapse duplicate rows, optionally seed)
//! 3. Reconcile: refuse to serve if the ledger audit fails
//! 4. Start API server
//! 5. Graceful shutdown on SIGINT

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use grocery_reservations::ReservationCoordinator;
use grocery_store::{MemoryStore, Store};

use crate::api::{create_router, ApiState};
use crate::config::Config;
use crate::error::{DaemonError, DaemonResult};

// =============================================================================
// Daemon
// =============================================================================

/// The main grocery daemon.
pub struct Daemon<S: Store + 'static> {
    /// Configuration
    config: Config,
    /// Reservation coordinator (owns the store)
    coordinator: Arc<ReservationCoordinator<S>>,
}

impl Daemon<MemoryStore> {
    /// Create a daemon over an empty in-memory store.
    pub fn in_memory(config: Config) -> Self {
        if config.store.seed {
            warn!("Sample data is only seeded into SQLite databases; memory store starts empty");
        }
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }
}

#[cfg(feature = "sqlite")]
impl Daemon<grocery_store::SqliteStore> {
    /// Open (and if configured, seed) the SQLite database.
    pub async fn open_sqlite(config: Config) -> DaemonResult<Self> {
        let pool = grocery_db::connect(&config.store.database_url)
            .await
            .map_err(|e| DaemonError::Database(format!("{:#}", e)))?;

        let store = grocery_store::SqliteStore::open(pool).await?;

        if config.store.seed {
            let summary = grocery_db::seed_sample_data(store.pool())
                .await
                .map_err(|e| DaemonError::Database(format!("{:#}", e)))?;
            info!(
                products = summary.products,
                list_items = summary.list_items,
                "Seed applied"
            );
        }

        Ok(Self::with_store(config, Arc::new(store)))
    }
}

impl<S: Store + 'static> Daemon<S> {
    /// Create a daemon over an already opened store.
    pub fn with_store(config: Config, store: Arc<S>) -> Self {
        let coordinator = Arc::new(
            ReservationCoordinator::new(store)
                .with_max_attempts(config.reservations.max_transfer_attempts),
        );
        Self {
            config,
            coordinator,
        }
    }

    /// Get the reservation coordinator.
    pub fn coordinator(&self) -> &Arc<ReservationCoordinator<S>> {
        &self.coordinator
    }

    /// Run the daemon.
    ///
    /// This method blocks until shutdown is requested (SIGINT).
    pub async fn run(self) -> DaemonResult<()> {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %self.config.environment,
            "Starting grocery daemon"
        );

        // 1. Refuse to serve from an inconsistent ledger
        self.reconcile().await?;

        // 2. Start API server
        let (api_addr, server) = self.start_api_server().await?;
        info!(%api_addr, "API server started");

        // 3. Wait for shutdown
        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!(error = %e, "API server task failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
            }
        }

        info!("Daemon stopped");
        Ok(())
    }

    /// Run the ledger audit.
    pub async fn reconcile(&self) -> DaemonResult<()> {
        let report = self.coordinator.reconcile().await?;
        info!(summary = %report.summary(), "Ledger reconciled");
        Ok(())
    }

    /// Bind and spawn the API server.
    pub async fn start_api_server(&self) -> DaemonResult<(SocketAddr, JoinHandle<()>)> {
        let state = Arc::new(ApiState {
            coordinator: self.coordinator.clone(),
        });

        let router = create_router(state);
        let addr = format!("{}:{}", self.config.api.host, self.config.api.port);

        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            DaemonError::Config(format!("Failed to bind to {}: {}", addr, e))
        })?;

        let local_addr = listener.local_addr().map_err(|e| {
            DaemonError::Config(format!("Failed to get local address: {}", e))
        })?;

        // Spawn the server task
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!(error = %e, "API server error");
            }
        });

        Ok((local_addr, handle))
    }
}

// =============================================================================
// Tests
// =============================================================================
