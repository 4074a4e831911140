//! Test helpers for grocery ledger tests.
//!
//! Provides the sample catalogue, sample lists, and a pre-repair store with
//! duplicate ledger rows. With feature `sqlite`, also migrated in-memory and
//! file-backed databases.

mod helpers;

pub use helpers::{
    legacy_store_with_duplicates, sample_product, sample_products, seed_catalogue,
    seed_sample_lists, seeded_memory_store, Catalogue,
};

use anyhow::Result;

/// Setup a clean in-memory test database by running migrations.
///
/// Every call returns a private database.
#[cfg(feature = "sqlite")]
pub async fn setup_test_db() -> Result<sqlx::SqlitePool> {
    let pool = grocery_db::connect_in_memory().await?;
    grocery_db::migrate(&pool).await?;
    Ok(pool)
}

/// SQLite store over a fresh in-memory database holding the sample catalogue.
#[cfg(feature = "sqlite")]
pub async fn seeded_sqlite_store() -> Result<(grocery_store::SqliteStore, Catalogue)> {
    let pool = setup_test_db().await?;
    let store = grocery_store::SqliteStore::open(pool).await?;
    let catalogue = seed_catalogue(&store).await?;
    Ok((store, catalogue))
}

/// SQLite store over a database file in a fresh temporary directory,
/// holding the sample catalogue.
///
/// Uses the same pool as a deployed daemon (several connections, busy
/// timeout). Keep the returned directory alive for as long as the store.
#[cfg(feature = "sqlite")]
pub async fn seeded_file_sqlite_store(
) -> Result<(grocery_store::SqliteStore, Catalogue, tempfile::TempDir)> {
    let dir = tempfile::tempdir()?;
    let url = format!("sqlite://{}", dir.path().join("grocery.db").display());
    let pool = grocery_db::connect(&url).await?;
    let store = grocery_store::SqliteStore::open(pool).await?;
    let catalogue = seed_catalogue(&store).await?;
    Ok((store, catalogue, dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use grocery_store::{ListItemRepository, Store};

    #[tokio::test]
    async fn test_seeded_memory_store() {
        let (store, catalogue) = seeded_memory_store().await.unwrap();

        assert_eq!(store.product_count(), 4);
        assert_eq!(store.list_item_count(), 5);
        assert_eq!(catalogue.by_name("Kaas").map(|p| p.stock), Some(100));
        assert!(!catalogue.cornflakes.in_stock());
    }

    #[tokio::test]
    async fn test_legacy_store_has_duplicates() {
        let store = legacy_store_with_duplicates();

        let report = store.audit().await.unwrap();
        assert_eq!(report.duplicate_pairs.len(), 1);

        let repaired = store.repair_duplicates().await.unwrap();
        assert_eq!(repaired.removed_rows, 1);
    }
}
