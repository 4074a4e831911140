//! Sample data for development databases.
//!
//! Seeds the demo catalogue and two demo lists.

use sqlx::SqlitePool;
use tracing::info;

use super::Result;

/// (name, stock, shelf_life, price)
const SAMPLE_PRODUCTS: &[(&str, i64, &str, &str)] = &[
    ("Melk", 300, "2025-09-25", "0.95"),
    ("Kaas", 100, "2025-09-30", "7.98"),
    ("Brood", 400, "2025-09-12", "2.19"),
    ("Cornflakes", 0, "2025-12-31", "1.48"),
];

/// (list id, product name, amount)
const SAMPLE_LIST_ITEMS: &[(i64, &str, i64)] = &[
    (1, "Melk", 3),
    (1, "Kaas", 1),
    (1, "Brood", 4),
    (2, "Melk", 2),
    (2, "Kaas", 5),
];

/// Rows written by [`seed_sample_data`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub products: u64,
    pub list_items: u64,
}

/// Seed the sample catalogue and lists.
///
/// Products are keyed by their unique name and list items by their pair, so
/// re-running only fills in what is missing. Runs in one transaction.
pub async fn seed_sample_data(pool: &SqlitePool) -> Result<SeedSummary> {
    let mut tx = pool.begin().await?;
    let mut summary = SeedSummary::default();

    for &(name, stock, shelf_life, price) in SAMPLE_PRODUCTS {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO product (name, stock, shelf_life, price)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(stock)
        .bind(shelf_life)
        .bind(price)
        .execute(&mut *tx)
        .await?;
        summary.products += result.rows_affected();
    }

    for &(list_id, product_name, amount) in SAMPLE_LIST_ITEMS {
        let result = sqlx::query(
            r#"
            INSERT INTO grocery_list_item (grocery_list_id, product_id, amount)
            SELECT ?1, p.id, ?3 FROM product p
            WHERE p.name = ?2
              AND NOT EXISTS (
                  SELECT 1 FROM grocery_list_item i
                  WHERE i.grocery_list_id = ?1 AND i.product_id = p.id
              )
            "#,
        )
        .bind(list_id)
        .bind(product_name)
        .bind(amount)
        .execute(&mut *tx)
        .await?;
        summary.list_items += result.rows_affected();
    }

    tx.commit().await?;

    info!(
        products = summary.products,
        list_items = summary.list_items,
        "Sample data seeded"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connect_in_memory, migrate};

    #[tokio::test]
    async fn test_seed_inserts_catalogue() {
        let pool = connect_in_memory().await.unwrap();
        migrate(&pool).await.unwrap();

        let summary = seed_sample_data(&pool).await.unwrap();

        assert_eq!(summary, SeedSummary { products: 4, list_items: 5 });

        let melk_stock: i64 = sqlx::query_scalar("SELECT stock FROM product WHERE name = 'Melk'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(melk_stock, 300);
    }

    #[tokio::test]
    async fn test_seed_twice_adds_nothing() {
        let pool = connect_in_memory().await.unwrap();
        migrate(&pool).await.unwrap();

        seed_sample_data(&pool).await.unwrap();
        let second = seed_sample_data(&pool).await.unwrap();

        assert_eq!(second, SeedSummary::default());

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM grocery_list_item")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 5);
    }
}
