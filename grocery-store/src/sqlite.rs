//! SQLite store.
//!
//! Tables are created by the migrations in `grocery-db`. The (list, product)
//! uniqueness index is installed by [`ListItemRepository::repair_duplicates`],
//! which [`SqliteStore::open`] runs on every start, so databases written
//! before the constraint existed are collapsed first.
//!
//! This module uses dynamic queries (sqlx::query) instead of compile-time
//! checked macros (sqlx::query!) to allow compilation without DATABASE_URL.

use crate::error::StoreError;
use crate::repository::{
    IntegrityReport, ListItemRepository, ProductRepository, RepairReport, Store, TransferReceipt,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use grocery_domain::{
    stock_from_i64, ListId, ListItem, ListItemId, NewListItem, NewProduct, Price, Product,
    ProductId, ProductName, StockTransfer,
};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};

const PRODUCT_COLUMNS: &str = "id, name, stock, shelf_life, price";
const ITEM_COLUMNS: &str = "id, grocery_list_id, product_id, amount";

/// SQLite-backed store
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Migrate the database, collapse duplicate ledger rows, and wrap the pool.
    pub async fn open(pool: SqlitePool) -> Result<Self, StoreError> {
        grocery_db::migrate(&pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {:#}", e)))?;

        let store = Self { pool };
        store.repair_duplicates().await?;
        Ok(store)
    }

    /// Get a reference to the underlying pool (for testing).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// =============================================================================
// Row mapping
// =============================================================================

fn product_from_row(row: &SqliteRow) -> Result<Product, StoreError> {
    let decode = |e: sqlx::Error| StoreError::Deserialization(format!("product row: {}", e));

    let id: i64 = row.try_get("id").map_err(decode)?;
    let name: String = row.try_get("name").map_err(decode)?;
    let stock: i64 = row.try_get("stock").map_err(decode)?;
    let shelf_life: Option<NaiveDate> = row.try_get("shelf_life").map_err(decode)?;
    let price: String = row.try_get("price").map_err(decode)?;

    let invalid = |e: grocery_domain::DomainError| {
        StoreError::Deserialization(format!("product {}: {}", id, e))
    };
    Ok(Product {
        id: ProductId(id),
        name: ProductName::new(name).map_err(invalid)?,
        stock: stock_from_i64(stock).map_err(invalid)?,
        shelf_life,
        price: Price::parse(&price).map_err(invalid)?,
    })
}

fn item_from_row(row: &SqliteRow) -> Result<ListItem, StoreError> {
    let decode = |e: sqlx::Error| StoreError::Deserialization(format!("list item row: {}", e));

    let id: i64 = row.try_get("id").map_err(decode)?;
    let list_id: i64 = row.try_get("grocery_list_id").map_err(decode)?;
    let product_id: i64 = row.try_get("product_id").map_err(decode)?;
    let amount: i64 = row.try_get("amount").map_err(decode)?;

    Ok(ListItem {
        id: ListItemId(id),
        list_id: ListId(list_id),
        product_id: ProductId(product_id),
        amount: u32::try_from(amount).map_err(|_| {
            StoreError::Deserialization(format!("list item {}: amount {} out of range", id, amount))
        })?,
    })
}

/// Attribute a constraint violation to `entity`
fn on_entity(entity: &str, err: sqlx::Error) -> StoreError {
    match StoreError::from(err) {
        StoreError::ConstraintViolation { detail, .. } => StoreError::constraint(entity, detail),
        other => other,
    }
}

// =============================================================================
// Product Repository Implementation
// =============================================================================

#[async_trait]
impl ProductRepository for SqliteStore {
    async fn get_all(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {} FROM product ORDER BY id", PRODUCT_COLUMNS))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(product_from_row).collect()
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM product WHERE id = ?", PRODUCT_COLUMNS))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn add(&self, product: &NewProduct) -> Result<Product, StoreError> {
        let row = sqlx::query(&format!(
            "INSERT INTO product (name, stock, shelf_life, price) VALUES (?, ?, ?, ?) RETURNING {}",
            PRODUCT_COLUMNS
        ))
        .bind(product.name.as_str())
        .bind(i64::from(product.stock))
        .bind(product.shelf_life)
        .bind(product.price.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| on_entity("product", e))?;

        let stored = product_from_row(&row)?;
        debug!(product_id = %stored.id, name = %stored.name, stock = stored.stock, "Product added");
        Ok(stored)
    }

    async fn update(&self, product: &Product) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE product SET name = ?, stock = ?, shelf_life = ?, price = ?
            WHERE id = ?
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(product.name.as_str())
        .bind(i64::from(product.stock))
        .bind(product.shelf_life)
        .bind(product.price.to_string())
        .bind(product.id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| on_entity("product", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    async fn delete(&self, product: &Product) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!(
            "DELETE FROM product WHERE id = ? RETURNING {}",
            PRODUCT_COLUMNS
        ))
        .bind(product.id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| on_entity("product", e))?;

        row.as_ref().map(product_from_row).transpose()
    }
}

// =============================================================================
// List Item Repository Implementation
// =============================================================================

#[async_trait]
impl ListItemRepository for SqliteStore {
    async fn get_all(&self) -> Result<Vec<ListItem>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {} FROM grocery_list_item ORDER BY id", ITEM_COLUMNS))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(item_from_row).collect()
    }

    async fn get_all_on_list(&self, list_id: ListId) -> Result<Vec<ListItem>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM grocery_list_item WHERE grocery_list_id = ? ORDER BY id",
            ITEM_COLUMNS
        ))
        .bind(list_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(item_from_row).collect()
    }

    async fn get(&self, id: ListItemId) -> Result<Option<ListItem>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM grocery_list_item WHERE id = ?", ITEM_COLUMNS))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(item_from_row).transpose()
    }

    async fn find(
        &self,
        list_id: ListId,
        product_id: ProductId,
    ) -> Result<Option<ListItem>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {} FROM grocery_list_item
            WHERE grocery_list_id = ? AND product_id = ?
            ORDER BY id
            LIMIT 1
            "#,
            ITEM_COLUMNS
        ))
        .bind(list_id.0)
        .bind(product_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(item_from_row).transpose()
    }

    async fn add(&self, item: &NewListItem) -> Result<ListItem, StoreError> {
        // One statement: concurrent upserts for the same pair serialize on
        // the unique index and each addition lands exactly once
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO grocery_list_item (grocery_list_id, product_id, amount)
            VALUES (?, ?, ?)
            ON CONFLICT (grocery_list_id, product_id) DO UPDATE
                SET amount = grocery_list_item.amount + excluded.amount
                WHERE grocery_list_item.amount + excluded.amount <= {}
            RETURNING {}
            "#,
            u32::MAX,
            ITEM_COLUMNS
        ))
        .bind(item.list_id.0)
        .bind(item.product_id.0)
        .bind(i64::from(item.amount))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| on_entity("list_item", e))?;

        let row = row.ok_or_else(|| {
            StoreError::constraint(
                "list_item",
                format!("amount overflow for list {} / product {}", item.list_id, item.product_id),
            )
        })?;
        let stored = item_from_row(&row)?;
        debug!(item_id = %stored.id, amount = stored.amount, "Ledger row upserted");
        Ok(stored)
    }

    async fn update(&self, item: &ListItem) -> Result<Option<ListItem>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE grocery_list_item SET grocery_list_id = ?, product_id = ?, amount = ?
            WHERE id = ?
            RETURNING {}
            "#,
            ITEM_COLUMNS
        ))
        .bind(item.list_id.0)
        .bind(item.product_id.0)
        .bind(i64::from(item.amount))
        .bind(item.id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| on_entity("list_item", e))?;

        row.as_ref().map(item_from_row).transpose()
    }

    async fn delete(&self, item: &ListItem) -> Result<Option<ListItem>, StoreError> {
        let row = sqlx::query(&format!(
            "DELETE FROM grocery_list_item WHERE id = ? RETURNING {}",
            ITEM_COLUMNS
        ))
        .bind(item.id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(item_from_row).transpose()
    }

    async fn repair_duplicates(&self) -> Result<RepairReport, StoreError> {
        let mut tx = self.pool.begin().await?;

        let counts = sqlx::query(
            r#"
            SELECT COUNT(*) AS pairs, COALESCE(SUM(n - 1), 0) AS extra
            FROM (
                SELECT COUNT(*) AS n FROM grocery_list_item
                GROUP BY grocery_list_id, product_id
                HAVING COUNT(*) > 1
            )
            "#,
        )
        .fetch_one(&mut *tx)
        .await?;
        let merged_pairs: i64 = counts.try_get("pairs")?;
        let removed_rows: i64 = counts.try_get("extra")?;

        if merged_pairs > 0 {
            sqlx::query(
                r#"
                UPDATE grocery_list_item
                SET amount = (
                    SELECT SUM(d.amount) FROM grocery_list_item d
                    WHERE d.grocery_list_id = grocery_list_item.grocery_list_id
                      AND d.product_id = grocery_list_item.product_id
                )
                WHERE id IN (
                    SELECT MIN(id) FROM grocery_list_item
                    GROUP BY grocery_list_id, product_id
                    HAVING COUNT(*) > 1
                )
                "#,
            )
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                DELETE FROM grocery_list_item
                WHERE id NOT IN (
                    SELECT MIN(id) FROM grocery_list_item
                    GROUP BY grocery_list_id, product_id
                )
                "#,
            )
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS ix_grocery_list_item_pair
            ON grocery_list_item (grocery_list_id, product_id)
            "#,
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let report = RepairReport {
            merged_pairs: merged_pairs as u64,
            removed_rows: removed_rows as u64,
        };
        if !report.is_noop() {
            info!(
                merged_pairs = report.merged_pairs,
                removed_rows = report.removed_rows,
                "Collapsed duplicate ledger rows"
            );
        }
        Ok(report)
    }
}

// =============================================================================
// Store Implementation
// =============================================================================

#[async_trait]
impl Store for SqliteStore {
    fn products(&self) -> &dyn ProductRepository {
        self
    }

    fn list_items(&self) -> &dyn ListItemRepository {
        self
    }

    async fn commit_transfer(&self, transfer: &StockTransfer) -> Result<TransferReceipt, StoreError> {
        transfer
            .validate()
            .map_err(|e| StoreError::Integrity(e.to_string()))?;

        // Dropping `tx` on any early return rolls both writes back
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE product SET stock = ? WHERE id = ? AND stock = ?")
            .bind(i64::from(transfer.stock_after))
            .bind(transfer.product_id.0)
            .bind(i64::from(transfer.stock_before))
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() != 1 {
            return Err(StoreError::conflict("product", transfer.product_id));
        }

        let item_row = match transfer.item_id {
            Some(item_id) => sqlx::query(&format!(
                r#"
                UPDATE grocery_list_item SET amount = ?
                WHERE id = ? AND grocery_list_id = ? AND product_id = ? AND amount = ?
                RETURNING {}
                "#,
                ITEM_COLUMNS
            ))
            .bind(i64::from(transfer.amount_after))
            .bind(item_id.0)
            .bind(transfer.list_id.0)
            .bind(transfer.product_id.0)
            .bind(i64::from(transfer.amount_before))
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::conflict("list_item", item_id))?,
            None => sqlx::query(&format!(
                r#"
                INSERT INTO grocery_list_item (grocery_list_id, product_id, amount)
                VALUES (?, ?, ?)
                RETURNING {}
                "#,
                ITEM_COLUMNS
            ))
            .bind(transfer.list_id.0)
            .bind(transfer.product_id.0)
            .bind(i64::from(transfer.amount_after))
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| match StoreError::from(e) {
                StoreError::ConstraintViolation { .. } => StoreError::conflict(
                    "list_item",
                    format!("{}/{}", transfer.list_id, transfer.product_id),
                ),
                other => other,
            })?,
        };
        let item = item_from_row(&item_row)?;

        let product_row = sqlx::query(&format!("SELECT {} FROM product WHERE id = ?", PRODUCT_COLUMNS))
            .bind(transfer.product_id.0)
            .fetch_one(&mut *tx)
            .await?;
        let product = product_from_row(&product_row)?;

        if product.stock != transfer.stock_after || item.amount != transfer.amount_after {
            return Err(StoreError::Integrity(format!(
                "transfer for product {} read back stock {} / amount {}, expected {} / {}",
                transfer.product_id,
                product.stock,
                item.amount,
                transfer.stock_after,
                transfer.amount_after
            )));
        }

        tx.commit().await?;
        Ok(TransferReceipt { item, product })
    }

    async fn audit(&self) -> Result<IntegrityReport, StoreError> {
        let duplicates = sqlx::query(
            r#"
            SELECT grocery_list_id, product_id FROM grocery_list_item
            GROUP BY grocery_list_id, product_id
            HAVING COUNT(*) > 1
            ORDER BY grocery_list_id, product_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        let duplicate_pairs = duplicates
            .iter()
            .map(|row| {
                let list_id: i64 = row.try_get("grocery_list_id")?;
                let product_id: i64 = row.try_get("product_id")?;
                Ok::<_, sqlx::Error>((ListId(list_id), ProductId(product_id)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let dangling_items: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT i.id FROM grocery_list_item i
            LEFT JOIN product p ON p.id = i.product_id
            WHERE p.id IS NULL
            ORDER BY i.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let index_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'ix_grocery_list_item_pair'",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(IntegrityReport {
            duplicate_pairs,
            dangling_items: dangling_items.into_iter().map(ListItemId).collect(),
            unique_pairs_enforced: index_count == 1,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
