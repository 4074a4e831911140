//! In-memory store implementation
//!
//! Used for testing and development without a database.
//! All tables sit behind one RwLock, so every write (including a two-row
//! stock transfer) happens under a single guard and is released when the
//! guard drops, on every exit path.

use crate::error::StoreError;
use crate::repository::{
    IntegrityReport, ListItemRepository, ProductRepository, RepairReport, Store, TransferReceipt,
};
use async_trait::async_trait;
use grocery_domain::{
    ListId, ListItem, ListItemId, NewListItem, NewProduct, Product, ProductId, ProductName,
    StockTransfer,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

type Pair = (ListId, ProductId);

/// In-memory store for testing
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

struct Tables {
    products: BTreeMap<ProductId, Product>,
    items: BTreeMap<ListItemId, ListItem>,
    /// Uniqueness index over ledger pairs; `None` until installed by repair
    pairs: Option<HashMap<Pair, ListItemId>>,
    next_product_id: i64,
    next_item_id: i64,
}

impl Tables {
    fn empty() -> Self {
        Self {
            products: BTreeMap::new(),
            items: BTreeMap::new(),
            pairs: Some(HashMap::new()),
            next_product_id: 1,
            next_item_id: 1,
        }
    }

    /// Row holding `pair`; without the index, the lowest-id match.
    fn find_pair(&self, pair: Pair) -> Option<ListItemId> {
        match &self.pairs {
            Some(index) => index.get(&pair).copied(),
            None => self.items.values().find(|i| i.pair() == pair).map(|i| i.id),
        }
    }

    fn name_taken(&self, name: &ProductName, except: Option<ProductId>) -> bool {
        self.products
            .values()
            .any(|p| &p.name == name && Some(p.id) != except)
    }

    /// Ledger rows may only point at stored products.
    fn require_product(&self, product_id: ProductId) -> Result<(), StoreError> {
        if self.products.contains_key(&product_id) {
            Ok(())
        } else {
            Err(StoreError::constraint(
                "list_item",
                format!("product {} does not exist", product_id),
            ))
        }
    }

    fn is_referenced(&self, product_id: ProductId) -> bool {
        self.items.values().any(|i| i.product_id == product_id)
    }

    fn insert_item(&mut self, item: NewListItem) -> ListItem {
        let id = ListItemId(self.next_item_id);
        self.next_item_id += 1;
        let stored = item.with_id(id);
        self.items.insert(id, stored);
        if let Some(index) = self.pairs.as_mut() {
            index.insert(stored.pair(), id);
        }
        stored
    }

    fn group_by_pair(&self) -> BTreeMap<Pair, Vec<ListItemId>> {
        let mut groups: BTreeMap<Pair, Vec<ListItemId>> = BTreeMap::new();
        // BTreeMap iteration is by ascending id, so each group starts with its lowest id
        for item in self.items.values() {
            groups.entry(item.pair()).or_default().push(item.id);
        }
        groups
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::empty()),
        }
    }

    /// Load rows as they were written before the (list, product) uniqueness
    /// constraint existed.
    ///
    /// IDs are kept as given. Until [`ListItemRepository::repair_duplicates`]
    /// runs, duplicate pairs are tolerated and upserts merge into the
    /// lowest-id row.
    pub fn with_unrepaired_rows(products: Vec<Product>, items: Vec<ListItem>) -> Self {
        let next_product_id = products.iter().map(|p| p.id.0).max().unwrap_or(0) + 1;
        let next_item_id = items.iter().map(|i| i.id.0).max().unwrap_or(0) + 1;

        Self {
            tables: RwLock::new(Tables {
                products: products.into_iter().map(|p| (p.id, p)).collect(),
                items: items.into_iter().map(|i| (i.id, i)).collect(),
                pairs: None,
                next_product_id,
                next_item_id,
            }),
        }
    }

    /// Get the number of products
    pub fn product_count(&self) -> usize {
        self.tables.read().map(|t| t.products.len()).unwrap_or(0)
    }

    /// Get the number of ledger rows
    pub fn list_item_count(&self) -> usize {
        self.tables.read().map(|t| t.items.len()).unwrap_or(0)
    }

    /// Clear all data (useful for test setup)
    pub fn clear(&self) {
        if let Ok(mut tables) = self.tables.write() {
            *tables = Tables::empty();
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Database("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Database("memory store lock poisoned".to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Product Repository Implementation
// =============================================================================

#[async_trait]
impl ProductRepository for MemoryStore {
    async fn get_all(&self) -> Result<Vec<Product>, StoreError> {
        let tables = self.read()?;
        Ok(tables.products.values().cloned().collect())
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let tables = self.read()?;
        Ok(tables.products.get(&id).cloned())
    }

    async fn add(&self, product: &NewProduct) -> Result<Product, StoreError> {
        let mut tables = self.write()?;
        if tables.name_taken(&product.name, None) {
            return Err(StoreError::constraint(
                "product",
                format!("name '{}' already exists", product.name),
            ));
        }

        let id = ProductId(tables.next_product_id);
        tables.next_product_id += 1;
        let stored = product.clone().with_id(id);
        tables.products.insert(id, stored.clone());

        debug!(product_id = %id, name = %stored.name, stock = stored.stock, "Product added");
        Ok(stored)
    }

    async fn update(&self, product: &Product) -> Result<Option<Product>, StoreError> {
        let mut tables = self.write()?;
        if !tables.products.contains_key(&product.id) {
            return Ok(None);
        }
        if tables.name_taken(&product.name, Some(product.id)) {
            return Err(StoreError::constraint(
                "product",
                format!("name '{}' already exists", product.name),
            ));
        }

        tables.products.insert(product.id, product.clone());
        Ok(Some(product.clone()))
    }

    async fn delete(&self, product: &Product) -> Result<Option<Product>, StoreError> {
        let mut tables = self.write()?;
        if !tables.products.contains_key(&product.id) {
            return Ok(None);
        }
        if tables.is_referenced(product.id) {
            return Err(StoreError::constraint(
                "product",
                format!("product {} is referenced by ledger rows", product.id),
            ));
        }

        Ok(tables.products.remove(&product.id))
    }
}

// =============================================================================
// List Item Repository Implementation
// =============================================================================

#[async_trait]
impl ListItemRepository for MemoryStore {
    async fn get_all(&self) -> Result<Vec<ListItem>, StoreError> {
        let tables = self.read()?;
        Ok(tables.items.values().copied().collect())
    }

    async fn get_all_on_list(&self, list_id: ListId) -> Result<Vec<ListItem>, StoreError> {
        let tables = self.read()?;
        Ok(tables.items.values().filter(|i| i.list_id == list_id).copied().collect())
    }

    async fn get(&self, id: ListItemId) -> Result<Option<ListItem>, StoreError> {
        let tables = self.read()?;
        Ok(tables.items.get(&id).copied())
    }

    async fn find(
        &self,
        list_id: ListId,
        product_id: ProductId,
    ) -> Result<Option<ListItem>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .find_pair((list_id, product_id))
            .and_then(|id| tables.items.get(&id).copied()))
    }

    async fn add(&self, item: &NewListItem) -> Result<ListItem, StoreError> {
        let mut tables = self.write()?;
        tables.require_product(item.product_id)?;

        let Some(existing_id) = tables.find_pair(item.pair()) else {
            let stored = tables.insert_item(*item);
            debug!(item_id = %stored.id, list_id = %item.list_id, product_id = %item.product_id, "Ledger row inserted");
            return Ok(stored);
        };

        let row = tables
            .items
            .get_mut(&existing_id)
            .ok_or_else(|| StoreError::Integrity(format!("index points at missing row {}", existing_id)))?;
        row.amount = row.amount.checked_add(item.amount).ok_or_else(|| {
            StoreError::constraint("list_item", format!("amount overflow on row {}", existing_id))
        })?;

        debug!(item_id = %existing_id, amount = row.amount, "Ledger row merged");
        Ok(*row)
    }

    async fn update(&self, item: &ListItem) -> Result<Option<ListItem>, StoreError> {
        let mut tables = self.write()?;
        let Some(old) = tables.items.get(&item.id).copied() else {
            return Ok(None);
        };
        tables.require_product(item.product_id)?;

        if old.pair() != item.pair() {
            if let Some(index) = tables.pairs.as_mut() {
                if index.contains_key(&item.pair()) {
                    return Err(StoreError::constraint(
                        "list_item",
                        format!(
                            "list {} already holds product {}",
                            item.list_id, item.product_id
                        ),
                    ));
                }
                index.remove(&old.pair());
                index.insert(item.pair(), item.id);
            }
        }

        tables.items.insert(item.id, *item);
        Ok(Some(*item))
    }

    async fn delete(&self, item: &ListItem) -> Result<Option<ListItem>, StoreError> {
        let mut tables = self.write()?;
        let Some(removed) = tables.items.remove(&item.id) else {
            return Ok(None);
        };
        if let Some(index) = tables.pairs.as_mut() {
            if index.get(&removed.pair()) == Some(&removed.id) {
                index.remove(&removed.pair());
            }
        }
        Ok(Some(removed))
    }

    async fn repair_duplicates(&self) -> Result<RepairReport, StoreError> {
        let mut tables = self.write()?;
        let groups = tables.group_by_pair();

        // Compute every merged amount before touching any row
        let mut merges = Vec::new();
        for ids in groups.values().filter(|ids| ids.len() > 1) {
            let total: u64 = ids
                .iter()
                .filter_map(|id| tables.items.get(id))
                .map(|i| u64::from(i.amount))
                .sum();
            let total = u32::try_from(total).map_err(|_| {
                StoreError::constraint("list_item", format!("merged amount {} overflows", total))
            })?;
            merges.push((ids[0], ids[1..].to_vec(), total));
        }

        let mut report = RepairReport::default();
        for (keep, drop, total) in merges {
            if let Some(row) = tables.items.get_mut(&keep) {
                row.amount = total;
            }
            for id in drop {
                tables.items.remove(&id);
                report.removed_rows += 1;
            }
            report.merged_pairs += 1;
        }

        let index = tables.items.values().map(|i| (i.pair(), i.id)).collect();
        tables.pairs = Some(index);

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
impl Store for MemoryStore {
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

        let mut tables = self.write()?;

        // Check both before-values first; nothing is written on mismatch
        match tables.products.get(&transfer.product_id) {
            Some(p) if p.stock == transfer.stock_before => {},
            _ => return Err(StoreError::conflict("product", transfer.product_id)),
        }
        let pair = (transfer.list_id, transfer.product_id);
        match transfer.item_id {
            Some(id) => match tables.items.get(&id) {
                Some(i) if i.pair() == pair && i.amount == transfer.amount_before => {},
                _ => return Err(StoreError::conflict("list_item", id)),
            },
            None => {
                if let Some(existing) = tables.find_pair(pair) {
                    return Err(StoreError::conflict("list_item", existing));
                }
            },
        }

        let item = match transfer.item_id {
            Some(id) => {
                let row = tables
                    .items
                    .get_mut(&id)
                    .ok_or_else(|| StoreError::Integrity(format!("ledger row {} vanished", id)))?;
                row.amount = transfer.amount_after;
                *row
            },
            None => tables.insert_item(NewListItem::new(
                transfer.list_id,
                transfer.product_id,
                transfer.amount_after,
            )),
        };
        let product = tables
            .products
            .get_mut(&transfer.product_id)
            .ok_or_else(|| StoreError::Integrity(format!("product {} vanished", transfer.product_id)))?;
        product.stock = transfer.stock_after;

        Ok(TransferReceipt {
            item,
            product: product.clone(),
        })
    }

    async fn audit(&self) -> Result<IntegrityReport, StoreError> {
        let tables = self.read()?;

        let duplicate_pairs = tables
            .group_by_pair()
            .into_iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(pair, _)| pair)
            .collect();
        let dangling_items = tables
            .items
            .values()
            .filter(|i| !tables.products.contains_key(&i.product_id))
            .map(|i| i.id)
            .collect();

        Ok(IntegrityReport {
            duplicate_pairs,
            dangling_items,
            unique_pairs_enforced: tables.pairs.is_some(),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
