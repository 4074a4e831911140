//! Fixture helpers: the sample catalogue and sample lists.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::Result;
use grocery_domain::{
    ListId, ListItem, ListItemId, NewListItem, NewProduct, Price, Product, ProductId, ProductName,
};
use grocery_store::{ListItemRepository, MemoryStore, ProductRepository};

/// The four sample products, as stored.
#[derive(Debug, Clone)]
pub struct Catalogue {
    /// Melk: 300 in stock, 0.95
    pub melk: Product,
    /// Kaas: 100 in stock, 7.98
    pub kaas: Product,
    /// Brood: 400 in stock, 2.19
    pub brood: Product,
    /// Cornflakes: out of stock, 1.48
    pub cornflakes: Product,
}

impl Catalogue {
    /// All products in insertion order.
    pub fn all(&self) -> Vec<&Product> {
        vec![&self.melk, &self.kaas, &self.brood, &self.cornflakes]
    }

    /// Look a product up by its exact name.
    pub fn by_name(&self, name: &str) -> Option<&Product> {
        self.all().into_iter().find(|p| p.name.as_str() == name)
    }
}

/// Build a product insert form from literal fixture values.
///
/// Panics on invalid input; fixtures are expected to be valid.
pub fn sample_product(name: &str, stock: u32, shelf_life: (i32, u32, u32), price: Decimal) -> NewProduct {
    let (year, month, day) = shelf_life;
    NewProduct::new(
        ProductName::new(name).expect("fixture name"),
        stock,
        NaiveDate::from_ymd_opt(year, month, day),
        Price::new(price).expect("fixture price"),
    )
}

/// Melk, Kaas, Brood, Cornflakes.
pub fn sample_products() -> Vec<NewProduct> {
    vec![
        sample_product("Melk", 300, (2025, 9, 25), Decimal::new(95, 2)),
        sample_product("Kaas", 100, (2025, 9, 30), Decimal::new(798, 2)),
        sample_product("Brood", 400, (2025, 9, 12), Decimal::new(219, 2)),
        sample_product("Cornflakes", 0, (2025, 12, 31), Decimal::new(148, 2)),
    ]
}

/// Insert the sample products.
pub async fn seed_catalogue(store: &dyn ProductRepository) -> Result<Catalogue> {
    let mut stored = Vec::new();
    for product in sample_products() {
        stored.push(store.add(&product).await?);
    }

    let mut stored = stored.into_iter();
    let mut next = || stored.next().ok_or_else(|| anyhow::anyhow!("catalogue incomplete"));
    Ok(Catalogue {
        melk: next()?,
        kaas: next()?,
        brood: next()?,
        cornflakes: next()?,
    })
}

/// Insert the two sample lists.
///
/// List 1 holds Melk ×3, Kaas ×1, Brood ×4; list 2 holds Melk ×2, Kaas ×5.
/// Rows are written directly, without moving stock.
pub async fn seed_sample_lists(
    store: &dyn ListItemRepository,
    catalogue: &Catalogue,
) -> Result<Vec<ListItem>> {
    let rows = [
        (ListId(1), catalogue.melk.id, 3),
        (ListId(1), catalogue.kaas.id, 1),
        (ListId(1), catalogue.brood.id, 4),
        (ListId(2), catalogue.melk.id, 2),
        (ListId(2), catalogue.kaas.id, 5),
    ];

    let mut stored = Vec::with_capacity(rows.len());
    for (list_id, product_id, amount) in rows {
        stored.push(store.add(&NewListItem::new(list_id, product_id, amount)).await?);
    }
    Ok(stored)
}

/// Memory store holding the sample catalogue and sample lists.
pub async fn seeded_memory_store() -> Result<(MemoryStore, Catalogue)> {
    let store = MemoryStore::new();
    let catalogue = seed_catalogue(&store).await?;
    seed_sample_lists(&store, &catalogue).await?;
    Ok((store, catalogue))
}

/// Memory store as left by a version without the pair constraint.
///
/// List 1 holds Kaas (product 2) twice: row 1 with amount 2 and row 2 with
/// amount 3. Repair is not run.
pub fn legacy_store_with_duplicates() -> MemoryStore {
    let kaas = sample_product("Kaas", 100, (2025, 9, 30), Decimal::new(798, 2)).with_id(ProductId(2));
    let rows = vec![
        NewListItem::new(ListId(1), ProductId(2), 2).with_id(ListItemId(1)),
        NewListItem::new(ListId(1), ProductId(2), 3).with_id(ListItemId(2)),
    ];
    MemoryStore::with_unrepaired_rows(vec![kaas], rows)
}
