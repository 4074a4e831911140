//! Reservation Coordinator: moves units between product stock and list rows.
//!
//! Every transition follows the same compare-and-swap cycle:
//!
//! ```text
//! read product + row → Action::plan → StockTransfer → Store::commit_transfer
//!        ↑                                                  │
//!        └──────────── Conflict (values changed) ───────────┘
//! ```
//!
//! A conflict means another writer got there first; the cycle re-reads and
//! tries again, up to `max_attempts` times.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use grocery_domain::{ListItem, NewProduct, Product, ProductId, Session};
use grocery_store::{IntegrityReport, Store, StoreError};

use crate::error::{ReservationError, ReservationResult};
use crate::rules::{available_products, Action};

/// Attempts per transition before giving up with `Contention`.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;

// =============================================================================
// Results
// =============================================================================

/// Outcome of a successful add/increase/decrease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    /// Ledger row after the change
    pub item: ListItem,
    /// Product after the change
    pub product: Product,
    /// Products the list can still take, re-derived after the change
    pub available: Vec<Product>,
}

/// A ledger row joined with its product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListLine {
    pub item: ListItem,
    pub product: Product,
}

impl ListLine {
    /// Price times reserved amount.
    pub fn subtotal(&self) -> Decimal {
        self.product.price.as_decimal() * Decimal::from(self.item.amount)
    }
}

// =============================================================================
// Reservation Coordinator
// =============================================================================

/// Applies the reservation rules against a store.
pub struct ReservationCoordinator<S: Store + 'static> {
    /// Store for persistence
    store: Arc<S>,
    /// CAS attempts per transition
    max_attempts: u32,
}

impl<S: Store + 'static> ReservationCoordinator<S> {
    /// Create a coordinator with the default retry limit.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Override the retry limit (at least one attempt is always made).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Get the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Put one unit of a product on the session's list.
    ///
    /// Creates the row on first use, otherwise adds to it.
    pub async fn add_product(
        &self,
        session: &Session,
        product_id: ProductId,
    ) -> ReservationResult<Transition> {
        self.apply(session, product_id, Action::Add).await
    }

    /// Reserve one more unit of a product already on the list.
    pub async fn increase_amount(
        &self,
        session: &Session,
        product_id: ProductId,
    ) -> ReservationResult<Transition> {
        self.apply(session, product_id, Action::Increase).await
    }

    /// Return one reserved unit to free stock.
    ///
    /// A row that reaches zero stays on the list.
    pub async fn decrease_amount(
        &self,
        session: &Session,
        product_id: ProductId,
    ) -> ReservationResult<Transition> {
        self.apply(session, product_id, Action::Decrease).await
    }

    /// Products not on the session's list with free stock, optionally
    /// filtered by a case-insensitive name search.
    pub async fn available_products(
        &self,
        session: &Session,
        search: Option<&str>,
    ) -> ReservationResult<Vec<Product>> {
        let products = self.store.products().get_all().await?;
        let on_list = self.store.list_items().get_all_on_list(session.list_id).await?;
        Ok(available_products(&products, &on_list, search))
    }

    /// Rows of the session's list, each joined with its product.
    pub async fn list_items(&self, session: &Session) -> ReservationResult<Vec<ListLine>> {
        let items = self.store.list_items().get_all_on_list(session.list_id).await?;
        let products = self.store.products().get_all().await?;

        items
            .into_iter()
            .map(|item| {
                let product = products
                    .iter()
                    .find(|p| p.id == item.product_id)
                    .cloned()
                    .ok_or_else(|| {
                        ReservationError::Integrity(format!(
                            "ledger row {} references missing product {}",
                            item.id, item.product_id
                        ))
                    })?;
                Ok(ListLine { item, product })
            })
            .collect()
    }

    /// Add a product to the shared catalogue. Admin only.
    pub async fn create_product(
        &self,
        session: &Session,
        product: NewProduct,
    ) -> ReservationResult<Product> {
        if let Err(e) = Self::require_admin(session) {
            warn!(%session, name = %product.name, "Product creation refused");
            return Err(e);
        }

        let stored = self.store.products().add(&product).await?;
        info!(product_id = %stored.id, name = %stored.name, stock = stored.stock, "Product created");
        Ok(stored)
    }

    /// Reject sessions without the admin role.
    pub fn require_admin(session: &Session) -> ReservationResult<()> {
        if session.is_admin() {
            Ok(())
        } else {
            Err(ReservationError::NotAuthorized(format!(
                "creating products requires the admin role ({})",
                session
            )))
        }
    }

    /// Audit the store and fail if any ledger invariant is broken.
    pub async fn reconcile(&self) -> ReservationResult<IntegrityReport> {
        let report = self.store.audit().await?;

        if !report.is_clean() {
            error!(
                duplicate_pairs = report.duplicate_pairs.len(),
                dangling_items = report.dangling_items.len(),
                unique_pairs_enforced = report.unique_pairs_enforced,
                "Ledger integrity check failed"
            );
            return Err(ReservationError::Integrity(report.summary()));
        }

        debug!("Ledger integrity check passed");
        Ok(report)
    }

    /// Read, plan, and commit one transition, retrying on conflict.
    async fn apply(
        &self,
        session: &Session,
        product_id: ProductId,
        action: Action,
    ) -> ReservationResult<Transition> {
        let list_id = session.list_id;

        for attempt in 1..=self.max_attempts {
            let product = self
                .store
                .products()
                .get(product_id)
                .await?
                .ok_or(ReservationError::ProductNotFound(product_id))?;
            let item = self.store.list_items().find(list_id, product_id).await?;

            let transfer = match action.plan(list_id, &product, item.as_ref()) {
                Ok(transfer) => transfer,
                Err(e) => {
                    debug!(%list_id, %product_id, %action, reason = %e, "Transition rejected");
                    return Err(e);
                },
            };

            match self.store.commit_transfer(&transfer).await {
                Ok(receipt) => {
                    info!(
                        %list_id,
                        %product_id,
                        %action,
                        amount = receipt.item.amount,
                        stock = receipt.product.stock,
                        attempt,
                        "Transition committed"
                    );

                    let available = self.available_products(session, None).await?;
                    return Ok(Transition {
                        item: receipt.item,
                        product: receipt.product,
                        available,
                    });
                },
                Err(e) if e.is_conflict() => {
                    debug!(%list_id, %product_id, %action, attempt, "Concurrent update, retrying");
                },
                Err(StoreError::Integrity(detail)) => {
                    error!(%list_id, %product_id, %action, %detail, "Transfer refused by integrity check");
                    return Err(ReservationError::Integrity(detail));
                },
                Err(e) => return Err(e.into()),
            }
        }

        warn!(%list_id, %product_id, %action, attempts = self.max_attempts, "Giving up after repeated conflicts");
        Err(ReservationError::Contention {
            attempts: self.max_attempts,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use grocery_domain::{ListId, NewListItem};
    use grocery_store::{ListItemRepository, MemoryStore, ProductRepository};
    use grocery_testkit::{seed_catalogue, Catalogue};
    use rust_decimal_macros::dec;

    async fn create_test_coordinator() -> (ReservationCoordinator<MemoryStore>, Catalogue) {
        let store = Arc::new(MemoryStore::new());
        let catalogue = seed_catalogue(store.as_ref()).await.unwrap();
        (ReservationCoordinator::new(store), catalogue)
    }

    async fn stock_of(coordinator: &ReservationCoordinator<MemoryStore>, id: ProductId) -> u32 {
        ProductRepository::get(coordinator.store().as_ref(), id)
            .await
            .unwrap()
            .unwrap()
            .stock
    }

    async fn total_units(coordinator: &ReservationCoordinator<MemoryStore>, id: ProductId) -> u64 {
        let reserved: u64 = ListItemRepository::get_all(coordinator.store().as_ref())
            .await
            .unwrap()
            .iter()
            .filter(|i| i.product_id == id)
            .map(|i| u64::from(i.amount))
            .sum();
        reserved + u64::from(stock_of(coordinator, id).await)
    }

    #[tokio::test]
    async fn test_three_adds_reserve_three() {
        let (coordinator, catalogue) = create_test_coordinator().await;
        let session = Session::client(ListId(1));

        let mut last = None;
        for _ in 0..3 {
            last = Some(coordinator.add_product(&session, catalogue.melk.id).await.unwrap());
        }
        let last = last.unwrap();

        assert_eq!(last.item.amount, 3);
        assert_eq!(last.product.stock, 297);
        assert_eq!(stock_of(&coordinator, catalogue.melk.id).await, 297);

        let rows = ListItemRepository::get_all_on_list(coordinator.store().as_ref(), ListId(1))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_transition_rederives_available() {
        let (coordinator, catalogue) = create_test_coordinator().await;
        let session = Session::client(ListId(1));

        let transition = coordinator.add_product(&session, catalogue.melk.id).await.unwrap();

        let names: Vec<&str> = transition.available.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Kaas", "Brood"]);
    }

    #[tokio::test]
    async fn test_add_out_of_stock_changes_nothing() {
        let (coordinator, catalogue) = create_test_coordinator().await;
        let session = Session::client(ListId(1));

        let err = coordinator
            .add_product(&session, catalogue.cornflakes.id)
            .await
            .unwrap_err();

        assert!(matches!(err, ReservationError::InsufficientStock { .. }));
        assert_eq!(coordinator.store().list_item_count(), 0);
    }

    #[tokio::test]
    async fn test_increase_at_stock_limit_rejected() {
        let (coordinator, catalogue) = create_test_coordinator().await;
        let store = coordinator.store().clone();
        let session = Session::client(ListId(1));

        // Kaas: 3 free, 3 reserved
        let mut kaas = catalogue.kaas.clone();
        kaas.stock = 3;
        ProductRepository::update(store.as_ref(), &kaas).await.unwrap();
        ListItemRepository::add(store.as_ref(), &NewListItem::new(ListId(1), kaas.id, 3))
            .await
            .unwrap();

        let err = coordinator.increase_amount(&session, kaas.id).await.unwrap_err();

        assert!(matches!(
            err,
            ReservationError::InsufficientStock { stock: 3, amount: 3, .. }
        ));
        assert_eq!(stock_of(&coordinator, kaas.id).await, 3);
        let row = ListItemRepository::find(store.as_ref(), ListId(1), kaas.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.amount, 3);
    }

    #[tokio::test]
    async fn test_increase_not_on_list() {
        let (coordinator, catalogue) = create_test_coordinator().await;
        let err = coordinator
            .increase_amount(&Session::client(ListId(1)), catalogue.brood.id)
            .await
            .unwrap_err();

        assert!(matches!(err, ReservationError::NotOnList { .. }));
    }

    #[tokio::test]
    async fn test_decrease_returns_unit_to_stock() {
        let (coordinator, catalogue) = create_test_coordinator().await;
        let session = Session::client(ListId(1));
        for _ in 0..3 {
            coordinator.add_product(&session, catalogue.brood.id).await.unwrap();
        }
        let before = stock_of(&coordinator, catalogue.brood.id).await;

        let transition = coordinator.decrease_amount(&session, catalogue.brood.id).await.unwrap();

        assert_eq!(transition.item.amount, 2);
        assert_eq!(transition.product.stock, before + 1);
    }

    #[tokio::test]
    async fn test_decrease_to_zero_keeps_row() {
        let (coordinator, catalogue) = create_test_coordinator().await;
        let session = Session::client(ListId(2));
        coordinator.add_product(&session, catalogue.melk.id).await.unwrap();

        let transition = coordinator.decrease_amount(&session, catalogue.melk.id).await.unwrap();
        assert_eq!(transition.item.amount, 0);
        assert_eq!(coordinator.store().list_item_count(), 1);

        let err = coordinator.decrease_amount(&session, catalogue.melk.id).await.unwrap_err();
        assert!(matches!(err, ReservationError::NothingReserved { .. }));
        assert_eq!(stock_of(&coordinator, catalogue.melk.id).await, 300);
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let (coordinator, _) = create_test_coordinator().await;
        let err = coordinator
            .add_product(&Session::client(ListId(1)), ProductId(999))
            .await
            .unwrap_err();

        assert!(matches!(err, ReservationError::ProductNotFound(ProductId(999))));
        assert!(err.is_rejection());
    }

    #[tokio::test]
    async fn test_units_conserved_across_transitions() {
        let (coordinator, catalogue) = create_test_coordinator().await;
        let one = Session::client(ListId(1));
        let two = Session::client(ListId(2));
        let kaas = catalogue.kaas.id;

        coordinator.add_product(&one, kaas).await.unwrap();
        coordinator.add_product(&two, kaas).await.unwrap();
        coordinator.increase_amount(&one, kaas).await.unwrap();
        coordinator.decrease_amount(&two, kaas).await.unwrap();
        let _ = coordinator.decrease_amount(&two, kaas).await;

        assert_eq!(total_units(&coordinator, kaas).await, 100);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_never_oversell() {
        let store = Arc::new(MemoryStore::new());
        let scarce = ProductRepository::add(
            store.as_ref(),
            &NewProduct::from_form("Scarce", 5, None, dec!(2.50)).unwrap(),
        )
        .await
        .unwrap();
        let scarce_id = scarce.id;
        let coordinator = Arc::new(ReservationCoordinator::new(store.clone()).with_max_attempts(1000));

        let mut handles = Vec::new();
        for list in 1..=20 {
            let coordinator = coordinator.clone();
            handles.push(tokio::spawn(async move {
                coordinator
                    .add_product(&Session::client(ListId(list)), scarce_id)
                    .await
            }));
        }

        let mut committed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => committed += 1,
                Err(ReservationError::InsufficientStock { .. }) => {},
                Err(e) => panic!("unexpected error: {}", e),
            }
        }

        assert_eq!(committed, 5);
        assert_eq!(stock_of(&coordinator, scarce_id).await, 0);
        assert_eq!(total_units(&coordinator, scarce_id).await, 5);
    }

    #[tokio::test]
    async fn test_available_products_search() {
        let (coordinator, _) = create_test_coordinator().await;

        let found = coordinator
            .available_products(&Session::client(ListId(1)), Some("bro"))
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name.as_str(), "Brood");
    }

    #[tokio::test]
    async fn test_list_items_joined_with_products() {
        let (coordinator, catalogue) = create_test_coordinator().await;
        let session = Session::client(ListId(1));
        coordinator.add_product(&session, catalogue.kaas.id).await.unwrap();
        coordinator.add_product(&session, catalogue.kaas.id).await.unwrap();

        let lines = coordinator.list_items(&session).await.unwrap();

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product.name.as_str(), "Kaas");
        assert_eq!(lines[0].subtotal(), dec!(15.96));
    }

    #[tokio::test]
    async fn test_create_product_requires_admin() {
        let (coordinator, _) = create_test_coordinator().await;
        let new = NewProduct::from_form("Appels", 50, None, dec!(0.49)).unwrap();

        let err = coordinator
            .create_product(&Session::client(ListId(1)), new.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, ReservationError::NotAuthorized(_)));
        assert_eq!(coordinator.store().product_count(), 4);

        let created = coordinator
            .create_product(&Session::admin(ListId(1)), new)
            .await
            .unwrap();
        assert_eq!(created.name.as_str(), "Appels");
        assert_eq!(coordinator.store().product_count(), 5);
    }

    #[tokio::test]
    async fn test_reconcile_clean_store() {
        let (coordinator, _) = create_test_coordinator().await;
        assert!(coordinator.reconcile().await.unwrap().is_clean());
    }

    #[tokio::test]
    async fn test_reconcile_flags_unrepaired_duplicates() {
        let store = Arc::new(grocery_testkit::legacy_store_with_duplicates());
        let coordinator = ReservationCoordinator::new(store.clone());

        let err = coordinator.reconcile().await.unwrap_err();
        assert!(err.is_integrity());

        ListItemRepository::repair_duplicates(store.as_ref()).await.unwrap();
        assert!(coordinator.reconcile().await.is_ok());
    }
}
