//! E2E test: reservation scenarios against the SQLite store.
//!
//! Flow per scenario:
//! 1. Open a fresh in-memory database (migrate + repair)
//! 2. Seed the sample catalogue
//! 3. Drive the coordinator
//! 4. Verify stock, ledger rows, and conservation straight from the tables

#![cfg(feature = "sqlite")]

use std::sync::Arc;

use grocery_domain::{ListId, ListItemId, ProductId, Session};
use grocery_reservations::{ReservationCoordinator, ReservationError};
use grocery_store::{ListItemRepository, ProductRepository, SqliteStore, Store};
use grocery_testkit::{seeded_file_sqlite_store, seeded_sqlite_store, setup_test_db};

async fn coordinator() -> (ReservationCoordinator<SqliteStore>, grocery_testkit::Catalogue) {
    let (store, catalogue) = seeded_sqlite_store().await.unwrap();
    (ReservationCoordinator::new(Arc::new(store)), catalogue)
}

async fn stock(store: &SqliteStore, id: ProductId) -> i64 {
    sqlx::query_scalar("SELECT stock FROM product WHERE id = ?")
        .bind(id.0)
        .fetch_one(store.pool())
        .await
        .unwrap()
}

async fn reserved(store: &SqliteStore, id: ProductId) -> i64 {
    sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM grocery_list_item WHERE product_id = ?")
        .bind(id.0)
        .fetch_one(store.pool())
        .await
        .unwrap()
}

// =============================================================================
// Three adds on a fresh list
// =============================================================================

#[tokio::test]
async fn test_three_adds_on_fresh_list() {
    let (coordinator, catalogue) = coordinator().await;
    let session = Session::client(ListId(1));
    let melk = catalogue.melk.id;

    for _ in 0..3 {
        coordinator.add_product(&session, melk).await.unwrap();
    }

    let store = coordinator.store();
    let rows = ListItemRepository::get_all_on_list(store.as_ref(), ListId(1)).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].amount, 3);
    assert_eq!(stock(store, melk).await, 297);
}

// =============================================================================
// Increase at the stock limit
// =============================================================================

#[tokio::test]
async fn test_increase_at_limit_changes_nothing() {
    let (coordinator, catalogue) = coordinator().await;
    let store = coordinator.store().clone();
    let session = Session::client(ListId(1));

    let mut kaas = catalogue.kaas.clone();
    kaas.stock = 3;
    ProductRepository::update(store.as_ref(), &kaas).await.unwrap();
    ListItemRepository::add(store.as_ref(), &grocery_domain::NewListItem::new(ListId(1), kaas.id, 3))
        .await
        .unwrap();

    let err = coordinator.increase_amount(&session, kaas.id).await.unwrap_err();

    assert!(matches!(err, ReservationError::InsufficientStock { .. }));
    assert_eq!(stock(&store, kaas.id).await, 3);
    assert_eq!(reserved(&store, kaas.id).await, 3);
}

// =============================================================================
// Decrease returns a unit
// =============================================================================

#[tokio::test]
async fn test_decrease_returns_unit() {
    let (coordinator, catalogue) = coordinator().await;
    let session = Session::client(ListId(1));
    let brood = catalogue.brood.id;
    for _ in 0..3 {
        coordinator.add_product(&session, brood).await.unwrap();
    }

    let transition = coordinator.decrease_amount(&session, brood).await.unwrap();

    assert_eq!(transition.item.amount, 2);
    assert_eq!(stock(coordinator.store(), brood).await, 398);
    assert_eq!(
        stock(coordinator.store(), brood).await + reserved(coordinator.store(), brood).await,
        400
    );
}

// =============================================================================
// Duplicates written before the pair constraint
// =============================================================================

#[tokio::test]
async fn test_legacy_duplicates_collapsed_on_open() {
    let pool = setup_test_db().await.unwrap();
    sqlx::query("INSERT INTO product (id, name, stock, price) VALUES (2, 'Kaas', 100, '7.98')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO grocery_list_item (id, grocery_list_id, product_id, amount) VALUES (1, 1, 2, 2), (2, 1, 2, 3)",
    )
    .execute(&pool)
    .await
    .unwrap();

    let store = SqliteStore::open(pool).await.unwrap();

    let rows = ListItemRepository::get_all(&store).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, ListItemId(1));
    assert_eq!(rows[0].amount, 5);

    // Reopening repairs nothing further
    let report = ListItemRepository::repair_duplicates(&store).await.unwrap();
    assert!(report.is_noop());
    assert!(store.audit().await.unwrap().is_clean());
}

// =============================================================================
// Concurrency: many lists racing for scarce stock
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_never_oversell() {
    let (coordinator, catalogue) = coordinator().await;
    let store = coordinator.store().clone();

    let mut kaas = catalogue.kaas.clone();
    kaas.stock = 4;
    ProductRepository::update(store.as_ref(), &kaas).await.unwrap();

    let coordinator = Arc::new(coordinator.with_max_attempts(1000));
    let mut handles = Vec::new();
    for list in 1..=12 {
        let coordinator = coordinator.clone();
        let kaas_id = kaas.id;
        handles.push(tokio::spawn(async move {
            coordinator.add_product(&Session::client(ListId(list)), kaas_id).await
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

    assert_eq!(committed, 4);
    assert_eq!(stock(&store, kaas.id).await, 0);
    assert_eq!(reserved(&store, kaas.id).await, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_across_connections_never_oversell() {
    let (store, catalogue, _dir) = seeded_file_sqlite_store().await.unwrap();
    let store = Arc::new(store);

    let mut kaas = catalogue.kaas.clone();
    kaas.stock = 10;
    ProductRepository::update(store.as_ref(), &kaas).await.unwrap();

    let coordinator = Arc::new(ReservationCoordinator::new(store.clone()).with_max_attempts(1000));
    let mut handles = Vec::new();
    for list in 1..=40 {
        let coordinator = coordinator.clone();
        let kaas_id = kaas.id;
        handles.push(tokio::spawn(async move {
            coordinator.add_product(&Session::client(ListId(list)), kaas_id).await
        }));
    }

    let mut committed = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => committed += 1,
            Err(ReservationError::InsufficientStock { .. }) => refused += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(committed, 10);
    assert_eq!(refused, 30);
    assert_eq!(stock(&store, kaas.id).await, 0);
    assert_eq!(reserved(&store, kaas.id).await, 10);
    assert!(store.audit().await.unwrap().is_clean());
}
