//! E2E test: HTTP API over a real socket.
//!
//! Starts the API server on an ephemeral port, then drives a shopping flow
//! with reqwest: browse, add, increase, decrease, export.

use std::sync::Arc;

use groceryd::{Config, Daemon, ListExport};
use reqwest::StatusCode;
use serde_json::Value;

async fn start() -> (String, tokio::task::JoinHandle<()>, grocery_testkit::Catalogue) {
    let (store, catalogue) = grocery_testkit::seeded_memory_store().await.unwrap();
    let daemon = Daemon::with_store(Config::test(), Arc::new(store));
    daemon.reconcile().await.unwrap();

    let (addr, handle) = daemon.start_api_server().await.unwrap();
    (format!("http://{}", addr), handle, catalogue)
}

#[tokio::test]
async fn test_shopping_flow() {
    let (base, server, catalogue) = start().await;
    let client = reqwest::Client::new();
    let brood = catalogue.brood.id;

    // Brood is available on a fresh list
    let available: Vec<Value> = client
        .get(format!("{}/lists/9/available", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(available.iter().any(|p| p["name"] == "Brood"));

    // Add, then increase twice
    let response = client
        .post(format!("{}/lists/9/items", base))
        .json(&serde_json::json!({ "product_id": brood }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let transition: Value = response.json().await.unwrap();
    assert!(transition["available"]
        .as_array()
        .unwrap()
        .iter()
        .all(|p| p["name"] != "Brood"));

    for expected in [2, 3] {
        let transition: Value = client
            .post(format!("{}/lists/9/items/{}/increase", base, brood))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(transition["item"]["amount"], expected);
    }

    // Decrease once
    let transition: Value = client
        .post(format!("{}/lists/9/items/{}/decrease", base, brood))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(transition["item"]["amount"], 2);
    assert_eq!(transition["product"]["stock"], 398);

    // Export reflects the list
    let export: ListExport = client
        .get(format!("{}/lists/9/export", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(export.items.len(), 1);
    assert_eq!(export.items[0].name, "Brood");
    assert_eq!(export.items[0].amount, 2);

    server.abort();
}

#[tokio::test]
async fn test_admin_header_gates_product_creation() {
    let (base, server, _) = start().await;
    let client = reqwest::Client::new();
    let body = serde_json::json!({
        "name": "Eieren",
        "stock": 12,
        "shelf_life": "2025-10-01",
        "price": "3.29"
    });

    let refused = client
        .post(format!("{}/products", base))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(refused.status(), StatusCode::FORBIDDEN);

    let created = client
        .post(format!("{}/products", base))
        .header(groceryd::api::ADMIN_HEADER, "true")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let product: Value = created.json().await.unwrap();
    assert_eq!(product["shelf_life"], "2025-10-01");
    assert_eq!(product["stock"], 12);

    server.abort();
}
