//! HTTP API for the grocery daemon.
//!
//! Provides REST endpoints for:
//! - Health check
//! - Product catalogue (list, admin-only create)
//! - List items (view, add, increase, decrease)
//! - Available products per list, with search
//! - JSON export of a list
//!
//! Handlers only translate between HTTP and the reservation coordinator.
//! The caller's role comes from the `x-grocery-admin` header.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

use grocery_domain::{ListId, NewProduct, Product, ProductId, Session};
use grocery_reservations::{ListLine, ReservationCoordinator, ReservationError, Transition};
use grocery_store::{Store, StoreError};

use crate::error::DaemonError;
use crate::export::{ListExport, EXPORT_FILE_NAME};

/// Header carrying the externally supplied admin flag.
pub const ADMIN_HEADER: &str = "x-grocery-admin";

/// Catalogue operations are not scoped to a list.
const CATALOGUE_LIST: ListId = ListId(0);

// =============================================================================
// API State
// =============================================================================

/// Shared state for API handlers.
pub struct ApiState<S: Store + 'static> {
    pub coordinator: Arc<ReservationCoordinator<S>>,
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Request to create a product (admin form).
#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub stock: i64,
    #[serde(default)]
    pub shelf_life: Option<NaiveDate>,
    pub price: Decimal,
}

/// Request to put a product on a list.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
}

/// Query for available products.
#[derive(Debug, Default, Deserialize)]
pub struct AvailableQuery {
    pub search: Option<String>,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

// =============================================================================
// Router
// =============================================================================

/// Create the API router.
pub fn create_router<S: Store + 'static>(state: Arc<ApiState<S>>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/products",
            get(list_products_handler::<S>).post(create_product_handler::<S>),
        )
        .route(
            "/lists/:list_id/items",
            get(list_items_handler::<S>).post(add_item_handler::<S>),
        )
        .route("/lists/:list_id/available", get(available_handler::<S>))
        .route(
            "/lists/:list_id/items/:product_id/increase",
            post(increase_handler::<S>),
        )
        .route(
            "/lists/:list_id/items/:product_id/decrease",
            post(decrease_handler::<S>),
        )
        .route("/lists/:list_id/export", get(export_handler::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint.
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// All products, in insertion order.
async fn list_products_handler<S: Store + 'static>(
    State(state): State<Arc<ApiState<S>>>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let products = state
        .coordinator
        .store()
        .products()
        .get_all()
        .await
        .map_err(|e| to_error_response(e.into()))?;

    Ok(Json(products))
}

/// Create a product (admin only).
async fn create_product_handler<S: Store + 'static>(
    State(state): State<Arc<ApiState<S>>>,
    headers: HeaderMap,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let session = session(CATALOGUE_LIST, &headers);
    ReservationCoordinator::<S>::require_admin(&session)
        .map_err(|e| to_error_response(e.into()))?;

    let product = NewProduct::from_form(&req.name, req.stock, req.shelf_life, req.price)
        .map_err(|e| to_error_response(e.into()))?;

    let created = state
        .coordinator
        .create_product(&session, product)
        .await
        .map_err(|e| to_error_response(e.into()))?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// Items on a list, joined with their products.
async fn list_items_handler<S: Store + 'static>(
    State(state): State<Arc<ApiState<S>>>,
    Path(list_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Vec<ListLine>>, ApiError> {
    let session = session(ListId(list_id), &headers);
    let lines = state
        .coordinator
        .list_items(&session)
        .await
        .map_err(|e| to_error_response(e.into()))?;

    Ok(Json(lines))
}

/// Products the list can still take.
async fn available_handler<S: Store + 'static>(
    State(state): State<Arc<ApiState<S>>>,
    Path(list_id): Path<i64>,
    Query(query): Query<AvailableQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<Product>>, ApiError> {
    let session = session(ListId(list_id), &headers);
    let products = state
        .coordinator
        .available_products(&session, query.search.as_deref())
        .await
        .map_err(|e| to_error_response(e.into()))?;

    Ok(Json(products))
}

/// Put one unit of a product on the list.
async fn add_item_handler<S: Store + 'static>(
    State(state): State<Arc<ApiState<S>>>,
    Path(list_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<Transition>, ApiError> {
    let session = session(ListId(list_id), &headers);
    let transition = state
        .coordinator
        .add_product(&session, req.product_id)
        .await
        .map_err(|e| to_error_response(e.into()))?;

    Ok(Json(transition))
}

/// Reserve one more unit.
async fn increase_handler<S: Store + 'static>(
    State(state): State<Arc<ApiState<S>>>,
    Path((list_id, product_id)): Path<(i64, i64)>,
    headers: HeaderMap,
) -> Result<Json<Transition>, ApiError> {
    let session = session(ListId(list_id), &headers);
    let transition = state
        .coordinator
        .increase_amount(&session, ProductId(product_id))
        .await
        .map_err(|e| to_error_response(e.into()))?;

    Ok(Json(transition))
}

/// Return one unit to stock.
async fn decrease_handler<S: Store + 'static>(
    State(state): State<Arc<ApiState<S>>>,
    Path((list_id, product_id)): Path<(i64, i64)>,
    headers: HeaderMap,
) -> Result<Json<Transition>, ApiError> {
    let session = session(ListId(list_id), &headers);
    let transition = state
        .coordinator
        .decrease_amount(&session, ProductId(product_id))
        .await
        .map_err(|e| to_error_response(e.into()))?;

    Ok(Json(transition))
}

/// Download the list as a JSON document.
async fn export_handler<S: Store + 'static>(
    State(state): State<Arc<ApiState<S>>>,
    Path(list_id): Path<i64>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let session = session(ListId(list_id), &headers);
    let lines = state
        .coordinator
        .list_items(&session)
        .await
        .map_err(|e| to_error_response(e.into()))?;

    let export = ListExport::from_lines(session.list_id, &lines, Utc::now());
    let disposition = format!("attachment; filename=\"{}\"", EXPORT_FILE_NAME);

    Ok(([(header::CONTENT_DISPOSITION, disposition)], Json(export)))
}

// =============================================================================
// Helpers
// =============================================================================

fn session(list_id: ListId, headers: &HeaderMap) -> Session {
    let is_admin = headers
        .get(ADMIN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    Session::from_flag(list_id, is_admin)
}

fn store_status(error: &StoreError) -> StatusCode {
    match error {
        StoreError::ConstraintViolation { .. } | StoreError::Conflict { .. } => StatusCode::CONFLICT,
        StoreError::Domain(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn to_error_response(error: DaemonError) -> ApiError {
    let status = match &error {
        DaemonError::Reservation(e) => match e {
            ReservationError::ProductNotFound(_) | ReservationError::NotOnList { .. } => {
                StatusCode::NOT_FOUND
            },
            ReservationError::InsufficientStock { .. }
            | ReservationError::NothingReserved { .. }
            | ReservationError::Contention { .. } => StatusCode::CONFLICT,
            ReservationError::NotAuthorized(_) => StatusCode::FORBIDDEN,
            ReservationError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ReservationError::Integrity(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ReservationError::Store(s) => store_status(s),
        },
        DaemonError::Store(s) => store_status(s),
        DaemonError::Domain(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DaemonError::Database(_) | DaemonError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if error.is_integrity() {
        error!(error = %error, "Integrity failure while serving request; reconcile before trusting the ledger");
    }

    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

// =============================================================================
// Tests
// =============================================================================
