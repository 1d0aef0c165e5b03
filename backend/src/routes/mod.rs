//! Route definitions for the MedStock inventory service

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - dispensing
        .nest("/dispenses", dispense_routes())
        // Protected routes - bulk imports
        .nest("/imports", import_routes())
        // Protected routes - goods receiving
        .nest("/goods-receipts", receiving_routes())
        // Protected routes - inventory views
        .nest("/inventory", inventory_routes())
        // Protected routes - reorder levels
        .nest("/reorder", reorder_routes())
}

/// Dispense routes (protected)
fn dispense_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_dispenses).post(handlers::create_dispense))
        .route(
            "/:record_id",
            get(handlers::get_dispense).put(handlers::update_dispense),
        )
        .route("/:record_id/cancel", post(handlers::cancel_dispense))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Bulk import routes (protected)
fn import_routes() -> Router<AppState> {
    Router::new()
        .route("/dispenses", post(handlers::import_dispenses))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Goods receiving routes (protected)
fn receiving_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_receipts).post(handlers::create_receipt))
        .route("/:voucher_id", get(handlers::get_receipt))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Inventory view routes (protected)
fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/summary", get(handlers::stock_summary))
        .route("/medicines/:medicine_id/lots", get(handlers::medicine_lots))
        .route(
            "/medicines/:medicine_id/history",
            get(handlers::movement_history),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Reorder level routes (protected)
fn reorder_routes() -> Router<AppState> {
    Router::new()
        .route("/min-max/recalculate", post(handlers::recalculate_min_max))
        .route("/suggestions", get(handlers::suggest_requisition))
        .route_layer(middleware::from_fn(auth_middleware))
}
