//! HTTP handlers for inventory view endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{LotStockView, MedicineStockSummary};
use crate::middleware::CurrentUser;
use crate::services::inventory::{HistoryQuery, InventoryService, MovementHistory};
use crate::AppState;

/// Facility stock overview with per-medicine stock status
pub async fn stock_summary(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<MedicineStockSummary>>> {
    let service = InventoryService::new(state.db);
    let summary = service.stock_summary(&current_user.0.hcode).await?;
    Ok(Json(summary))
}

/// Lots holding stock for one medicine, in FEFO order
pub async fn medicine_lots(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(medicine_id): Path<Uuid>,
) -> AppResult<Json<Vec<LotStockView>>> {
    let service = InventoryService::new(state.db);
    let lots = service
        .medicine_lots(&current_user.0.hcode, medicine_id)
        .await?;
    Ok(Json(lots))
}

/// Movement audit trail for one medicine with running balances
pub async fn movement_history(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(medicine_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<MovementHistory>> {
    let service = InventoryService::new(state.db);
    let history = service
        .movement_history(&current_user.0.hcode, medicine_id, &query)
        .await?;
    Ok(Json(history))
}
