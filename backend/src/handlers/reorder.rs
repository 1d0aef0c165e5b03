//! HTTP handlers for reorder level endpoints

use axum::{
    extract::{Query, State},
    Json,
};

use shared::reorder::RequisitionSuggestion;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::reorder::{MinMaxQuery, MinMaxRunSummary, ReorderService};
use crate::AppState;

/// Recalculate min/max stock levels from consumption history
pub async fn recalculate_min_max(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<MinMaxQuery>,
) -> AppResult<Json<MinMaxRunSummary>> {
    let service = ReorderService::new(state.db, state.config.stock.clone());
    let summary = service
        .recalculate_levels(&current_user.0.hcode, &query)
        .await?;
    Ok(Json(summary))
}

/// Medicines below min stock with refill-to-max quantities
pub async fn suggest_requisition(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<RequisitionSuggestion>>> {
    let service = ReorderService::new(state.db, state.config.stock.clone());
    let suggestions = service.suggest_requisition(&current_user.0.hcode).await?;
    Ok(Json(suggestions))
}
