//! HTTP handlers for bulk dispense imports

use axum::{extract::State, http::StatusCode, Json};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::reconcile::{ImportBatchInput, ReconcileService, ReconcileSummary};
use crate::AppState;

/// Reconcile a batch of exported dispense rows against recorded stock.
///
/// 201 when every row applied, 207 when some rows failed, 400 when the whole
/// batch failed.
pub async fn import_dispenses(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<ImportBatchInput>,
) -> AppResult<(StatusCode, Json<ReconcileSummary>)> {
    let service = ReconcileService::new(state.db, state.config.stock.clone());
    let summary = service
        .reconcile(&current_user.0.hcode, current_user.0.user_id, input)
        .await?;

    let status = if summary.all_failed() {
        StatusCode::BAD_REQUEST
    } else if summary.has_failures() {
        StatusCode::MULTI_STATUS
    } else {
        StatusCode::CREATED
    };

    Ok((status, Json(summary)))
}
