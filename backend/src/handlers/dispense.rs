//! HTTP handlers for dispense endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::dispense::{
    DispenseInput, DispenseListQuery, DispenseRecord, DispenseRecordDetail,
    DispenseRecordSummary, DispenseService, UpdateDispenseInput,
};
use crate::AppState;

/// Create a dispense record (FEFO or explicit-lot allocation)
pub async fn create_dispense(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<DispenseInput>,
) -> AppResult<(StatusCode, Json<DispenseRecordDetail>)> {
    let service = DispenseService::new(state.db, state.config.stock.clone());
    let detail = service
        .create_dispense(&current_user.0.hcode, current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// List dispense records for the facility
pub async fn list_dispenses(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<DispenseListQuery>,
) -> AppResult<Json<Vec<DispenseRecordSummary>>> {
    let service = DispenseService::new(state.db, state.config.stock.clone());
    let records = service.list_dispenses(&current_user.0.hcode, &query).await?;
    Ok(Json(records))
}

/// Get one dispense record with its allocated lines
pub async fn get_dispense(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(record_id): Path<Uuid>,
) -> AppResult<Json<DispenseRecordDetail>> {
    let service = DispenseService::new(state.db, state.config.stock.clone());
    let detail = service.get_dispense(&current_user.0.hcode, record_id).await?;
    Ok(Json(detail))
}

/// Update header fields of a normal-status dispense record
pub async fn update_dispense(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(record_id): Path<Uuid>,
    Json(input): Json<UpdateDispenseInput>,
) -> AppResult<Json<DispenseRecord>> {
    let service = DispenseService::new(state.db, state.config.stock.clone());
    let record = service
        .update_dispense(&current_user.0.hcode, record_id, input)
        .await?;
    Ok(Json(record))
}

/// Cancel a dispense record, restoring stock to its original lots
pub async fn cancel_dispense(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(record_id): Path<Uuid>,
) -> AppResult<Json<DispenseRecord>> {
    let service = DispenseService::new(state.db, state.config.stock.clone());
    let record = service
        .cancel_dispense(&current_user.0.hcode, current_user.0.user_id, record_id)
        .await?;
    Ok(Json(record))
}
