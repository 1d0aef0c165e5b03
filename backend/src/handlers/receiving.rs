//! HTTP handlers for goods receipt endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::receiving::{
    CreateReceiptInput, GoodsReceiptDetail, GoodsReceiptVoucherSummary, ReceiptListQuery,
    ReceivingService,
};
use crate::AppState;

/// Record a goods receipt voucher and top up the received lots
pub async fn create_receipt(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateReceiptInput>,
) -> AppResult<(StatusCode, Json<GoodsReceiptDetail>)> {
    let service = ReceivingService::new(state.db);
    let detail = service
        .create_receipt(&current_user.0.hcode, current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// List goods receipt vouchers for the facility
pub async fn list_receipts(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ReceiptListQuery>,
) -> AppResult<Json<Vec<GoodsReceiptVoucherSummary>>> {
    let service = ReceivingService::new(state.db);
    let vouchers = service.list_receipts(&current_user.0.hcode, &query).await?;
    Ok(Json(vouchers))
}

/// Get one voucher with its received lines
pub async fn get_receipt(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(voucher_id): Path<Uuid>,
) -> AppResult<Json<GoodsReceiptDetail>> {
    let service = ReceivingService::new(state.db);
    let detail = service.get_receipt(&current_user.0.hcode, voucher_id).await?;
    Ok(Json(detail))
}
