//! Goods Receipt HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{GoodsReceipt, GoodsReceiptChanges, NewGoodsReceipt};
use crate::services::goods_receipt::GoodsReceiptFilter;
use crate::services::purchase_request::RejectInput;
use crate::services::GoodsReceiptService;
use crate::AppState;

pub async fn list_goods_receipts(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<GoodsReceiptFilter>,
) -> AppResult<Json<Vec<GoodsReceipt>>> {
    let service = GoodsReceiptService::new(state.db);
    let receipts = service.list(filter).await?;
    Ok(Json(receipts))
}

pub async fn get_goods_receipt(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(gr_id): Path<i64>,
) -> AppResult<Json<GoodsReceipt>> {
    let service = GoodsReceiptService::new(state.db);
    let gr = service.get(gr_id).await?;
    Ok(Json(gr))
}

/// Record a delivery against an approved purchase request
pub async fn create_goods_receipt(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<NewGoodsReceipt>,
) -> AppResult<(StatusCode, Json<GoodsReceipt>)> {
    let service = GoodsReceiptService::new(state.db);
    let gr = service.create(&current_user.0.actor(), input).await?;
    Ok((StatusCode::CREATED, Json(gr)))
}

pub async fn update_goods_receipt(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(gr_id): Path<i64>,
    Json(changes): Json<GoodsReceiptChanges>,
) -> AppResult<Json<GoodsReceipt>> {
    let service = GoodsReceiptService::new(state.db);
    let gr = service.update(&current_user.0.actor(), gr_id, changes).await?;
    Ok(Json(gr))
}

pub async fn delete_goods_receipt(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(gr_id): Path<i64>,
) -> AppResult<StatusCode> {
    let service = GoodsReceiptService::new(state.db);
    service.delete(&current_user.0.actor(), gr_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Verify a receipt and post its quantities to the purchase request
pub async fn verify_goods_receipt(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(gr_id): Path<i64>,
) -> AppResult<Json<GoodsReceipt>> {
    let service = GoodsReceiptService::new(state.db);
    let gr = service.verify(&current_user.0.actor(), gr_id).await?;
    Ok(Json(gr))
}

pub async fn reject_goods_receipt(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(gr_id): Path<i64>,
    Json(input): Json<RejectInput>,
) -> AppResult<Json<GoodsReceipt>> {
    let service = GoodsReceiptService::new(state.db);
    let gr = service.reject(&current_user.0.actor(), gr_id, input).await?;
    Ok(Json(gr))
}
