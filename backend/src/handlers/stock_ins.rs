//! Stock In HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{NewStockIn, StockIn, StockInChanges};
use crate::services::stock_in::StockInFilter;
use crate::services::StockInService;
use crate::AppState;

pub async fn list_stock_ins(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<StockInFilter>,
) -> AppResult<Json<Vec<StockIn>>> {
    let service = StockInService::new(state.db);
    let records = service.list(filter).await?;
    Ok(Json(records))
}

pub async fn get_stock_in(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(stock_in_id): Path<i64>,
) -> AppResult<Json<StockIn>> {
    let service = StockInService::new(state.db);
    let record = service.get(stock_in_id).await?;
    Ok(Json(record))
}

/// Derive Stock In records from a verified receipt, one per matched product
pub async fn create_stock_in(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<NewStockIn>,
) -> AppResult<(StatusCode, Json<Vec<StockIn>>)> {
    let service = StockInService::new(state.db);
    let records = service.create(&current_user.0.actor(), input).await?;
    Ok((StatusCode::CREATED, Json(records)))
}

pub async fn update_stock_in(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(stock_in_id): Path<i64>,
    Json(changes): Json<StockInChanges>,
) -> AppResult<Json<StockIn>> {
    let service = StockInService::new(state.db);
    let record = service.update(&current_user.0.actor(), stock_in_id, changes).await?;
    Ok(Json(record))
}

pub async fn delete_stock_in(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(stock_in_id): Path<i64>,
) -> AppResult<StatusCode> {
    let service = StockInService::new(state.db);
    service.delete(&current_user.0.actor(), stock_in_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn validate_stock_in(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(stock_in_id): Path<i64>,
) -> AppResult<Json<StockIn>> {
    let service = StockInService::new(state.db);
    let record = service.validate(&current_user.0.actor(), stock_in_id).await?;
    Ok(Json(record))
}

pub async fn complete_stock_in(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(stock_in_id): Path<i64>,
) -> AppResult<Json<StockIn>> {
    let service = StockInService::new(state.db);
    let record = service.complete(&current_user.0.actor(), stock_in_id).await?;
    Ok(Json(record))
}

pub async fn cancel_stock_in(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(stock_in_id): Path<i64>,
) -> AppResult<Json<StockIn>> {
    let service = StockInService::new(state.db);
    let record = service.cancel(&current_user.0.actor(), stock_in_id).await?;
    Ok(Json(record))
}
