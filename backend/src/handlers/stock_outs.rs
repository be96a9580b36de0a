//! Stock Out HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{NewStockOut, StockOut, StockOutChanges};
use crate::services::stock_out::StockOutFilter;
use crate::services::StockOutService;
use crate::AppState;

pub async fn list_stock_outs(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<StockOutFilter>,
) -> AppResult<Json<Vec<StockOut>>> {
    let service = StockOutService::new(state.db);
    let records = service.list(filter).await?;
    Ok(Json(records))
}

pub async fn get_stock_out(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(stock_out_id): Path<i64>,
) -> AppResult<Json<StockOut>> {
    let service = StockOutService::new(state.db);
    let record = service.get(stock_out_id).await?;
    Ok(Json(record))
}

/// Issue stock; refused when the quantity exceeds what is available
pub async fn create_stock_out(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<NewStockOut>,
) -> AppResult<(StatusCode, Json<StockOut>)> {
    let service = StockOutService::new(state.db);
    let record = service.create(&current_user.0.actor(), input).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn update_stock_out(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(stock_out_id): Path<i64>,
    Json(changes): Json<StockOutChanges>,
) -> AppResult<Json<StockOut>> {
    let service = StockOutService::new(state.db);
    let record = service.update(&current_user.0.actor(), stock_out_id, changes).await?;
    Ok(Json(record))
}

pub async fn delete_stock_out(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(stock_out_id): Path<i64>,
) -> AppResult<StatusCode> {
    let service = StockOutService::new(state.db);
    service.delete(&current_user.0.actor(), stock_out_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn ready_stock_out(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(stock_out_id): Path<i64>,
) -> AppResult<Json<StockOut>> {
    let service = StockOutService::new(state.db);
    let record = service.ready(&current_user.0.actor(), stock_out_id).await?;
    Ok(Json(record))
}

pub async fn complete_stock_out(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(stock_out_id): Path<i64>,
) -> AppResult<Json<StockOut>> {
    let service = StockOutService::new(state.db);
    let record = service.complete(&current_user.0.actor(), stock_out_id).await?;
    Ok(Json(record))
}

pub async fn cancel_stock_out(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(stock_out_id): Path<i64>,
) -> AppResult<Json<StockOut>> {
    let service = StockOutService::new(state.db);
    let record = service.cancel(&current_user.0.actor(), stock_out_id).await?;
    Ok(Json(record))
}
