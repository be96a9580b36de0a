//! Stock summary handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{StockSummary, SummaryFilter, SummaryTotals};
use crate::services::StockSummaryService;
use crate::AppState;

/// Available stock per product
pub async fn get_stock_summary(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<SummaryFilter>,
) -> AppResult<Json<Vec<StockSummary>>> {
    let service = StockSummaryService::new(state.db.clone(), &state.config.inventory)?;
    let rows = service.summary(&filter).await?;
    Ok(Json(rows))
}

/// Category and grand totals in the reporting currency
pub async fn get_stock_totals(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<SummaryFilter>,
) -> AppResult<Json<SummaryTotals>> {
    let service = StockSummaryService::new(state.db.clone(), &state.config.inventory)?;
    let totals = service.totals(&filter).await?;
    Ok(Json(totals))
}

pub async fn get_product_stock(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(product_id): Path<i64>,
) -> AppResult<Json<StockSummary>> {
    let service = StockSummaryService::new(state.db.clone(), &state.config.inventory)?;
    let row = service.for_product(product_id).await?;
    Ok(Json(row))
}
