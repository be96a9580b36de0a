//! Purchase Request HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{NewPurchaseRequest, PurchaseRequest, PurchaseRequestChanges};
use crate::services::purchase_request::{PurchaseRequestFilter, RejectInput};
use crate::services::PurchaseRequestService;
use crate::AppState;

/// List purchase requests, newest first
pub async fn list_purchase_requests(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<PurchaseRequestFilter>,
) -> AppResult<Json<Vec<PurchaseRequest>>> {
    let service = PurchaseRequestService::new(state.db);
    let prs = service.list(filter).await?;
    Ok(Json(prs))
}

/// Approved requests that still have quantity outstanding
pub async fn list_receivable_purchase_requests(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<PurchaseRequest>>> {
    let service = PurchaseRequestService::new(state.db);
    let prs = service.list_receivable().await?;
    Ok(Json(prs))
}

pub async fn get_purchase_request(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(pr_id): Path<i64>,
) -> AppResult<Json<PurchaseRequest>> {
    let service = PurchaseRequestService::new(state.db);
    let pr = service.get(pr_id).await?;
    Ok(Json(pr))
}

/// Create a draft purchase request owned by the caller
pub async fn create_purchase_request(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<NewPurchaseRequest>,
) -> AppResult<(StatusCode, Json<PurchaseRequest>)> {
    let service = PurchaseRequestService::new(state.db);
    let pr = service.create(&current_user.0.actor(), input).await?;
    Ok((StatusCode::CREATED, Json(pr)))
}

pub async fn update_purchase_request(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(pr_id): Path<i64>,
    Json(changes): Json<PurchaseRequestChanges>,
) -> AppResult<Json<PurchaseRequest>> {
    let service = PurchaseRequestService::new(state.db);
    let pr = service.update(&current_user.0.actor(), pr_id, changes).await?;
    Ok(Json(pr))
}

pub async fn delete_purchase_request(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(pr_id): Path<i64>,
) -> AppResult<StatusCode> {
    let service = PurchaseRequestService::new(state.db);
    service.delete(&current_user.0.actor(), pr_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn submit_purchase_request(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(pr_id): Path<i64>,
) -> AppResult<Json<PurchaseRequest>> {
    let service = PurchaseRequestService::new(state.db);
    let pr = service.submit(&current_user.0.actor(), pr_id).await?;
    Ok(Json(pr))
}

pub async fn approve_purchase_request(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(pr_id): Path<i64>,
) -> AppResult<Json<PurchaseRequest>> {
    let service = PurchaseRequestService::new(state.db);
    let pr = service.approve(&current_user.0.actor(), pr_id).await?;
    Ok(Json(pr))
}

pub async fn reject_purchase_request(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(pr_id): Path<i64>,
    Json(input): Json<RejectInput>,
) -> AppResult<Json<PurchaseRequest>> {
    let service = PurchaseRequestService::new(state.db);
    let pr = service.reject(&current_user.0.actor(), pr_id, input).await?;
    Ok(Json(pr))
}

pub async fn cancel_purchase_request(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(pr_id): Path<i64>,
) -> AppResult<Json<PurchaseRequest>> {
    let service = PurchaseRequestService::new(state.db);
    let pr = service.cancel(&current_user.0.actor(), pr_id).await?;
    Ok(Json(pr))
}
