//! Route definitions for the inventory ledger API

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes (public)
        .route("/auth/login", post(handlers::login))
        // Protected routes
        .nest("/users", user_routes(state.clone()))
        .nest("/products", product_routes(state.clone()))
        .nest("/purchase-requests", purchase_request_routes(state.clone()))
        .nest("/goods-receipts", goods_receipt_routes(state.clone()))
        .nest("/stock-ins", stock_in_routes(state.clone()))
        .nest("/stock-outs", stock_out_routes(state.clone()))
        .nest("/stock-summary", stock_summary_routes(state.clone()))
        .nest("/reports", report_routes(state))
}

/// User administration routes (protected)
fn user_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_users).post(handlers::create_user))
        .route("/me", get(handlers::get_me))
        .route("/:user_id/role", put(handlers::change_user_role))
        .route("/:user_id/deactivate", post(handlers::deactivate_user))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Product catalog routes (protected)
fn product_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_products).post(handlers::create_product))
        .route("/:product_id", get(handlers::get_product))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Purchase request routes (protected)
fn purchase_request_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_purchase_requests).post(handlers::create_purchase_request),
        )
        .route("/receivable", get(handlers::list_receivable_purchase_requests))
        .route(
            "/:pr_id",
            get(handlers::get_purchase_request)
                .put(handlers::update_purchase_request)
                .delete(handlers::delete_purchase_request),
        )
        .route("/:pr_id/submit", post(handlers::submit_purchase_request))
        .route("/:pr_id/approve", post(handlers::approve_purchase_request))
        .route("/:pr_id/reject", post(handlers::reject_purchase_request))
        .route("/:pr_id/cancel", post(handlers::cancel_purchase_request))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Goods receipt routes (protected)
fn goods_receipt_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_goods_receipts).post(handlers::create_goods_receipt),
        )
        .route(
            "/:gr_id",
            get(handlers::get_goods_receipt)
                .put(handlers::update_goods_receipt)
                .delete(handlers::delete_goods_receipt),
        )
        .route("/:gr_id/verify", post(handlers::verify_goods_receipt))
        .route("/:gr_id/reject", post(handlers::reject_goods_receipt))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Stock In routes (protected)
fn stock_in_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_stock_ins).post(handlers::create_stock_in))
        .route(
            "/:stock_in_id",
            get(handlers::get_stock_in)
                .put(handlers::update_stock_in)
                .delete(handlers::delete_stock_in),
        )
        .route("/:stock_in_id/validate", post(handlers::validate_stock_in))
        .route("/:stock_in_id/complete", post(handlers::complete_stock_in))
        .route("/:stock_in_id/cancel", post(handlers::cancel_stock_in))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Stock Out routes (protected)
fn stock_out_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_stock_outs).post(handlers::create_stock_out))
        .route(
            "/:stock_out_id",
            get(handlers::get_stock_out)
                .put(handlers::update_stock_out)
                .delete(handlers::delete_stock_out),
        )
        .route("/:stock_out_id/ready", post(handlers::ready_stock_out))
        .route("/:stock_out_id/complete", post(handlers::complete_stock_out))
        .route("/:stock_out_id/cancel", post(handlers::cancel_stock_out))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Stock summary routes (protected)
fn stock_summary_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::get_stock_summary))
        .route("/totals", get(handlers::get_stock_totals))
        .route("/:product_id", get(handlers::get_product_stock))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Report and export routes (protected)
fn report_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/stock-summary", get(handlers::get_stock_summary_report))
        .route("/stock-ins", get(handlers::get_stock_in_report))
        .route("/stock-outs", get(handlers::get_stock_out_report))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
