//! Reporting handlers for listings and CSV export

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{StockBand, SummaryFilter};
use crate::services::reporting::ReportFilter;
use crate::services::{ReportingService, StockSummaryService};
use crate::AppState;

#[derive(Deserialize)]
pub struct MovementReportQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub product_id: Option<i64>,
    pub format: Option<String>, // "json" or "csv"
}

impl MovementReportQuery {
    fn filter(&self) -> ReportFilter {
        ReportFilter {
            from: self.from,
            to: self.to,
            product_id: self.product_id,
        }
    }
}

#[derive(Deserialize)]
pub struct SummaryReportQuery {
    pub category: Option<String>,
    pub status: Option<StockBand>,
    pub format: Option<String>,
}

fn render<T: Serialize>(data: Vec<T>, format: Option<&str>, filename: &str) -> AppResult<Response> {
    if format == Some("csv") {
        let csv = ReportingService::export_to_csv(&data)?;
        let disposition = format!("attachment; filename=\"{}\"", filename);
        Ok((
            [
                (header::CONTENT_TYPE, "text/csv".to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            csv,
        )
            .into_response())
    } else {
        Ok(Json(data).into_response())
    }
}

/// Stock summary report
pub async fn get_stock_summary_report(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<SummaryReportQuery>,
) -> AppResult<Response> {
    let service = StockSummaryService::new(state.db.clone(), &state.config.inventory)?;
    let filter = SummaryFilter {
        category: query.category,
        status: query.status,
    };
    let rows = service.summary(&filter).await?;
    render(rows, query.format.as_deref(), "stock_summary.csv")
}

/// Posted Stock In report
pub async fn get_stock_in_report(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<MovementReportQuery>,
) -> AppResult<Response> {
    let service = ReportingService::new(state.db.clone());
    let rows = service.posted_stock_ins(&query.filter()).await?;
    render(rows, query.format.as_deref(), "stock_in.csv")
}

/// Posted Stock Out report
pub async fn get_stock_out_report(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<MovementReportQuery>,
) -> AppResult<Response> {
    let service = ReportingService::new(state.db.clone());
    let rows = service.posted_stock_outs(&query.filter()).await?;
    render(rows, query.format.as_deref(), "stock_out.csv")
}
