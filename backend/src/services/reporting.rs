//! Reporting service for read-only listings and CSV export
//!
//! Only posted records appear in the movement reports; drafts and cancellations never
//! reach an export.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::services::stock_summary::{posted_stock_in, posted_stock_out};

/// Reporting service
#[derive(Clone)]
pub struct ReportingService {
    db: PgPool,
}

/// Date window for movement reports; both ends inclusive and optional
#[derive(Debug, Default, Deserialize)]
pub struct ReportFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub product_id: Option<i64>,
}

/// Posted Stock In line
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct StockInReportRow {
    pub reference_number: String,
    pub date: NaiveDate,
    pub product_id: i64,
    pub product_name: String,
    pub category: String,
    pub unit: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub currency: String,
    pub po_number: String,
    pub grn_no: String,
    pub invoice_no: Option<String>,
    pub vendor_name: Option<String>,
    pub status: String,
}

/// Posted Stock Out line
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct StockOutReportRow {
    pub reference_number: String,
    pub date: NaiveDate,
    pub product_id: i64,
    pub product_name: String,
    pub category: String,
    pub unit: String,
    pub quantity: Decimal,
    pub site: Option<String>,
    pub location: Option<String>,
    pub request_number: Option<String>,
    pub destination_document: Option<String>,
    pub status: String,
}

impl ReportingService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn posted_stock_ins(&self, filter: &ReportFilter) -> AppResult<Vec<StockInReportRow>> {
        let rows = sqlx::query_as::<_, StockInReportRow>(
            r#"
            SELECT si.reference_number, si.date, si.product_id, si.product_name, p.category,
                   p.unit, si.quantity, si.unit_price, si.total_price, si.currency,
                   si.po_number, si.grn_no, si.invoice_no, si.vendor_name, si.status
            FROM stock_ins si
            JOIN products p ON p.id = si.product_id
            WHERE si.status = ANY($1)
              AND ($2::DATE IS NULL OR si.date >= $2)
              AND ($3::DATE IS NULL OR si.date <= $3)
              AND ($4::BIGINT IS NULL OR si.product_id = $4)
            ORDER BY si.date, si.reference_number
            "#,
        )
        .bind(posted_stock_in())
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.product_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    pub async fn posted_stock_outs(&self, filter: &ReportFilter) -> AppResult<Vec<StockOutReportRow>> {
        let rows = sqlx::query_as::<_, StockOutReportRow>(
            r#"
            SELECT so.reference_number, so.date, so.product_id, p.name AS product_name,
                   p.category, p.unit, so.quantity, so.site, so.location, so.request_number,
                   so.destination_document, so.status
            FROM stock_outs so
            JOIN products p ON p.id = so.product_id
            WHERE so.status = ANY($1)
              AND ($2::DATE IS NULL OR so.date >= $2)
              AND ($3::DATE IS NULL OR so.date <= $3)
              AND ($4::BIGINT IS NULL OR so.product_id = $4)
            ORDER BY so.date, so.reference_number
            "#,
        )
        .bind(posted_stock_out())
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.product_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    /// Export data to CSV format
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }
}
