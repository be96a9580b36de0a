//! Stock summary service
//!
//! Totals are aggregated in SQL from the posted statuses only, so a status flip and its
//! effect on available stock always commit together.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool};

use crate::config::InventoryConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    Product, ProductRow, StockInStatus, StockOutStatus, StockSummary, SummaryFilter,
    SummaryTotals,
};
use shared::ledger::ProductTotals;
use shared::types::{Currency, CurrencyConverter};

#[derive(Clone)]
pub struct StockSummaryService {
    db: PgPool,
    threshold: Decimal,
    converter: CurrencyConverter,
    currency: Currency,
}

#[derive(Debug, FromRow)]
struct SummaryRow {
    id: i64,
    name: String,
    category: String,
    unit: String,
    opening_stock: Decimal,
    unit_price: Decimal,
    currency: String,
    created_at: DateTime<Utc>,
    total_in: Decimal,
    total_out: Decimal,
}

impl SummaryRow {
    fn into_summary(self, threshold: Decimal) -> AppResult<StockSummary> {
        let (total_in, total_out) = (self.total_in, self.total_out);
        let product = ProductRow {
            id: self.id,
            name: self.name,
            category: self.category,
            unit: self.unit,
            opening_stock: self.opening_stock,
            unit_price: self.unit_price,
            currency: self.currency,
            created_at: self.created_at,
        }
        .into_domain()?;
        Ok(StockSummary::compute(&product, total_in, total_out, threshold))
    }
}

pub(crate) fn posted_stock_in() -> Vec<String> {
    StockInStatus::POSTED.iter().map(|s| s.as_str().to_string()).collect()
}

pub(crate) fn posted_stock_out() -> Vec<String> {
    StockOutStatus::POSTED.iter().map(|s| s.as_str().to_string()).collect()
}

const SUMMARY_QUERY: &str = r#"
    SELECT p.id, p.name, p.category, p.unit, p.opening_stock, p.unit_price, p.currency,
           p.created_at,
           COALESCE((SELECT SUM(si.quantity) FROM stock_ins si
                     WHERE si.product_id = p.id AND si.status = ANY($1)), 0) AS total_in,
           COALESCE((SELECT SUM(so.quantity) FROM stock_outs so
                     WHERE so.product_id = p.id AND so.status = ANY($2)), 0) AS total_out
    FROM products p
    WHERE ($3::BIGINT IS NULL OR p.id = $3)
    ORDER BY p.category, p.name
"#;

impl StockSummaryService {
    pub fn new(db: PgPool, config: &InventoryConfig) -> AppResult<Self> {
        Ok(Self {
            db,
            threshold: config.threshold(),
            converter: config.converter()?,
            currency: config.reporting_currency,
        })
    }

    async fn rows(&self, product_id: Option<i64>) -> AppResult<Vec<StockSummary>> {
        let rows = sqlx::query_as::<_, SummaryRow>(SUMMARY_QUERY)
            .bind(posted_stock_in())
            .bind(posted_stock_out())
            .bind(product_id)
            .fetch_all(&self.db)
            .await?;
        rows.into_iter()
            .map(|r| r.into_summary(self.threshold))
            .collect()
    }

    /// Per-product summary, optionally filtered by category and stock band
    pub async fn summary(&self, filter: &SummaryFilter) -> AppResult<Vec<StockSummary>> {
        Ok(self
            .rows(None)
            .await?
            .into_iter()
            .filter(|row| filter.matches(row))
            .collect())
    }

    /// Category and grand totals in the reporting currency
    pub async fn totals(&self, filter: &SummaryFilter) -> AppResult<SummaryTotals> {
        let rows = self.summary(filter).await?;
        Ok(SummaryTotals::aggregate(&rows, &self.converter, self.currency))
    }

    pub async fn for_product(&self, product_id: i64) -> AppResult<StockSummary> {
        self.rows(Some(product_id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("Product {}", product_id)))
    }
}

/// Posted totals for one product as seen by the current transaction
pub async fn product_totals(conn: &mut PgConnection, product: &Product) -> AppResult<ProductTotals> {
    let (total_in, total_out) = sqlx::query_as::<_, (Decimal, Decimal)>(
        r#"
        SELECT
            COALESCE((SELECT SUM(quantity) FROM stock_ins
                      WHERE product_id = $1 AND status = ANY($2)), 0),
            COALESCE((SELECT SUM(quantity) FROM stock_outs
                      WHERE product_id = $1 AND status = ANY($3)), 0)
        "#,
    )
    .bind(product.id)
    .bind(posted_stock_in())
    .bind(posted_stock_out())
    .fetch_one(&mut *conn)
    .await?;

    Ok(ProductTotals {
        opening_stock: product.opening_stock,
        total_in,
        total_out,
    })
}

/// Available stock for a product whose row the caller has locked
pub async fn available_stock(conn: &mut PgConnection, product: &Product) -> AppResult<Decimal> {
    Ok(product_totals(conn, product).await?.available())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posted_status_names() {
        assert_eq!(posted_stock_in(), vec!["validated", "done"]);
        assert_eq!(posted_stock_out(), vec!["ready", "done"]);
    }
}
