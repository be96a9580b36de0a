//! Stock Out service
//!
//! Availability is checked with the product row locked, so two issues against the same
//! product cannot both pass the check and overdraw it.

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};

use crate::error::{AppError, AppResult};
use crate::models::{Actor, NewStockOut, StockOut, StockOutChanges, StockOutRow, StockOutStatus};
use crate::services::numbering::next_document_number;
use crate::services::product::fetch_product;
use crate::services::stock_summary::available_stock;
use shared::ledger::LedgerDelta;
use shared::numbering::DocumentKind;
use shared::types::Pagination;
use shared::DomainResult;

#[derive(Clone)]
pub struct StockOutService {
    db: PgPool,
}

#[derive(Debug, Default, Deserialize)]
pub struct StockOutFilter {
    pub status: Option<StockOutStatus>,
    pub product_id: Option<i64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

pub(crate) const STOCK_OUT_COLUMNS: &str = r#"id, reference_number, product_id, date, quantity,
    issued_to_id, technician_id, site, location, request_number, destination_document,
    scheduled_date, status, remarks, year, month, created_by, created_at, updated_at"#;

impl StockOutService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(&self, actor: &Actor, input: NewStockOut) -> AppResult<StockOut> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let product = fetch_product(&mut tx, input.product_id, true).await?;
        let available = available_stock(&mut tx, &product).await?;
        let reference = next_document_number(&mut tx, DocumentKind::StockOut, now.year()).await?;

        let mut record = match StockOut::create(actor, reference, input, available, now) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(product_id = product.id, available = %available, actor = actor.id, "Stock out refused: {}", e);
                return Err(e.into());
            }
        };

        record.id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO stock_outs (
                reference_number, product_id, date, quantity, issued_to_id, technician_id, site,
                location, request_number, destination_document, scheduled_date, status, remarks,
                year, month, created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $17)
            RETURNING id
            "#,
        )
        .bind(&record.reference_number)
        .bind(record.product_id)
        .bind(record.date)
        .bind(record.quantity)
        .bind(record.issued_to_id)
        .bind(record.technician_id)
        .bind(&record.site)
        .bind(&record.location)
        .bind(&record.request_number)
        .bind(&record.destination_document)
        .bind(record.scheduled_date)
        .bind(record.status.as_str())
        .bind(&record.remarks)
        .bind(record.year)
        .bind(record.month as i32)
        .bind(record.created_by)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(
            reference = %record.reference_number,
            product_id = record.product_id,
            quantity = %record.quantity,
            status = %record.status,
            actor = actor.id,
            "Stock out created"
        );
        Ok(record)
    }

    pub async fn get(&self, stock_out_id: i64) -> AppResult<StockOut> {
        let mut conn = self.db.acquire().await?;
        fetch_stock_out(&mut conn, stock_out_id, false).await
    }

    pub async fn list(&self, filter: StockOutFilter) -> AppResult<Vec<StockOut>> {
        let pagination = Pagination::new(filter.page, filter.per_page);
        let rows = sqlx::query_as::<_, StockOutRow>(&format!(
            r#"
            SELECT {}
            FROM stock_outs
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::BIGINT IS NULL OR product_id = $2)
              AND ($3::DATE IS NULL OR date >= $3)
              AND ($4::DATE IS NULL OR date <= $4)
            ORDER BY date DESC, id DESC
            LIMIT $5 OFFSET $6
            "#,
            STOCK_OUT_COLUMNS
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.product_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(StockOutRow::into_domain).collect()
    }

    pub async fn update(
        &self,
        actor: &Actor,
        stock_out_id: i64,
        changes: StockOutChanges,
    ) -> AppResult<StockOut> {
        self.transition(actor, stock_out_id, "updated", move |r, a, available| {
            r.update(a, changes, available, Utc::now())
        })
        .await
    }

    pub async fn ready(&self, actor: &Actor, stock_out_id: i64) -> AppResult<StockOut> {
        self.transition(actor, stock_out_id, "released", |r, a, available| {
            r.ready(a, available, Utc::now())
        })
        .await
    }

    pub async fn complete(&self, actor: &Actor, stock_out_id: i64) -> AppResult<StockOut> {
        self.transition(actor, stock_out_id, "completed", |r, a, available| {
            r.complete(a, available, Utc::now())
        })
        .await
    }

    pub async fn cancel(&self, actor: &Actor, stock_out_id: i64) -> AppResult<StockOut> {
        self.transition(actor, stock_out_id, "cancelled", |r, a, _| r.cancel(a, Utc::now()))
            .await
    }

    pub async fn delete(&self, actor: &Actor, stock_out_id: i64) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let record = fetch_stock_out(&mut tx, stock_out_id, true).await?;
        if let Err(e) = record.ensure_deletable(actor) {
            tracing::warn!(reference = %record.reference_number, actor = actor.id, "Stock out delete refused: {}", e);
            return Err(e.into());
        }

        sqlx::query("DELETE FROM stock_outs WHERE id = $1")
            .bind(stock_out_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(reference = %record.reference_number, actor = actor.id, "Stock out deleted");
        Ok(())
    }

    /// Lock the record and its product, then apply `apply` with the current available stock
    async fn transition<F>(
        &self,
        actor: &Actor,
        stock_out_id: i64,
        verb: &str,
        apply: F,
    ) -> AppResult<StockOut>
    where
        F: FnOnce(&mut StockOut, &Actor, Decimal) -> DomainResult<Option<LedgerDelta>>,
    {
        let mut tx = self.db.begin().await?;
        let mut record = fetch_stock_out(&mut tx, stock_out_id, true).await?;
        let product = fetch_product(&mut tx, record.product_id, true).await?;
        let available = available_stock(&mut tx, &product).await?;
        let from = record.status;

        let delta = match apply(&mut record, actor, available) {
            Ok(delta) => delta,
            Err(e) => {
                tracing::warn!(
                    reference = %record.reference_number,
                    status = %from,
                    available = %available,
                    actor = actor.id,
                    "Stock out transition refused: {}",
                    e
                );
                return Err(e.into());
            }
        };

        save_stock_out(&mut tx, &record).await?;
        tx.commit().await?;

        tracing::info!(
            reference = %record.reference_number,
            from = %from,
            to = %record.status,
            delta = ?delta,
            actor = actor.id,
            "Stock out {}",
            verb
        );
        Ok(record)
    }
}

pub async fn fetch_stock_out(conn: &mut PgConnection, stock_out_id: i64, lock: bool) -> AppResult<StockOut> {
    let mut sql = format!("SELECT {} FROM stock_outs WHERE id = $1", STOCK_OUT_COLUMNS);
    if lock {
        sql.push_str(" FOR UPDATE");
    }
    sqlx::query_as::<_, StockOutRow>(&sql)
        .bind(stock_out_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Stock out {}", stock_out_id)))?
        .into_domain()
}

async fn save_stock_out(conn: &mut PgConnection, record: &StockOut) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE stock_outs
        SET date = $2, quantity = $3, issued_to_id = $4, technician_id = $5, site = $6,
            location = $7, request_number = $8, destination_document = $9, scheduled_date = $10,
            status = $11, remarks = $12, year = $13, month = $14, updated_at = $15
        WHERE id = $1
        "#,
    )
    .bind(record.id)
    .bind(record.date)
    .bind(record.quantity)
    .bind(record.issued_to_id)
    .bind(record.technician_id)
    .bind(&record.site)
    .bind(&record.location)
    .bind(&record.request_number)
    .bind(&record.destination_document)
    .bind(record.scheduled_date)
    .bind(record.status.as_str())
    .bind(&record.remarks)
    .bind(record.year)
    .bind(record.month as i32)
    .bind(record.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
