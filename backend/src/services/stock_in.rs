//! Stock In service
//!
//! Records are derived from a verified Goods Receipt. The receipt row is locked while the
//! allowance is computed so two concurrent creations cannot both claim the same quantity.

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};

use crate::error::{AppError, AppResult};
use crate::models::{
    derive_stock_ins, Actor, GoodsReceipt, NewStockIn, PurchaseRequest, ReceiptAllowance, StockIn,
    StockInChanges, StockInRow, StockInStatus,
};
use crate::services::goods_receipt::fetch_goods_receipt;
use crate::services::numbering::next_document_number;
use crate::services::product::{fetch_all_products, fetch_product};
use crate::services::purchase_request::fetch_purchase_request;
use crate::services::stock_summary::available_stock;
use shared::ledger::LedgerDelta;
use shared::numbering::DocumentKind;
use shared::types::Pagination;
use shared::DomainResult;

#[derive(Clone)]
pub struct StockInService {
    db: PgPool,
}

#[derive(Debug, Default, Deserialize)]
pub struct StockInFilter {
    pub status: Option<StockInStatus>,
    pub product_id: Option<i64>,
    pub goods_receipt_id: Option<i64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

pub(crate) const STOCK_IN_COLUMNS: &str = r#"id, reference_number, goods_receipt_id,
    purchase_request_id, product_id, product_name, date, quantity, unit_price, total_price,
    currency, po_number, invoice_no, vendor_name, grn_no, stock_keeper_id, status, year, month,
    remarks, created_at, updated_at"#;

impl StockInService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(&self, actor: &Actor, input: NewStockIn) -> AppResult<Vec<StockIn>> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let gr = fetch_goods_receipt(&mut tx, input.goods_receipt_id, true).await?;
        if let Err(e) = gr.ensure_stockable() {
            tracing::warn!(grn_number = %gr.grn_number, actor = actor.id, "Stock in refused: {}", e);
            return Err(e.into());
        }
        let pr = fetch_purchase_request(&mut tx, gr.purchase_request_id, false).await?;
        let allowance = load_allowance(&mut tx, &gr, &pr).await?;

        let mut records = derive_stock_ins(actor, &gr, &pr, &allowance, input, now)?;
        for record in records.iter_mut() {
            record.reference_number =
                next_document_number(&mut tx, DocumentKind::StockIn, now.year()).await?;
            record.id = insert_stock_in(&mut tx, record).await?;
        }
        tx.commit().await?;

        for record in &records {
            tracing::info!(
                reference = %record.reference_number,
                grn_no = %record.grn_no,
                product_id = record.product_id,
                quantity = %record.quantity,
                status = %record.status,
                actor = actor.id,
                "Stock in created"
            );
        }
        Ok(records)
    }

    pub async fn get(&self, stock_in_id: i64) -> AppResult<StockIn> {
        let mut conn = self.db.acquire().await?;
        fetch_stock_in(&mut conn, stock_in_id, false).await
    }

    pub async fn list(&self, filter: StockInFilter) -> AppResult<Vec<StockIn>> {
        let pagination = Pagination::new(filter.page, filter.per_page);
        let rows = sqlx::query_as::<_, StockInRow>(&format!(
            r#"
            SELECT {}
            FROM stock_ins
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::BIGINT IS NULL OR product_id = $2)
              AND ($3::BIGINT IS NULL OR goods_receipt_id = $3)
              AND ($4::DATE IS NULL OR date >= $4)
              AND ($5::DATE IS NULL OR date <= $5)
            ORDER BY date DESC, id DESC
            LIMIT $6 OFFSET $7
            "#,
            STOCK_IN_COLUMNS
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.product_id)
        .bind(filter.goods_receipt_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(StockInRow::into_domain).collect()
    }

    pub async fn update(
        &self,
        actor: &Actor,
        stock_in_id: i64,
        changes: StockInChanges,
    ) -> AppResult<StockIn> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let mut record = fetch_stock_in(&mut tx, stock_in_id, true).await?;
        // Serializes with concurrent creations against the same receipt
        let gr = fetch_goods_receipt(&mut tx, record.goods_receipt_id, true).await?;
        let pr = fetch_purchase_request(&mut tx, gr.purchase_request_id, false).await?;
        let allowance = load_allowance(&mut tx, &gr, &pr).await?;
        let product = fetch_product(&mut tx, record.product_id, true).await?;
        let available = available_stock(&mut tx, &product).await?;

        let checked = record
            .update(actor, changes, &allowance, now)
            .and_then(|delta| covered(delta, available));
        let delta = match checked {
            Ok(delta) => delta,
            Err(e) => {
                tracing::warn!(reference = %record.reference_number, actor = actor.id, "Stock in edit refused: {}", e);
                return Err(e.into());
            }
        };

        save_stock_in(&mut tx, &record).await?;
        tx.commit().await?;

        tracing::info!(reference = %record.reference_number, delta = ?delta, actor = actor.id, "Stock in updated");
        Ok(record)
    }

    pub async fn validate(&self, actor: &Actor, stock_in_id: i64) -> AppResult<StockIn> {
        self.transition(actor, stock_in_id, "validated", |r, a| r.validate(a, Utc::now()))
            .await
    }

    pub async fn complete(&self, actor: &Actor, stock_in_id: i64) -> AppResult<StockIn> {
        self.transition(actor, stock_in_id, "completed", |r, a| r.complete(a, Utc::now()))
            .await
    }

    pub async fn cancel(&self, actor: &Actor, stock_in_id: i64) -> AppResult<StockIn> {
        self.transition(actor, stock_in_id, "cancelled", |r, a| r.cancel(a, Utc::now()))
            .await
    }

    pub async fn delete(&self, actor: &Actor, stock_in_id: i64) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let record = fetch_stock_in(&mut tx, stock_in_id, true).await?;
        if let Err(e) = record.ensure_deletable(actor) {
            tracing::warn!(reference = %record.reference_number, actor = actor.id, "Stock in delete refused: {}", e);
            return Err(e.into());
        }

        sqlx::query("DELETE FROM stock_ins WHERE id = $1")
            .bind(stock_in_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(reference = %record.reference_number, actor = actor.id, "Stock in deleted");
        Ok(())
    }

    async fn transition<F>(
        &self,
        actor: &Actor,
        stock_in_id: i64,
        verb: &str,
        apply: F,
    ) -> AppResult<StockIn>
    where
        F: FnOnce(&mut StockIn, &Actor) -> DomainResult<Option<LedgerDelta>>,
    {
        let mut tx = self.db.begin().await?;
        let mut record = fetch_stock_in(&mut tx, stock_in_id, true).await?;
        let product = fetch_product(&mut tx, record.product_id, true).await?;
        let available = available_stock(&mut tx, &product).await?;
        let from = record.status;

        let delta = match apply(&mut record, actor).and_then(|delta| covered(delta, available)) {
            Ok(delta) => delta,
            Err(e) => {
                tracing::warn!(reference = %record.reference_number, status = %from, available = %available, actor = actor.id, "Stock in transition refused: {}", e);
                return Err(e.into());
            }
        };

        save_stock_in(&mut tx, &record).await?;
        tx.commit().await?;

        tracing::info!(
            reference = %record.reference_number,
            from = %from,
            to = %record.status,
            delta = ?delta,
            actor = actor.id,
            "Stock in {}",
            verb
        );
        Ok(record)
    }
}

/// A reversal may not take more than is still on hand
fn covered(delta: Option<LedgerDelta>, available: Decimal) -> DomainResult<Option<LedgerDelta>> {
    if let Some(d) = &delta {
        d.ensure_covered(available)?;
    }
    Ok(delta)
}

/// Allowance for a receipt the caller has already locked
async fn load_allowance(
    conn: &mut PgConnection,
    gr: &GoodsReceipt,
    pr: &PurchaseRequest,
) -> AppResult<ReceiptAllowance> {
    let products = fetch_all_products(conn).await?;
    let existing = sqlx::query_as::<_, StockInRow>(&format!(
        "SELECT {} FROM stock_ins WHERE goods_receipt_id = $1 ORDER BY id",
        STOCK_IN_COLUMNS
    ))
    .bind(gr.id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(StockInRow::into_domain)
    .collect::<AppResult<Vec<_>>>()?;

    Ok(ReceiptAllowance::compute(gr, pr, &products, &existing)?)
}

pub async fn fetch_stock_in(conn: &mut PgConnection, stock_in_id: i64, lock: bool) -> AppResult<StockIn> {
    let mut sql = format!("SELECT {} FROM stock_ins WHERE id = $1", STOCK_IN_COLUMNS);
    if lock {
        sql.push_str(" FOR UPDATE");
    }
    sqlx::query_as::<_, StockInRow>(&sql)
        .bind(stock_in_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Stock in {}", stock_in_id)))?
        .into_domain()
}

async fn insert_stock_in(conn: &mut PgConnection, record: &StockIn) -> AppResult<i64> {
    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO stock_ins (
            reference_number, goods_receipt_id, purchase_request_id, product_id, product_name,
            date, quantity, unit_price, total_price, currency, po_number, invoice_no,
            vendor_name, grn_no, stock_keeper_id, status, year, month, remarks, created_at,
            updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                $18, $19, $20, $20)
        RETURNING id
        "#,
    )
    .bind(&record.reference_number)
    .bind(record.goods_receipt_id)
    .bind(record.purchase_request_id)
    .bind(record.product_id)
    .bind(&record.product_name)
    .bind(record.date)
    .bind(record.quantity)
    .bind(record.unit_price)
    .bind(record.total_price)
    .bind(record.currency.as_str())
    .bind(&record.po_number)
    .bind(&record.invoice_no)
    .bind(&record.vendor_name)
    .bind(&record.grn_no)
    .bind(record.stock_keeper_id)
    .bind(record.status.as_str())
    .bind(record.year)
    .bind(record.month as i32)
    .bind(&record.remarks)
    .bind(record.created_at)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

async fn save_stock_in(conn: &mut PgConnection, record: &StockIn) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE stock_ins
        SET date = $2, quantity = $3, unit_price = $4, total_price = $5, status = $6,
            year = $7, month = $8, remarks = $9, updated_at = $10
        WHERE id = $1
        "#,
    )
    .bind(record.id)
    .bind(record.date)
    .bind(record.quantity)
    .bind(record.unit_price)
    .bind(record.total_price)
    .bind(record.status.as_str())
    .bind(record.year)
    .bind(record.month as i32)
    .bind(&record.remarks)
    .bind(record.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
