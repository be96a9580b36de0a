//! Goods Receipt service
//!
//! Verification is the one cross-document write: the receipt row is locked first, then its
//! purchase request, and both are updated in a single transaction.

use std::collections::HashMap;

use chrono::{Datelike, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};

use crate::error::{AppError, AppResult};
use crate::models::{
    Actor, GoodsReceipt, GoodsReceiptChanges, GoodsReceiptRow, GrItemRow, GrStatus,
    NewGoodsReceipt,
};
use crate::services::numbering::next_document_number;
use crate::services::purchase_request::{fetch_purchase_request, save_received, RejectInput};
use shared::numbering::DocumentKind;
use shared::types::Pagination;

#[derive(Clone)]
pub struct GoodsReceiptService {
    db: PgPool,
}

#[derive(Debug, Default, Deserialize)]
pub struct GoodsReceiptFilter {
    pub status: Option<GrStatus>,
    pub purchase_request_id: Option<i64>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

const GR_COLUMNS: &str = r#"id, grn_number, purchase_request_id, pr_number, status, condition,
    received_date, received_by, verified_by, verified_at, invoice_no, delivery_note, remarks,
    rejection_reason, rejected_by, rejected_at, created_at, updated_at"#;

const GR_ITEM_COLUMNS: &str = r#"goods_receipt_id, line_no, pr_line_no, product_id, product_name,
    unit, quantity_expected, quantity_received, condition, over_received, remarks"#;

impl GoodsReceiptService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(&self, actor: &Actor, input: NewGoodsReceipt) -> AppResult<GoodsReceipt> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let pr = fetch_purchase_request(&mut tx, input.purchase_request_id, true).await?;
        let grn_number = next_document_number(&mut tx, DocumentKind::GoodsReceipt, now.year()).await?;
        let mut gr = match GoodsReceipt::from_purchase_request(actor, grn_number, &pr, input, now) {
            Ok(gr) => gr,
            Err(e) => {
                tracing::warn!(pr_number = %pr.pr_number, actor = actor.id, "Goods receipt refused: {}", e);
                return Err(e.into());
            }
        };

        gr.id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO goods_receipts (
                grn_number, purchase_request_id, pr_number, status, condition, received_date,
                received_by, invoice_no, delivery_note, remarks, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING id
            "#,
        )
        .bind(&gr.grn_number)
        .bind(gr.purchase_request_id)
        .bind(&gr.pr_number)
        .bind(gr.status.as_str())
        .bind(gr.condition.as_str())
        .bind(gr.received_date)
        .bind(gr.received_by)
        .bind(&gr.invoice_no)
        .bind(&gr.delivery_note)
        .bind(&gr.remarks)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        for item in &gr.items {
            sqlx::query(
                r#"
                INSERT INTO goods_receipt_items (
                    goods_receipt_id, line_no, pr_line_no, product_id, product_name, unit,
                    quantity_expected, quantity_received, condition, over_received, remarks
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(gr.id)
            .bind(item.line_no)
            .bind(item.pr_line_no)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(&item.unit)
            .bind(item.quantity_expected)
            .bind(item.quantity_received)
            .bind(item.condition.map(|c| c.as_str()))
            .bind(item.over_received)
            .bind(&item.remarks)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::info!(
            grn_number = %gr.grn_number,
            pr_number = %gr.pr_number,
            status = %gr.status,
            actor = actor.id,
            "Goods receipt created"
        );
        Ok(gr)
    }

    pub async fn get(&self, gr_id: i64) -> AppResult<GoodsReceipt> {
        let mut conn = self.db.acquire().await?;
        fetch_goods_receipt(&mut conn, gr_id, false).await
    }

    pub async fn list(&self, filter: GoodsReceiptFilter) -> AppResult<Vec<GoodsReceipt>> {
        let pagination = Pagination::new(filter.page, filter.per_page);
        let rows = sqlx::query_as::<_, GoodsReceiptRow>(&format!(
            r#"
            SELECT {}
            FROM goods_receipts
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::BIGINT IS NULL OR purchase_request_id = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
            GR_COLUMNS
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.purchase_request_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let items = sqlx::query_as::<_, GrItemRow>(&format!(
            r#"
            SELECT {}
            FROM goods_receipt_items
            WHERE goods_receipt_id = ANY($1)
            ORDER BY goods_receipt_id, line_no
            "#,
            GR_ITEM_COLUMNS
        ))
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let mut grouped: HashMap<i64, Vec<GrItemRow>> = HashMap::new();
        for item in items {
            grouped.entry(item.goods_receipt_id).or_default().push(item);
        }
        rows.into_iter()
            .map(|row| {
                let own = grouped.remove(&row.id).unwrap_or_default();
                row.into_domain(own)
            })
            .collect()
    }

    pub async fn update(
        &self,
        actor: &Actor,
        gr_id: i64,
        changes: GoodsReceiptChanges,
    ) -> AppResult<GoodsReceipt> {
        let mut tx = self.db.begin().await?;
        let mut gr = fetch_goods_receipt(&mut tx, gr_id, true).await?;

        if let Err(e) = gr.update(actor, changes, Utc::now()) {
            tracing::warn!(grn_number = %gr.grn_number, actor = actor.id, "Goods receipt edit refused: {}", e);
            return Err(e.into());
        }

        save_header(&mut tx, &gr).await?;
        save_items(&mut tx, &gr).await?;
        tx.commit().await?;

        tracing::info!(grn_number = %gr.grn_number, status = %gr.status, actor = actor.id, "Goods receipt updated");
        Ok(gr)
    }

    /// Verify and add received quantities to the purchase request, all or nothing
    pub async fn verify(&self, actor: &Actor, gr_id: i64) -> AppResult<GoodsReceipt> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let mut gr = fetch_goods_receipt(&mut tx, gr_id, true).await?;
        let mut pr = fetch_purchase_request(&mut tx, gr.purchase_request_id, true).await?;

        let increments = match gr.verify(actor, &mut pr, now) {
            Ok(increments) => increments,
            Err(e) => {
                tracing::warn!(grn_number = %gr.grn_number, actor = actor.id, "Goods receipt verification refused: {}", e);
                return Err(e.into());
            }
        };

        save_header(&mut tx, &gr).await?;
        save_received(&mut tx, &pr, &increments).await?;
        tx.commit().await?;

        tracing::info!(
            grn_number = %gr.grn_number,
            pr_number = %pr.pr_number,
            lines = increments.len(),
            actor = actor.id,
            "Goods receipt verified"
        );
        Ok(gr)
    }

    pub async fn reject(&self, actor: &Actor, gr_id: i64, input: RejectInput) -> AppResult<GoodsReceipt> {
        let mut tx = self.db.begin().await?;
        let mut gr = fetch_goods_receipt(&mut tx, gr_id, true).await?;

        if let Err(e) = gr.reject(actor, &input.reason, Utc::now()) {
            tracing::warn!(grn_number = %gr.grn_number, actor = actor.id, "Goods receipt rejection refused: {}", e);
            return Err(e.into());
        }

        save_header(&mut tx, &gr).await?;
        tx.commit().await?;

        tracing::info!(grn_number = %gr.grn_number, actor = actor.id, "Goods receipt rejected");
        Ok(gr)
    }

    pub async fn delete(&self, actor: &Actor, gr_id: i64) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let gr = fetch_goods_receipt(&mut tx, gr_id, true).await?;
        if let Err(e) = gr.ensure_deletable(actor) {
            tracing::warn!(grn_number = %gr.grn_number, actor = actor.id, "Goods receipt delete refused: {}", e);
            return Err(e.into());
        }

        sqlx::query("DELETE FROM goods_receipts WHERE id = $1")
            .bind(gr_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(grn_number = %gr.grn_number, actor = actor.id, "Goods receipt deleted");
        Ok(())
    }
}

/// Load a receipt with its lines
pub async fn fetch_goods_receipt(
    conn: &mut PgConnection,
    gr_id: i64,
    lock: bool,
) -> AppResult<GoodsReceipt> {
    let mut sql = format!("SELECT {} FROM goods_receipts WHERE id = $1", GR_COLUMNS);
    if lock {
        sql.push_str(" FOR UPDATE");
    }
    let row = sqlx::query_as::<_, GoodsReceiptRow>(&sql)
        .bind(gr_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Goods receipt {}", gr_id)))?;

    let items = sqlx::query_as::<_, GrItemRow>(&format!(
        "SELECT {} FROM goods_receipt_items WHERE goods_receipt_id = $1 ORDER BY line_no",
        GR_ITEM_COLUMNS
    ))
    .bind(gr_id)
    .fetch_all(&mut *conn)
    .await?;

    row.into_domain(items)
}

async fn save_header(conn: &mut PgConnection, gr: &GoodsReceipt) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE goods_receipts
        SET status = $2, condition = $3, received_date = $4, verified_by = $5, verified_at = $6,
            invoice_no = $7, delivery_note = $8, remarks = $9, rejection_reason = $10,
            rejected_by = $11, rejected_at = $12, updated_at = $13
        WHERE id = $1
        "#,
    )
    .bind(gr.id)
    .bind(gr.status.as_str())
    .bind(gr.condition.as_str())
    .bind(gr.received_date)
    .bind(gr.verified_by)
    .bind(gr.verified_at)
    .bind(&gr.invoice_no)
    .bind(&gr.delivery_note)
    .bind(&gr.remarks)
    .bind(&gr.rejection_reason)
    .bind(gr.rejected_by)
    .bind(gr.rejected_at)
    .bind(gr.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn save_items(conn: &mut PgConnection, gr: &GoodsReceipt) -> AppResult<()> {
    for item in &gr.items {
        sqlx::query(
            r#"
            UPDATE goods_receipt_items
            SET quantity_received = $3, condition = $4, over_received = $5, remarks = $6
            WHERE goods_receipt_id = $1 AND line_no = $2
            "#,
        )
        .bind(gr.id)
        .bind(item.line_no)
        .bind(item.quantity_received)
        .bind(item.condition.map(|c| c.as_str()))
        .bind(item.over_received)
        .bind(&item.remarks)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}
