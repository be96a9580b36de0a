//! Purchase Request service
//!
//! Every mutation loads the request under `FOR UPDATE`, runs the transition from the
//! shared engine and persists the result in the same transaction.

use std::collections::HashMap;

use chrono::{Datelike, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};

use crate::error::{AppError, AppResult};
use crate::models::{
    Actor, NewPurchaseRequest, PrItemRow, PrReceiptIncrement, PrStatus, PurchaseRequest,
    PurchaseRequestChanges, PurchaseRequestRow,
};
use crate::services::numbering::next_document_number;
use crate::services::product::ensure_products_exist;
use shared::numbering::DocumentKind;
use shared::types::Pagination;

#[derive(Clone)]
pub struct PurchaseRequestService {
    db: PgPool,
}

#[derive(Debug, Default, Deserialize)]
pub struct PurchaseRequestFilter {
    pub status: Option<PrStatus>,
    pub requested_by: Option<i64>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RejectInput {
    pub reason: String,
}

const PR_COLUMNS: &str = r#"id, pr_number, status, priority, requested_by, requested_date,
    required_date, department, vendor_name, currency, total_estimated_cost, justification,
    rejection_reason, approved_by, approved_at, rejected_by, rejected_at, cancelled_at,
    created_at, updated_at"#;

const PR_ITEM_COLUMNS: &str = r#"purchase_request_id, line_no, product_id, product_name, unit,
    quantity, unit_price, total_price, quantity_received, justification, specifications"#;

impl PurchaseRequestService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(&self, actor: &Actor, input: NewPurchaseRequest) -> AppResult<PurchaseRequest> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        ensure_products_exist(
            &mut tx,
            input.items.iter().map(|l| l.product_id).enumerate().collect::<Vec<_>>(),
            "items",
        )
        .await?;

        let pr_number = next_document_number(&mut tx, DocumentKind::PurchaseRequest, now.year()).await?;
        let mut pr = PurchaseRequest::draft(actor, pr_number, input, now)?;

        pr.id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO purchase_requests (
                pr_number, status, priority, requested_by, requested_date, required_date,
                department, vendor_name, currency, total_estimated_cost, justification,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
            RETURNING id
            "#,
        )
        .bind(&pr.pr_number)
        .bind(pr.status.as_str())
        .bind(pr.priority.as_str())
        .bind(pr.requested_by)
        .bind(pr.requested_date)
        .bind(pr.required_date)
        .bind(&pr.department)
        .bind(&pr.vendor_name)
        .bind(pr.currency.as_str())
        .bind(pr.total_estimated_cost)
        .bind(&pr.justification)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        replace_items(&mut tx, &pr).await?;
        tx.commit().await?;

        tracing::info!(
            pr_number = %pr.pr_number,
            actor = actor.id,
            total = %pr.total_estimated_cost,
            "Purchase request created"
        );
        Ok(pr)
    }

    pub async fn get(&self, pr_id: i64) -> AppResult<PurchaseRequest> {
        let mut conn = self.db.acquire().await?;
        fetch_purchase_request(&mut conn, pr_id, false).await
    }

    pub async fn list(&self, filter: PurchaseRequestFilter) -> AppResult<Vec<PurchaseRequest>> {
        let pagination = Pagination::new(filter.page, filter.per_page);
        let rows = sqlx::query_as::<_, PurchaseRequestRow>(&format!(
            r#"
            SELECT {}
            FROM purchase_requests
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::BIGINT IS NULL OR requested_by = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
            PR_COLUMNS
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.requested_by)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let mut conn = self.db.acquire().await?;
        attach_items(&mut conn, rows).await
    }

    /// Approved requests that still have quantity outstanding
    pub async fn list_receivable(&self) -> AppResult<Vec<PurchaseRequest>> {
        let rows = sqlx::query_as::<_, PurchaseRequestRow>(&format!(
            r#"
            SELECT {}
            FROM purchase_requests pr
            WHERE pr.status = $1
              AND EXISTS (
                  SELECT 1 FROM purchase_request_items i
                  WHERE i.purchase_request_id = pr.id AND i.quantity_received < i.quantity
              )
            ORDER BY pr.approved_at, pr.id
            "#,
            PR_COLUMNS
        ))
        .bind(PrStatus::Approved.as_str())
        .fetch_all(&self.db)
        .await?;

        let mut conn = self.db.acquire().await?;
        attach_items(&mut conn, rows).await
    }

    pub async fn update(
        &self,
        actor: &Actor,
        pr_id: i64,
        changes: PurchaseRequestChanges,
    ) -> AppResult<PurchaseRequest> {
        let mut tx = self.db.begin().await?;
        let mut pr = fetch_purchase_request(&mut tx, pr_id, true).await?;

        if let Some(items) = &changes.items {
            ensure_products_exist(
                &mut tx,
                items.iter().map(|l| l.product_id).enumerate().collect::<Vec<_>>(),
                "items",
            )
            .await?;
        }
        let items_changed = changes.items.is_some();
        pr.update(actor, changes, Utc::now())?;

        save_header(&mut tx, &pr).await?;
        if items_changed {
            replace_items(&mut tx, &pr).await?;
        }
        tx.commit().await?;

        tracing::info!(pr_number = %pr.pr_number, actor = actor.id, "Purchase request updated");
        Ok(pr)
    }

    pub async fn submit(&self, actor: &Actor, pr_id: i64) -> AppResult<PurchaseRequest> {
        self.transition(actor, pr_id, "submitted", |pr, actor| pr.submit(actor, Utc::now()))
            .await
    }

    pub async fn approve(&self, actor: &Actor, pr_id: i64) -> AppResult<PurchaseRequest> {
        self.transition(actor, pr_id, "approved", |pr, actor| pr.approve(actor, Utc::now()))
            .await
    }

    pub async fn reject(&self, actor: &Actor, pr_id: i64, input: RejectInput) -> AppResult<PurchaseRequest> {
        self.transition(actor, pr_id, "rejected", |pr, actor| {
            pr.reject(actor, &input.reason, Utc::now())
        })
        .await
    }

    pub async fn cancel(&self, actor: &Actor, pr_id: i64) -> AppResult<PurchaseRequest> {
        self.transition(actor, pr_id, "cancelled", |pr, actor| pr.cancel(actor, Utc::now()))
            .await
    }

    pub async fn delete(&self, actor: &Actor, pr_id: i64) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let pr = fetch_purchase_request(&mut tx, pr_id, true).await?;
        if let Err(e) = pr.ensure_deletable(actor) {
            tracing::warn!(pr_number = %pr.pr_number, actor = actor.id, "Purchase request delete refused: {}", e);
            return Err(e.into());
        }

        sqlx::query("DELETE FROM purchase_requests WHERE id = $1")
            .bind(pr_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(pr_number = %pr.pr_number, actor = actor.id, "Purchase request deleted");
        Ok(())
    }

    /// Lock, apply a status transition and persist the header
    async fn transition<F>(
        &self,
        actor: &Actor,
        pr_id: i64,
        verb: &str,
        apply: F,
    ) -> AppResult<PurchaseRequest>
    where
        F: FnOnce(&mut PurchaseRequest, &Actor) -> shared::DomainResult<()>,
    {
        let mut tx = self.db.begin().await?;
        let mut pr = fetch_purchase_request(&mut tx, pr_id, true).await?;
        let from = pr.status;

        if let Err(e) = apply(&mut pr, actor) {
            tracing::warn!(pr_number = %pr.pr_number, status = %from, actor = actor.id, "Purchase request transition refused: {}", e);
            return Err(e.into());
        }

        save_header(&mut tx, &pr).await?;
        tx.commit().await?;

        tracing::info!(
            pr_number = %pr.pr_number,
            from = %from,
            to = %pr.status,
            actor = actor.id,
            "Purchase request {}",
            verb
        );
        Ok(pr)
    }
}

/// Load a request with its lines
pub async fn fetch_purchase_request(
    conn: &mut PgConnection,
    pr_id: i64,
    lock: bool,
) -> AppResult<PurchaseRequest> {
    let mut sql = format!("SELECT {} FROM purchase_requests WHERE id = $1", PR_COLUMNS);
    if lock {
        sql.push_str(" FOR UPDATE");
    }
    let row = sqlx::query_as::<_, PurchaseRequestRow>(&sql)
        .bind(pr_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Purchase request {}", pr_id)))?;

    let items = sqlx::query_as::<_, PrItemRow>(&format!(
        "SELECT {} FROM purchase_request_items WHERE purchase_request_id = $1 ORDER BY line_no",
        PR_ITEM_COLUMNS
    ))
    .bind(pr_id)
    .fetch_all(&mut *conn)
    .await?;

    row.into_domain(items)
}

async fn attach_items(
    conn: &mut PgConnection,
    rows: Vec<PurchaseRequestRow>,
) -> AppResult<Vec<PurchaseRequest>> {
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let items = sqlx::query_as::<_, PrItemRow>(&format!(
        r#"
        SELECT {}
        FROM purchase_request_items
        WHERE purchase_request_id = ANY($1)
        ORDER BY purchase_request_id, line_no
        "#,
        PR_ITEM_COLUMNS
    ))
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut grouped: HashMap<i64, Vec<PrItemRow>> = HashMap::new();
    for item in items {
        grouped.entry(item.purchase_request_id).or_default().push(item);
    }
    rows.into_iter()
        .map(|row| {
            let own = grouped.remove(&row.id).unwrap_or_default();
            row.into_domain(own)
        })
        .collect()
}

async fn save_header(conn: &mut PgConnection, pr: &PurchaseRequest) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE purchase_requests
        SET status = $2, priority = $3, required_date = $4, department = $5,
            vendor_name = $6, currency = $7, total_estimated_cost = $8, justification = $9,
            rejection_reason = $10, approved_by = $11, approved_at = $12, rejected_by = $13,
            rejected_at = $14, cancelled_at = $15, updated_at = $16
        WHERE id = $1
        "#,
    )
    .bind(pr.id)
    .bind(pr.status.as_str())
    .bind(pr.priority.as_str())
    .bind(pr.required_date)
    .bind(&pr.department)
    .bind(&pr.vendor_name)
    .bind(pr.currency.as_str())
    .bind(pr.total_estimated_cost)
    .bind(&pr.justification)
    .bind(&pr.rejection_reason)
    .bind(pr.approved_by)
    .bind(pr.approved_at)
    .bind(pr.rejected_by)
    .bind(pr.rejected_at)
    .bind(pr.cancelled_at)
    .bind(pr.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn replace_items(conn: &mut PgConnection, pr: &PurchaseRequest) -> AppResult<()> {
    sqlx::query("DELETE FROM purchase_request_items WHERE purchase_request_id = $1")
        .bind(pr.id)
        .execute(&mut *conn)
        .await?;

    for item in &pr.items {
        sqlx::query(
            r#"
            INSERT INTO purchase_request_items (
                purchase_request_id, line_no, product_id, product_name, unit, quantity,
                unit_price, total_price, quantity_received, justification, specifications
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(pr.id)
        .bind(item.line_no)
        .bind(item.product_id)
        .bind(&item.product_name)
        .bind(&item.unit)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.total_price)
        .bind(item.quantity_received)
        .bind(&item.justification)
        .bind(&item.specifications)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Persist received quantities added by a verified Goods Receipt
pub async fn save_received(
    conn: &mut PgConnection,
    pr: &PurchaseRequest,
    increments: &[PrReceiptIncrement],
) -> AppResult<()> {
    for inc in increments {
        let line = pr.line(inc.line_no).ok_or_else(|| {
            AppError::Internal(format!("Line {} missing from {}", inc.line_no, pr.pr_number))
        })?;
        sqlx::query(
            r#"
            UPDATE purchase_request_items
            SET quantity_received = $3
            WHERE purchase_request_id = $1 AND line_no = $2
            "#,
        )
        .bind(pr.id)
        .bind(inc.line_no)
        .bind(line.quantity_received)
        .execute(&mut *conn)
        .await?;
    }
    sqlx::query("UPDATE purchase_requests SET updated_at = $2 WHERE id = $1")
        .bind(pr.id)
        .bind(pr.updated_at)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
