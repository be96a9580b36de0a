//! Database models for the inventory ledger server
//!
//! Re-exports the domain models from the shared crate and adds the `FromRow` shapes
//! they are loaded from. Status and enum columns are stored as text; a value the
//! domain does not recognise is an internal error, never a silent default.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

pub use shared::models::*;
use shared::types::Currency;

use crate::error::{AppError, AppResult};

fn parse_column<T>(parsed: Option<T>, column: &str, value: &str) -> AppResult<T> {
    parsed.ok_or_else(|| AppError::Internal(format!("Unknown {} '{}' in database", column, value)))
}

fn parse_currency(value: &str) -> AppResult<Currency> {
    parse_column(Currency::from_str(value), "currency", value)
}

fn parse_month(month: i32) -> AppResult<u32> {
    u32::try_from(month).map_err(|_| AppError::Internal(format!("Invalid month {} in database", month)))
}

#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl UserRow {
    pub fn into_domain(self) -> AppResult<User> {
        Ok(User {
            role: parse_column(Role::from_str(&self.role), "role", &self.role)?,
            id: self.id,
            username: self.username,
            full_name: self.full_name,
            is_active: self.is_active,
            created_at: self.created_at,
        })
    }
}

/// Credentials row used only by login
#[derive(Debug, FromRow)]
pub struct CredentialRow {
    pub id: i64,
    pub role: String,
    pub password_hash: String,
    pub is_active: bool,
}

#[derive(Debug, FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub unit: String,
    pub opening_stock: Decimal,
    pub unit_price: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl ProductRow {
    pub fn into_domain(self) -> AppResult<Product> {
        Ok(Product {
            currency: parse_currency(&self.currency)?,
            id: self.id,
            name: self.name,
            category: self.category,
            unit: self.unit,
            opening_stock: self.opening_stock,
            unit_price: self.unit_price,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct PurchaseRequestRow {
    pub id: i64,
    pub pr_number: String,
    pub status: String,
    pub priority: String,
    pub requested_by: i64,
    pub requested_date: NaiveDate,
    pub required_date: Option<NaiveDate>,
    pub department: Option<String>,
    pub vendor_name: Option<String>,
    pub currency: String,
    pub total_estimated_cost: Decimal,
    pub justification: Option<String>,
    pub rejection_reason: Option<String>,
    pub approved_by: Option<i64>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<i64>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct PrItemRow {
    pub purchase_request_id: i64,
    pub line_no: i32,
    pub product_id: Option<i64>,
    pub product_name: Option<String>,
    pub unit: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub quantity_received: Decimal,
    pub justification: Option<String>,
    pub specifications: Option<String>,
}

impl PrItemRow {
    pub fn into_domain(self) -> PrLineItem {
        PrLineItem {
            line_no: self.line_no,
            product_id: self.product_id,
            product_name: self.product_name,
            unit: self.unit,
            quantity: self.quantity,
            unit_price: self.unit_price,
            total_price: self.total_price,
            quantity_received: self.quantity_received,
            justification: self.justification,
            specifications: self.specifications,
        }
    }
}

impl PurchaseRequestRow {
    pub fn into_domain(self, items: Vec<PrItemRow>) -> AppResult<PurchaseRequest> {
        Ok(PurchaseRequest {
            status: parse_column(PrStatus::from_str(&self.status), "status", &self.status)?,
            priority: parse_column(Priority::from_str(&self.priority), "priority", &self.priority)?,
            currency: parse_currency(&self.currency)?,
            id: self.id,
            pr_number: self.pr_number,
            requested_by: self.requested_by,
            requested_date: self.requested_date,
            required_date: self.required_date,
            department: self.department,
            vendor_name: self.vendor_name,
            total_estimated_cost: self.total_estimated_cost,
            justification: self.justification,
            rejection_reason: self.rejection_reason,
            approved_by: self.approved_by,
            approved_at: self.approved_at,
            rejected_by: self.rejected_by,
            rejected_at: self.rejected_at,
            cancelled_at: self.cancelled_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items: items.into_iter().map(PrItemRow::into_domain).collect(),
        })
    }
}

#[derive(Debug, FromRow)]
pub struct GoodsReceiptRow {
    pub id: i64,
    pub grn_number: String,
    pub purchase_request_id: i64,
    pub pr_number: String,
    pub status: String,
    pub condition: String,
    pub received_date: NaiveDate,
    pub received_by: i64,
    pub verified_by: Option<i64>,
    pub verified_at: Option<DateTime<Utc>>,
    pub invoice_no: Option<String>,
    pub delivery_note: Option<String>,
    pub remarks: Option<String>,
    pub rejection_reason: Option<String>,
    pub rejected_by: Option<i64>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct GrItemRow {
    pub goods_receipt_id: i64,
    pub line_no: i32,
    pub pr_line_no: Option<i32>,
    pub product_id: Option<i64>,
    pub product_name: Option<String>,
    pub unit: Option<String>,
    pub quantity_expected: Decimal,
    pub quantity_received: Decimal,
    pub condition: Option<String>,
    pub over_received: bool,
    pub remarks: Option<String>,
}

impl GrItemRow {
    pub fn into_domain(self) -> AppResult<GrLineItem> {
        let condition = match self.condition.as_deref() {
            Some(value) => Some(parse_column(ItemCondition::from_str(value), "condition", value)?),
            None => None,
        };
        Ok(GrLineItem {
            line_no: self.line_no,
            pr_line_no: self.pr_line_no,
            product_id: self.product_id,
            product_name: self.product_name,
            unit: self.unit,
            quantity_expected: self.quantity_expected,
            quantity_received: self.quantity_received,
            condition,
            over_received: self.over_received,
            remarks: self.remarks,
        })
    }
}

impl GoodsReceiptRow {
    pub fn into_domain(self, items: Vec<GrItemRow>) -> AppResult<GoodsReceipt> {
        Ok(GoodsReceipt {
            status: parse_column(GrStatus::from_str(&self.status), "status", &self.status)?,
            condition: parse_column(
                ItemCondition::from_str(&self.condition),
                "condition",
                &self.condition,
            )?,
            id: self.id,
            grn_number: self.grn_number,
            purchase_request_id: self.purchase_request_id,
            pr_number: self.pr_number,
            received_date: self.received_date,
            received_by: self.received_by,
            verified_by: self.verified_by,
            verified_at: self.verified_at,
            invoice_no: self.invoice_no,
            delivery_note: self.delivery_note,
            remarks: self.remarks,
            rejection_reason: self.rejection_reason,
            rejected_by: self.rejected_by,
            rejected_at: self.rejected_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items: items
                .into_iter()
                .map(GrItemRow::into_domain)
                .collect::<AppResult<Vec<_>>>()?,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct StockInRow {
    pub id: i64,
    pub reference_number: String,
    pub goods_receipt_id: i64,
    pub purchase_request_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub date: NaiveDate,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub currency: String,
    pub po_number: String,
    pub invoice_no: Option<String>,
    pub vendor_name: Option<String>,
    pub grn_no: String,
    pub stock_keeper_id: i64,
    pub status: String,
    pub year: i32,
    pub month: i32,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockInRow {
    pub fn into_domain(self) -> AppResult<StockIn> {
        Ok(StockIn {
            status: parse_column(StockInStatus::from_str(&self.status), "status", &self.status)?,
            currency: parse_currency(&self.currency)?,
            month: parse_month(self.month)?,
            id: self.id,
            reference_number: self.reference_number,
            goods_receipt_id: self.goods_receipt_id,
            purchase_request_id: self.purchase_request_id,
            product_id: self.product_id,
            product_name: self.product_name,
            date: self.date,
            quantity: self.quantity,
            unit_price: self.unit_price,
            total_price: self.total_price,
            po_number: self.po_number,
            invoice_no: self.invoice_no,
            vendor_name: self.vendor_name,
            grn_no: self.grn_no,
            stock_keeper_id: self.stock_keeper_id,
            year: self.year,
            remarks: self.remarks,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct StockOutRow {
    pub id: i64,
    pub reference_number: String,
    pub product_id: i64,
    pub date: NaiveDate,
    pub quantity: Decimal,
    pub issued_to_id: Option<i64>,
    pub technician_id: Option<i64>,
    pub site: Option<String>,
    pub location: Option<String>,
    pub request_number: Option<String>,
    pub destination_document: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub status: String,
    pub remarks: Option<String>,
    pub year: i32,
    pub month: i32,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockOutRow {
    pub fn into_domain(self) -> AppResult<StockOut> {
        Ok(StockOut {
            status: parse_column(StockOutStatus::from_str(&self.status), "status", &self.status)?,
            month: parse_month(self.month)?,
            id: self.id,
            reference_number: self.reference_number,
            product_id: self.product_id,
            date: self.date,
            quantity: self.quantity,
            issued_to_id: self.issued_to_id,
            technician_id: self.technician_id,
            site: self.site,
            location: self.location,
            request_number: self.request_number,
            destination_document: self.destination_document,
            scheduled_date: self.scheduled_date,
            remarks: self.remarks,
            year: self.year,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_status_is_internal_error() {
        let row = UserRow {
            id: 1,
            username: "ghost".to_string(),
            full_name: "Ghost".to_string(),
            role: "owner".to_string(),
            is_active: true,
            created_at: Utc::now(),
        };
        assert!(matches!(row.into_domain(), Err(AppError::Internal(_))));
    }

    #[test]
    fn test_gr_item_condition_parses() {
        let row = GrItemRow {
            goods_receipt_id: 1,
            line_no: 1,
            pr_line_no: Some(2),
            product_id: None,
            product_name: Some("Cable".to_string()),
            unit: None,
            quantity_expected: Decimal::from(5),
            quantity_received: Decimal::from(5),
            condition: Some("damaged".to_string()),
            over_received: false,
            remarks: None,
        };
        let line = row.into_domain().unwrap();
        assert_eq!(line.condition, Some(ItemCondition::Damaged));
        assert_eq!(line.pr_line_no, Some(2));
    }
}
