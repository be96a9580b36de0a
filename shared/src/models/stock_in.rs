//! Stock In records and their posting lifecycle
//!
//! `draft -> validated -> done`, with `draft | validated -> cancelled`. A record counts toward
//! a product's total-in while it is validated or done. Every transition that moves a record
//! into or out of a posted status returns the [`LedgerDelta`] it causes, so posting happens
//! exactly once per record.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::ledger::LedgerDelta;
use crate::matching::{self, ProductKeyed};
use crate::models::{Actor, Capability, GoodsReceipt, Product, PurchaseRequest, Role};
use crate::types::Currency;
use crate::validation;

/// Stock In status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StockInStatus {
    Draft,
    Validated,
    Done,
    Cancelled,
}

impl StockInStatus {
    /// Statuses that count toward total-in
    pub const POSTED: [StockInStatus; 2] = [StockInStatus::Validated, StockInStatus::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            StockInStatus::Draft => "draft",
            StockInStatus::Validated => "validated",
            StockInStatus::Done => "done",
            StockInStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(StockInStatus::Draft),
            "validated" => Some(StockInStatus::Validated),
            "done" => Some(StockInStatus::Done),
            "cancelled" => Some(StockInStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_posted(&self) -> bool {
        Self::POSTED.contains(self)
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, StockInStatus::Done | StockInStatus::Cancelled)
    }

    /// Stock keepers start in draft; approvers post immediately
    pub fn initial_for(role: Role) -> Self {
        if role.can_approve_or_verify() {
            StockInStatus::Validated
        } else {
            StockInStatus::Draft
        }
    }
}

impl std::fmt::Display for StockInStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockIn {
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
    pub currency: Currency,
    pub po_number: String,
    pub invoice_no: Option<String>,
    pub vendor_name: Option<String>,
    pub grn_no: String,
    pub stock_keeper_id: i64,
    pub status: StockInStatus,
    pub year: i32,
    pub month: u32,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-selected product and quantity; quantity defaults to what is left to stock in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockInLineInput {
    pub product_id: Option<i64>,
    pub product_name: Option<String>,
    pub quantity: Option<Decimal>,
}

impl ProductKeyed for StockInLineInput {
    fn product_id(&self) -> Option<i64> {
        self.product_id
    }

    fn product_name(&self) -> Option<&str> {
        self.product_name.as_deref()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStockIn {
    pub goods_receipt_id: i64,
    pub date: Option<NaiveDate>,
    pub remarks: Option<String>,
    /// Empty means every received product
    #[serde(default)]
    pub lines: Vec<StockInLineInput>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StockInChanges {
    pub date: Option<NaiveDate>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub remarks: Option<String>,
}

/// Per-product receipt allowance of one verified GR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllowanceEntry {
    pub product_id: i64,
    pub product_name: String,
    pub received: Decimal,
    /// Σ non-cancelled Stock In quantity already raised against the GR
    pub stocked: Decimal,
    pub unit_price: Decimal,
}

impl AllowanceEntry {
    pub fn remaining(&self) -> Decimal {
        (self.received - self.stocked).max(Decimal::ZERO)
    }
}

/// How much of each received product may still be stocked in, in GR line order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiptAllowance {
    pub goods_receipt_id: i64,
    pub entries: Vec<AllowanceEntry>,
}

impl ReceiptAllowance {
    /// Resolve every received GR line to a catalog product and net off existing Stock Ins
    pub fn compute(
        gr: &GoodsReceipt,
        pr: &PurchaseRequest,
        products: &[Product],
        existing: &[StockIn],
    ) -> DomainResult<Self> {
        let mut entries: Vec<AllowanceEntry> = Vec::new();

        for line in gr.items.iter().filter(|l| l.quantity_received > Decimal::ZERO) {
            let field = format!("items[{}].product", line.line_no - 1);
            let product = &products[matching::resolve_index(line, products)
                .map_err(|u| u.into_error(field.clone()))?];

            let pr_line = match line.pr_line_no.and_then(|n| pr.line(n)) {
                Some(pr_line) => pr_line,
                None => &pr.items[matching::resolve_index(line, &pr.items)
                    .map_err(|u| u.into_error(field))?],
            };

            match entries.iter_mut().find(|e| e.product_id == product.id) {
                Some(entry) => entry.received += line.quantity_received,
                None => entries.push(AllowanceEntry {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    received: line.quantity_received,
                    stocked: Decimal::ZERO,
                    unit_price: pr_line.unit_price,
                }),
            }
        }

        for si in existing
            .iter()
            .filter(|si| si.goods_receipt_id == gr.id && si.status != StockInStatus::Cancelled)
        {
            if let Some(entry) = entries.iter_mut().find(|e| e.product_id == si.product_id) {
                entry.stocked += si.quantity;
            }
        }

        Ok(Self {
            goods_receipt_id: gr.id,
            entries,
        })
    }

    pub fn entry(&self, product_id: i64) -> Option<&AllowanceEntry> {
        self.entries.iter().find(|e| e.product_id == product_id)
    }

    pub fn remaining(&self, product_id: i64) -> Decimal {
        self.entry(product_id)
            .map(|e| e.remaining())
            .unwrap_or(Decimal::ZERO)
    }
}

/// Derive Stock In records from a verified Goods Receipt.
///
/// Reference numbers are left empty for the caller to assign.
pub fn derive_stock_ins(
    actor: &Actor,
    gr: &GoodsReceipt,
    pr: &PurchaseRequest,
    allowance: &ReceiptAllowance,
    input: NewStockIn,
    now: DateTime<Utc>,
) -> DomainResult<Vec<StockIn>> {
    actor.require(Capability::ModifyInventory, "create stock in records")?;
    gr.ensure_stockable()?;
    if gr.purchase_request_id != pr.id || allowance.goods_receipt_id != gr.id {
        return Err(DomainError::validation(
            "goods_receipt_id",
            format!("{} does not belong to {}", gr.grn_number, pr.pr_number),
        ));
    }

    let mut picked: Vec<(&AllowanceEntry, Decimal)> = Vec::new();
    if input.lines.is_empty() {
        picked.extend(
            allowance
                .entries
                .iter()
                .filter(|e| e.remaining() > Decimal::ZERO)
                .map(|e| (e, e.remaining())),
        );
        if picked.is_empty() {
            return Err(DomainError::conflict(
                format!("Everything received on {} has already been stocked in", gr.grn_number),
                gr.status,
            ));
        }
    } else {
        for (idx, line) in input.lines.iter().enumerate() {
            let entry = &allowance.entries[matching::resolve_index(line, &allowance.entries)
                .map_err(|u| u.into_error(format!("lines[{}].product", idx)))?];
            let quantity = line.quantity.unwrap_or_else(|| entry.remaining());
            let field = format!("lines[{}].quantity", idx);
            validation::validate_quantity(quantity)
                .map_err(|m| DomainError::validation(field.clone(), m))?;

            let requested: Decimal = picked
                .iter()
                .filter(|(e, _)| e.product_id == entry.product_id)
                .map(|(_, q)| *q)
                .sum::<Decimal>()
                + quantity;
            if requested > entry.remaining() {
                return Err(DomainError::validation(
                    field,
                    format!(
                        "Stock in of {} for {} exceeds the {} still available on {}",
                        requested,
                        entry.product_name,
                        entry.remaining(),
                        gr.grn_number
                    ),
                ));
            }
            picked.push((entry, quantity));
        }
    }

    let date = input.date.unwrap_or_else(|| now.date_naive());
    let status = StockInStatus::initial_for(actor.role);
    Ok(picked
        .into_iter()
        .map(|(entry, quantity)| StockIn {
            id: 0,
            reference_number: String::new(),
            goods_receipt_id: gr.id,
            purchase_request_id: pr.id,
            product_id: entry.product_id,
            product_name: entry.product_name.clone(),
            date,
            quantity,
            unit_price: entry.unit_price,
            total_price: validation::line_total(quantity, entry.unit_price),
            currency: pr.currency,
            po_number: pr.pr_number.clone(),
            invoice_no: gr.invoice_no.clone(),
            vendor_name: pr.vendor_name.clone(),
            grn_no: gr.grn_number.clone(),
            stock_keeper_id: actor.id,
            status,
            year: date.year(),
            month: date.month(),
            remarks: input.remarks.clone(),
            created_at: now,
            updated_at: now,
        })
        .collect())
}

impl ProductKeyed for AllowanceEntry {
    fn product_id(&self) -> Option<i64> {
        Some(self.product_id)
    }

    fn product_name(&self) -> Option<&str> {
        Some(&self.product_name)
    }
}

impl StockIn {
    /// Delta this record contributes while posted
    pub fn posted_delta(&self) -> Option<LedgerDelta> {
        self.status
            .is_posted()
            .then(|| LedgerDelta::stock_in(self.product_id, self.quantity))
    }

    fn conflict(&self, action: &str) -> DomainError {
        DomainError::conflict(
            format!("Cannot {} a {} stock in", action, self.status),
            self.status,
        )
    }

    /// draft -> validated; posts
    pub fn validate(&mut self, actor: &Actor, now: DateTime<Utc>) -> DomainResult<Option<LedgerDelta>> {
        actor.require(Capability::ApproveOrVerify, "validate stock in records")?;
        if self.status != StockInStatus::Draft {
            return Err(self.conflict("validate"));
        }
        self.status = StockInStatus::Validated;
        self.updated_at = now;
        Ok(self.posted_delta())
    }

    /// validated -> done without ledger change, or draft -> done (approvers only) which posts
    pub fn complete(&mut self, actor: &Actor, now: DateTime<Utc>) -> DomainResult<Option<LedgerDelta>> {
        actor.require(Capability::ModifyInventory, "complete stock in records")?;
        let delta = match self.status {
            StockInStatus::Validated => None,
            StockInStatus::Draft => {
                actor.require(Capability::ApproveOrVerify, "post draft stock in records")?;
                Some(LedgerDelta::stock_in(self.product_id, self.quantity))
            }
            _ => return Err(self.conflict("complete")),
        };
        self.status = StockInStatus::Done;
        self.updated_at = now;
        Ok(delta)
    }

    /// draft | validated -> cancelled; cancelling a validated record reverses its posting
    pub fn cancel(&mut self, actor: &Actor, now: DateTime<Utc>) -> DomainResult<Option<LedgerDelta>> {
        actor.require(Capability::ModifyInventory, "cancel stock in records")?;
        let delta = match self.status {
            StockInStatus::Draft => None,
            StockInStatus::Validated => {
                actor.require(Capability::ApproveOrVerify, "cancel validated stock in records")?;
                self.posted_delta().map(|d| d.reversed())
            }
            _ => return Err(self.conflict("cancel")),
        };
        self.status = StockInStatus::Cancelled;
        self.updated_at = now;
        Ok(delta)
    }

    /// Edit a draft, or a validated record as an approver. `allowance` must include this record.
    pub fn update(
        &mut self,
        actor: &Actor,
        changes: StockInChanges,
        allowance: &ReceiptAllowance,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<LedgerDelta>> {
        actor.require(Capability::ModifyInventory, "edit stock in records")?;
        match self.status {
            StockInStatus::Draft => {}
            StockInStatus::Validated => {
                actor.require(Capability::ApproveOrVerify, "edit validated stock in records")?
            }
            _ => return Err(self.conflict("edit")),
        }

        let old_quantity = self.quantity;
        let quantity = changes.quantity.unwrap_or(old_quantity);
        validation::validate_quantity(quantity)
            .map_err(|m| DomainError::validation("quantity", m))?;
        let increase = quantity - old_quantity;
        if increase > Decimal::ZERO && increase > allowance.remaining(self.product_id) {
            return Err(DomainError::validation(
                "quantity",
                format!(
                    "Stock in of {} exceeds what {} received",
                    quantity, self.grn_no
                ),
            ));
        }
        let unit_price = changes.unit_price.unwrap_or(self.unit_price);
        validation::validate_unit_price(unit_price)
            .map_err(|m| DomainError::validation("unit_price", m))?;

        self.quantity = quantity;
        self.unit_price = unit_price;
        self.total_price = validation::line_total(quantity, unit_price);
        if let Some(date) = changes.date {
            self.date = date;
            self.year = date.year();
            self.month = date.month();
        }
        if changes.remarks.is_some() {
            self.remarks = changes.remarks;
        }
        self.updated_at = now;

        let delta = LedgerDelta::stock_in(self.product_id, increase);
        Ok((self.status.is_posted() && !delta.is_zero()).then_some(delta))
    }

    /// Only never-posted records may be deleted
    pub fn ensure_deletable(&self, actor: &Actor) -> DomainResult<()> {
        actor.require(Capability::Delete, "delete stock in records")?;
        match self.status {
            StockInStatus::Draft | StockInStatus::Cancelled => Ok(()),
            _ => Err(self.conflict("delete")),
        }
    }
}
