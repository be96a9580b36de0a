//! Goods Receipt models and lifecycle
//!
//! A GR is raised against an approved Purchase Request. Its status is a pure function of
//! the per-line `(received, expected)` pairs until it is rejected. Verification is a one-way
//! gate orthogonal to status: once `verified_by` is set the receipt is frozen and the
//! received quantities have been added to the PR lines.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::matching::{self, ProductKeyed};
use crate::models::{Actor, Capability, PrReceiptIncrement, PurchaseRequest};
use crate::validation;

/// Goods Receipt status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GrStatus {
    Pending,
    Partial,
    Complete,
    Rejected,
}

impl GrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrStatus::Pending => "pending",
            GrStatus::Partial => "partial",
            GrStatus::Complete => "complete",
            GrStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(GrStatus::Pending),
            "partial" => Some(GrStatus::Partial),
            "complete" => Some(GrStatus::Complete),
            "rejected" => Some(GrStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for GrStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition of received goods
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemCondition {
    #[default]
    Good,
    Damaged,
    Missing,
    Expired,
}

impl ItemCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemCondition::Good => "good",
            ItemCondition::Damaged => "damaged",
            ItemCondition::Missing => "missing",
            ItemCondition::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "good" => Some(ItemCondition::Good),
            "damaged" => Some(ItemCondition::Damaged),
            "missing" => Some(ItemCondition::Missing),
            "expired" => Some(ItemCondition::Expired),
            _ => None,
        }
    }
}

/// Derive GR status from `(received, expected)` pairs.
///
/// No lines, or nothing received, is `Pending`; every line at or above expectation is
/// `Complete`; anything else is `Partial`.
pub fn derive_status<I>(lines: I) -> GrStatus
where
    I: IntoIterator<Item = (Decimal, Decimal)>,
{
    let mut any_received = false;
    let mut all_complete = true;
    for (received, expected) in lines {
        if received > Decimal::ZERO {
            any_received = true;
        }
        if received < expected {
            all_complete = false;
        }
    }
    match (any_received, all_complete) {
        (false, _) => GrStatus::Pending,
        (true, true) => GrStatus::Complete,
        (true, false) => GrStatus::Partial,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrLineItem {
    pub line_no: i32,
    /// Line of the source PR this receipt line was derived from
    pub pr_line_no: Option<i32>,
    pub product_id: Option<i64>,
    pub product_name: Option<String>,
    pub unit: Option<String>,
    pub quantity_expected: Decimal,
    pub quantity_received: Decimal,
    /// Per-line override of the receipt condition
    pub condition: Option<ItemCondition>,
    pub over_received: bool,
    pub remarks: Option<String>,
}

impl ProductKeyed for GrLineItem {
    fn product_id(&self) -> Option<i64> {
        self.product_id
    }

    fn product_name(&self) -> Option<&str> {
        self.product_name.as_deref()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoodsReceipt {
    pub id: i64,
    pub grn_number: String,
    pub purchase_request_id: i64,
    pub pr_number: String,
    pub status: GrStatus,
    pub condition: ItemCondition,
    pub received_date: NaiveDate,
    /// Owner of the document
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
    pub items: Vec<GrLineItem>,
}

/// Initial received quantity for one derived line, keyed by PR line or product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrLineInput {
    pub pr_line_no: Option<i32>,
    pub product_id: Option<i64>,
    pub product_name: Option<String>,
    pub quantity_received: Decimal,
    pub condition: Option<ItemCondition>,
    pub remarks: Option<String>,
}

impl ProductKeyed for GrLineInput {
    fn product_id(&self) -> Option<i64> {
        self.product_id
    }

    fn product_name(&self) -> Option<&str> {
        self.product_name.as_deref()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGoodsReceipt {
    pub purchase_request_id: i64,
    pub received_date: Option<NaiveDate>,
    pub condition: Option<ItemCondition>,
    pub invoice_no: Option<String>,
    pub delivery_note: Option<String>,
    pub remarks: Option<String>,
    #[serde(default)]
    pub allow_over_receipt: bool,
    #[serde(default)]
    pub items: Vec<GrLineInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrLineUpdate {
    pub line_no: i32,
    pub quantity_received: Decimal,
    pub condition: Option<ItemCondition>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoodsReceiptChanges {
    pub received_date: Option<NaiveDate>,
    pub condition: Option<ItemCondition>,
    pub invoice_no: Option<String>,
    pub delivery_note: Option<String>,
    pub remarks: Option<String>,
    #[serde(default)]
    pub allow_over_receipt: bool,
    #[serde(default)]
    pub items: Vec<GrLineUpdate>,
}

fn set_received(
    line: &mut GrLineItem,
    quantity: Decimal,
    allow_over_receipt: bool,
    field: &str,
) -> DomainResult<()> {
    validation::validate_received_quantity(quantity)
        .map_err(|m| DomainError::validation(field, m))?;
    let over = quantity > line.quantity_expected;
    if over && !allow_over_receipt {
        return Err(DomainError::validation(
            field,
            format!(
                "Received {} exceeds expected {}; set allow_over_receipt to accept it",
                quantity, line.quantity_expected
            ),
        ));
    }
    line.quantity_received = quantity;
    line.over_received = over;
    Ok(())
}

impl GoodsReceipt {
    /// Raise a receipt against an approved PR, expecting whatever is still outstanding
    pub fn from_purchase_request(
        actor: &Actor,
        grn_number: String,
        pr: &PurchaseRequest,
        input: NewGoodsReceipt,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        actor.require(Capability::ModifyInventory, "create goods receipts")?;
        pr.ensure_receivable()?;

        let mut items: Vec<GrLineItem> = pr
            .items
            .iter()
            .filter(|l| l.remaining_to_receive() > Decimal::ZERO)
            .enumerate()
            .map(|(idx, l)| GrLineItem {
                line_no: idx as i32 + 1,
                pr_line_no: Some(l.line_no),
                product_id: l.product_id,
                product_name: l.product_name.clone(),
                unit: l.unit.clone(),
                quantity_expected: l.remaining_to_receive(),
                quantity_received: Decimal::ZERO,
                condition: None,
                over_received: false,
                remarks: None,
            })
            .collect();

        if items.is_empty() {
            return Err(DomainError::conflict(
                format!("{} has nothing left to receive", pr.pr_number),
                pr.status,
            ));
        }

        let mut claimed: Vec<usize> = Vec::new();
        for (idx, given) in input.items.iter().enumerate() {
            let field = format!("items[{}].quantity_received", idx);
            let target = match given.pr_line_no {
                Some(pr_line_no) => items
                    .iter()
                    .position(|l| l.pr_line_no == Some(pr_line_no))
                    .ok_or_else(|| {
                        DomainError::validation(
                            format!("items[{}].pr_line_no", idx),
                            format!("Line {} has nothing left to receive", pr_line_no),
                        )
                    })?,
                None => matching::resolve_index_where(given, &items, |l| {
                    !claimed.iter().any(|c| items[*c].line_no == l.line_no)
                })
                .map_err(|u| u.into_error(format!("items[{}].product", idx)))?,
            };
            claimed.push(target);

            let line = &mut items[target];
            set_received(line, given.quantity_received, input.allow_over_receipt, &field)?;
            line.condition = given.condition;
            line.remarks = given.remarks.clone();
        }

        let status = derive_status(
            items
                .iter()
                .map(|l| (l.quantity_received, l.quantity_expected)),
        );

        Ok(Self {
            id: 0,
            grn_number,
            purchase_request_id: pr.id,
            pr_number: pr.pr_number.clone(),
            status,
            condition: input.condition.unwrap_or_default(),
            received_date: input.received_date.unwrap_or_else(|| now.date_naive()),
            received_by: actor.id,
            verified_by: None,
            verified_at: None,
            invoice_no: input.invoice_no,
            delivery_note: input.delivery_note,
            remarks: input.remarks,
            rejection_reason: None,
            rejected_by: None,
            rejected_at: None,
            created_at: now,
            updated_at: now,
            items,
        })
    }

    pub fn is_verified(&self) -> bool {
        self.verified_by.is_some()
    }

    /// Effective condition of a line: its override, else the receipt condition
    pub fn line_condition(&self, line: &GrLineItem) -> ItemCondition {
        line.condition.unwrap_or(self.condition)
    }

    pub fn recompute_status(&mut self) {
        if self.status != GrStatus::Rejected {
            self.status = derive_status(
                self.items
                    .iter()
                    .map(|l| (l.quantity_received, l.quantity_expected)),
            );
        }
    }

    fn ensure_open(&self, action: &str) -> DomainResult<()> {
        if self.is_verified() {
            return Err(DomainError::conflict(
                format!("Cannot {} a verified goods receipt", action),
                "verified",
            ));
        }
        if self.status == GrStatus::Rejected {
            return Err(DomainError::conflict(
                format!("Cannot {} a rejected goods receipt", action),
                self.status,
            ));
        }
        Ok(())
    }

    /// Edit received quantities and header fields before verification
    pub fn update(
        &mut self,
        actor: &Actor,
        changes: GoodsReceiptChanges,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        actor.require_owner(self.received_by, "edit this goods receipt")?;
        self.ensure_open("edit")?;

        let mut items = self.items.clone();
        for (idx, change) in changes.items.iter().enumerate() {
            let line = items
                .iter_mut()
                .find(|l| l.line_no == change.line_no)
                .ok_or_else(|| {
                    DomainError::validation(
                        format!("items[{}].line_no", idx),
                        format!("Line {} does not exist", change.line_no),
                    )
                })?;
            set_received(
                line,
                change.quantity_received,
                changes.allow_over_receipt,
                &format!("items[{}].quantity_received", idx),
            )?;
            if change.condition.is_some() {
                line.condition = change.condition;
            }
            if change.remarks.is_some() {
                line.remarks = change.remarks.clone();
            }
        }
        self.items = items;

        if let Some(date) = changes.received_date {
            self.received_date = date;
        }
        if let Some(condition) = changes.condition {
            self.condition = condition;
        }
        if changes.invoice_no.is_some() {
            self.invoice_no = changes.invoice_no;
        }
        if changes.delivery_note.is_some() {
            self.delivery_note = changes.delivery_note;
        }
        if changes.remarks.is_some() {
            self.remarks = changes.remarks;
        }

        self.recompute_status();
        self.updated_at = now;
        Ok(())
    }

    /// Verify the receipt and add its received quantities to the PR lines.
    ///
    /// All-or-nothing: on any error neither the receipt nor the PR is modified.
    pub fn verify(
        &mut self,
        actor: &Actor,
        pr: &mut PurchaseRequest,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<PrReceiptIncrement>> {
        actor.require(Capability::ApproveOrVerify, "verify goods receipts")?;
        self.ensure_open("verify")?;
        if self.status == GrStatus::Pending {
            return Err(DomainError::conflict(
                "Nothing has been received on this goods receipt",
                self.status,
            ));
        }
        if pr.id != self.purchase_request_id {
            return Err(DomainError::validation(
                "purchase_request_id",
                format!("{} does not belong to {}", self.grn_number, pr.pr_number),
            ));
        }

        let increments = self.receipt_increments(pr)?;
        pr.apply_receipt(&increments, now)?;

        self.verified_by = Some(actor.id);
        self.verified_at = Some(now);
        self.updated_at = now;
        Ok(increments)
    }

    /// Pair each received line with its PR line and check it against what is still open
    fn receipt_increments(&self, pr: &PurchaseRequest) -> DomainResult<Vec<PrReceiptIncrement>> {
        let mut increments: Vec<PrReceiptIncrement> = Vec::new();
        let mut accepted_over: Vec<i32> = Vec::new();
        for line in self.items.iter().filter(|l| l.quantity_received > Decimal::ZERO) {
            let field = format!("items[{}].product", line.line_no - 1);
            let idx = match line.pr_line_no {
                Some(pr_line_no) => {
                    matching::resolve_index_where(line, &pr.items, |c| c.line_no == pr_line_no)
                }
                None => matching::resolve_index_where(line, &pr.items, |c| {
                    c.remaining_to_receive() > Decimal::ZERO
                        && !increments.iter().any(|i| i.line_no == c.line_no)
                })
                .or_else(|_| matching::resolve_index(line, &pr.items)),
            }
            .map_err(|u| u.into_error(field))?;

            let pr_line_no = pr.items[idx].line_no;
            if line.over_received {
                accepted_over.push(pr_line_no);
            }
            match increments.iter_mut().find(|i| i.line_no == pr_line_no) {
                Some(existing) => existing.quantity += line.quantity_received,
                None => increments.push(PrReceiptIncrement {
                    line_no: pr_line_no,
                    quantity: line.quantity_received,
                }),
            }
        }

        // Other receipts may have been verified against the same lines since this one was raised
        for inc in &increments {
            let Some(pr_line) = pr.line(inc.line_no) else {
                continue;
            };
            let remaining = pr_line.remaining_to_receive();
            if inc.quantity > remaining && !accepted_over.contains(&inc.line_no) {
                return Err(DomainError::conflict(
                    format!(
                        "Line {} of {} has {} left to receive but {} receives {}",
                        inc.line_no, pr.pr_number, remaining, self.grn_number, inc.quantity
                    ),
                    pr.status,
                ));
            }
        }
        Ok(increments)
    }

    /// Reject an unverified receipt; terminal
    pub fn reject(&mut self, actor: &Actor, reason: &str, now: DateTime<Utc>) -> DomainResult<()> {
        actor.require(Capability::ApproveOrVerify, "reject goods receipts")?;
        self.ensure_open("reject")?;
        validation::validate_reason(reason)
            .map_err(|m| DomainError::validation("rejection_reason", m))?;
        self.status = GrStatus::Rejected;
        self.rejection_reason = Some(reason.trim().to_string());
        self.rejected_by = Some(actor.id);
        self.rejected_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Only the owner may delete, and only a pending, unverified receipt
    pub fn ensure_deletable(&self, actor: &Actor) -> DomainResult<()> {
        actor.require_owner(self.received_by, "delete this goods receipt")?;
        self.ensure_open("delete")?;
        if self.status != GrStatus::Pending {
            return Err(DomainError::conflict(
                "Only pending goods receipts can be deleted",
                self.status,
            ));
        }
        Ok(())
    }

    /// Stock In creation is gated on verification
    pub fn ensure_stockable(&self) -> DomainResult<()> {
        if self.status == GrStatus::Rejected {
            return Err(DomainError::conflict(
                "Cannot stock in from a rejected goods receipt",
                self.status,
            ));
        }
        if !self.is_verified() {
            return Err(DomainError::conflict(
                format!("{} has not been verified", self.grn_number),
                self.status,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewPrLine, NewPurchaseRequest, PrStatus, Role};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn keeper() -> Actor {
        Actor::new(10, Role::StockKeeper)
    }

    fn manager() -> Actor {
        Actor::new(20, Role::StockManager)
    }

    fn pr_line(id: Option<i64>, name: &str, qty: Decimal, price: Decimal) -> NewPrLine {
        NewPrLine {
            product_id: id,
            product_name: Some(name.to_string()),
            unit: None,
            quantity: qty,
            unit_price: price,
            justification: None,
            specifications: None,
        }
    }

    fn approved_pr() -> PurchaseRequest {
        let mut pr = PurchaseRequest::draft(
            &keeper(),
            "PR-2026-00001".to_string(),
            NewPurchaseRequest {
                priority: None,
                requested_date: None,
                required_date: None,
                department: None,
                vendor_name: None,
                currency: None,
                justification: None,
                items: vec![
                    pr_line(Some(1), "Cable", dec!(10), dec!(5)),
                    pr_line(Some(2), "Switch", dec!(5), dec!(20)),
                ],
            },
            Utc::now(),
        )
        .unwrap();
        pr.id = 100;
        pr.submit(&keeper(), Utc::now()).unwrap();
        pr.approve(&manager(), Utc::now()).unwrap();
        pr
    }

    fn receive(line_no: Option<i32>, product_id: Option<i64>, qty: Decimal) -> GrLineInput {
        GrLineInput {
            pr_line_no: line_no,
            product_id,
            product_name: None,
            quantity_received: qty,
            condition: None,
            remarks: None,
        }
    }

    fn new_gr(items: Vec<GrLineInput>) -> NewGoodsReceipt {
        NewGoodsReceipt {
            purchase_request_id: 100,
            received_date: None,
            condition: None,
            invoice_no: Some("INV-7".to_string()),
            delivery_note: None,
            remarks: None,
            allow_over_receipt: false,
            items,
        }
    }

    // ========================================================================
    // Status derivation
    // ========================================================================

    #[test]
    fn test_derive_status() {
        assert_eq!(derive_status(Vec::<(Decimal, Decimal)>::new()), GrStatus::Pending);
        assert_eq!(
            derive_status(vec![(dec!(0), dec!(10)), (dec!(0), dec!(5))]),
            GrStatus::Pending
        );
        assert_eq!(
            derive_status(vec![(dec!(6), dec!(10)), (dec!(0), dec!(5))]),
            GrStatus::Partial
        );
        assert_eq!(
            derive_status(vec![(dec!(10), dec!(10)), (dec!(7), dec!(5))]),
            GrStatus::Complete
        );
    }

    // ========================================================================
    // Creation
    // ========================================================================

    #[test]
    fn test_create_expects_remaining_quantities() {
        let pr = approved_pr();
        let gr = GoodsReceipt::from_purchase_request(
            &keeper(),
            "GRN-2026-00001".into(),
            &pr,
            new_gr(vec![receive(None, Some(1), dec!(6))]),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(gr.items.len(), 2);
        assert_eq!(gr.items[0].quantity_expected, dec!(10));
        assert_eq!(gr.items[0].quantity_received, dec!(6));
        assert_eq!(gr.status, GrStatus::Partial);
        assert_eq!(gr.received_by, 10);
        assert_eq!(gr.pr_number, "PR-2026-00001");
    }

    #[test]
    fn test_create_requires_approved_pr() {
        let mut pr = approved_pr();
        pr.status = PrStatus::Pending;
        let err = GoodsReceipt::from_purchase_request(
            &keeper(),
            "GRN".into(),
            &pr,
            new_gr(vec![]),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Conflict { ref current_state, .. } if current_state == "pending"));
    }

    #[test]
    fn test_create_with_nothing_remaining_is_conflict() {
        let mut pr = approved_pr();
        for line in pr.items.iter_mut() {
            line.quantity_received = line.quantity;
        }
        let err = GoodsReceipt::from_purchase_request(
            &keeper(),
            "GRN".into(),
            &pr,
            new_gr(vec![]),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Conflict { .. }));
    }

    #[test]
    fn test_create_skips_fully_received_lines() {
        let mut pr = approved_pr();
        pr.items[0].quantity_received = dec!(10);
        pr.items[1].quantity_received = dec!(2);
        let gr = GoodsReceipt::from_purchase_request(
            &keeper(),
            "GRN".into(),
            &pr,
            new_gr(vec![]),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(gr.items.len(), 1);
        assert_eq!(gr.items[0].pr_line_no, Some(2));
        assert_eq!(gr.items[0].quantity_expected, dec!(3));
        assert_eq!(gr.status, GrStatus::Pending);
    }

    #[test]
    fn test_over_receipt_needs_override() {
        let pr = approved_pr();
        let err = GoodsReceipt::from_purchase_request(
            &keeper(),
            "GRN".into(),
            &pr,
            new_gr(vec![receive(Some(2), None, dec!(7))]),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));

        let mut input = new_gr(vec![receive(Some(2), None, dec!(7))]);
        input.allow_over_receipt = true;
        let gr =
            GoodsReceipt::from_purchase_request(&keeper(), "GRN".into(), &pr, input, Utc::now())
                .unwrap();
        assert!(gr.items[1].over_received);
        assert!(!gr.items[0].over_received);
    }

    #[test]
    fn test_viewer_cannot_create() {
        let pr = approved_pr();
        let viewer = Actor::new(3, Role::Viewer);
        assert!(matches!(
            GoodsReceipt::from_purchase_request(&viewer, "GRN".into(), &pr, new_gr(vec![]), Utc::now()),
            Err(DomainError::Forbidden(_))
        ));
    }

    // ========================================================================
    // Update
    // ========================================================================

    fn pending_gr(pr: &PurchaseRequest) -> GoodsReceipt {
        GoodsReceipt::from_purchase_request(
            &keeper(),
            "GRN-2026-00001".into(),
            pr,
            new_gr(vec![]),
            Utc::now(),
        )
        .unwrap()
    }

    fn line_update(line_no: i32, qty: Decimal) -> GrLineUpdate {
        GrLineUpdate {
            line_no,
            quantity_received: qty,
            condition: None,
            remarks: None,
        }
    }

    #[test]
    fn test_update_recomputes_status() {
        let pr = approved_pr();
        let mut gr = pending_gr(&pr);

        let changes = GoodsReceiptChanges {
            items: vec![line_update(1, dec!(10)), line_update(2, dec!(5))],
            condition: Some(ItemCondition::Damaged),
            ..Default::default()
        };
        gr.update(&keeper(), changes, Utc::now()).unwrap();
        assert_eq!(gr.status, GrStatus::Complete);
        assert_eq!(gr.line_condition(&gr.items[0]), ItemCondition::Damaged);
    }

    #[test]
    fn test_update_rejected_line_leaves_receipt_untouched() {
        let pr = approved_pr();
        let mut gr = pending_gr(&pr);
        let changes = GoodsReceiptChanges {
            items: vec![line_update(1, dec!(3)), line_update(9, dec!(1))],
            ..Default::default()
        };
        assert!(gr.update(&keeper(), changes, Utc::now()).is_err());
        assert_eq!(gr.items[0].quantity_received, Decimal::ZERO);
    }

    #[test]
    fn test_only_owner_updates() {
        let pr = approved_pr();
        let mut gr = pending_gr(&pr);
        assert!(matches!(
            gr.update(&manager(), GoodsReceiptChanges::default(), Utc::now()),
            Err(DomainError::Forbidden(_))
        ));
    }

    // ========================================================================
    // Verification
    // ========================================================================

    #[test]
    fn test_verify_increments_pr_once() {
        let mut pr = approved_pr();
        let mut gr = GoodsReceipt::from_purchase_request(
            &keeper(),
            "GRN".into(),
            &pr,
            new_gr(vec![receive(None, Some(1), dec!(6))]),
            Utc::now(),
        )
        .unwrap();

        let increments = gr.verify(&manager(), &mut pr, Utc::now()).unwrap();
        assert_eq!(
            increments,
            vec![PrReceiptIncrement {
                line_no: 1,
                quantity: dec!(6)
            }]
        );
        assert_eq!(pr.items[0].quantity_received, dec!(6));
        assert_eq!(gr.verified_by, Some(20));

        let err = gr.verify(&manager(), &mut pr, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Conflict { ref current_state, .. } if current_state == "verified"));
        assert_eq!(pr.items[0].quantity_received, dec!(6));
    }

    #[test]
    fn test_second_receipt_for_same_remainder_is_refused() {
        let mut pr = approved_pr();
        let mut first = GoodsReceipt::from_purchase_request(
            &keeper(),
            "GRN-1".into(),
            &pr,
            new_gr(vec![receive(Some(1), None, dec!(10))]),
            Utc::now(),
        )
        .unwrap();
        let mut second = GoodsReceipt::from_purchase_request(
            &keeper(),
            "GRN-2".into(),
            &pr,
            new_gr(vec![receive(Some(1), None, dec!(10))]),
            Utc::now(),
        )
        .unwrap();
        assert!(!second.items[0].over_received);

        first.verify(&manager(), &mut pr, Utc::now()).unwrap();
        let err = second.verify(&manager(), &mut pr, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Conflict { ref current_state, .. } if current_state == "approved"));
        assert_eq!(pr.items[0].quantity_received, dec!(10));
        assert!(second.verified_by.is_none());
    }

    #[test]
    fn test_accepted_over_receipt_still_verifies() {
        let mut pr = approved_pr();
        let mut input = new_gr(vec![receive(Some(2), None, dec!(7))]);
        input.allow_over_receipt = true;
        let mut gr =
            GoodsReceipt::from_purchase_request(&keeper(), "GRN".into(), &pr, input, Utc::now())
                .unwrap();
        assert!(gr.items.iter().any(|l| l.over_received));

        gr.verify(&manager(), &mut pr, Utc::now()).unwrap();
        assert_eq!(pr.items[1].quantity_received, dec!(7));
    }

    #[test]
    fn test_verified_receipt_is_frozen() {
        let mut pr = approved_pr();
        let mut gr = GoodsReceipt::from_purchase_request(
            &keeper(),
            "GRN".into(),
            &pr,
            new_gr(vec![receive(Some(1), None, dec!(2))]),
            Utc::now(),
        )
        .unwrap();
        gr.verify(&manager(), &mut pr, Utc::now()).unwrap();

        assert!(matches!(
            gr.update(&keeper(), GoodsReceiptChanges::default(), Utc::now()),
            Err(DomainError::Conflict { .. })
        ));
        assert!(matches!(
            gr.reject(&manager(), "late", Utc::now()),
            Err(DomainError::Conflict { .. })
        ));
        assert!(gr.ensure_stockable().is_ok());
    }

    #[test]
    fn test_keeper_cannot_verify() {
        let mut pr = approved_pr();
        let mut gr = GoodsReceipt::from_purchase_request(
            &keeper(),
            "GRN".into(),
            &pr,
            new_gr(vec![receive(Some(1), None, dec!(2))]),
            Utc::now(),
        )
        .unwrap();
        assert!(matches!(
            gr.verify(&keeper(), &mut pr, Utc::now()),
            Err(DomainError::Forbidden(_))
        ));
        assert_eq!(pr.items[0].quantity_received, Decimal::ZERO);
    }

    #[test]
    fn test_verify_pending_is_conflict() {
        let mut pr = approved_pr();
        let mut gr = pending_gr(&pr);
        assert!(matches!(
            gr.verify(&manager(), &mut pr, Utc::now()),
            Err(DomainError::Conflict { .. })
        ));
        assert!(!gr.is_verified());
    }

    // ========================================================================
    // Reject & delete
    // ========================================================================

    #[test]
    fn test_reject_is_terminal() {
        let mut pr = approved_pr();
        let mut gr = pending_gr(&pr);
        gr.reject(&manager(), "Wrong items delivered", Utc::now()).unwrap();
        assert_eq!(gr.status, GrStatus::Rejected);
        assert!(matches!(
            gr.verify(&manager(), &mut pr, Utc::now()),
            Err(DomainError::Conflict { .. })
        ));
        assert!(matches!(
            gr.ensure_deletable(&keeper()),
            Err(DomainError::Conflict { .. })
        ));
        assert!(gr.ensure_stockable().is_err());
    }

    #[test]
    fn test_delete_only_pending() {
        let pr = approved_pr();
        let gr = pending_gr(&pr);
        assert!(gr.ensure_deletable(&keeper()).is_ok());

        let partial = GoodsReceipt::from_purchase_request(
            &keeper(),
            "GRN".into(),
            &pr,
            new_gr(vec![receive(Some(1), None, dec!(1))]),
            Utc::now(),
        )
        .unwrap();
        assert!(matches!(
            partial.ensure_deletable(&keeper()),
            Err(DomainError::Conflict { .. })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_status_is_function_of_pairs(
            pairs in prop::collection::vec((0i64..50, 1i64..50), 0..10)
        ) {
            let lines: Vec<(Decimal, Decimal)> = pairs
                .iter()
                .map(|(r, e)| (Decimal::from(*r), Decimal::from(*e)))
                .collect();
            let status = derive_status(lines.clone());

            let none_received = lines.iter().all(|(r, _)| r.is_zero());
            let all_met = lines.iter().all(|(r, e)| r >= e);
            let expected = if none_received {
                GrStatus::Pending
            } else if all_met {
                GrStatus::Complete
            } else {
                GrStatus::Partial
            };
            prop_assert_eq!(status, expected);
            prop_assert_eq!(derive_status(lines), status);
        }
    }
}
