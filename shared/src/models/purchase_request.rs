//! Purchase Request models and lifecycle
//!
//! `draft -> pending -> {approved | rejected}`, with `draft | pending -> cancelled`.
//! Approved, rejected and cancelled are terminal. Once approved, the only mutation a PR
//! accepts is `quantity_received` bookkeeping applied by Goods Receipt verification.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::matching::{self, ProductKeyed};
use crate::models::{Actor, Capability};
use crate::types::Currency;
use crate::validation;

/// Purchase Request status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PrStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl PrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrStatus::Draft => "draft",
            PrStatus::Pending => "pending",
            PrStatus::Approved => "approved",
            PrStatus::Rejected => "rejected",
            PrStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(PrStatus::Draft),
            "pending" => Some(PrStatus::Pending),
            "approved" => Some(PrStatus::Approved),
            "rejected" => Some(PrStatus::Rejected),
            "cancelled" => Some(PrStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PrStatus::Approved | PrStatus::Rejected | PrStatus::Cancelled
        )
    }
}

impl std::fmt::Display for PrStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            "urgent" => Some(Priority::Urgent),
            _ => None,
        }
    }
}

/// A requested product line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrLineItem {
    /// 1-based position, stable for the life of the PR
    pub line_no: i32,
    pub product_id: Option<i64>,
    pub product_name: Option<String>,
    pub unit: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    /// Cumulative quantity received through verified Goods Receipts
    pub quantity_received: Decimal,
    pub justification: Option<String>,
    pub specifications: Option<String>,
}

impl PrLineItem {
    pub fn remaining_to_receive(&self) -> Decimal {
        (self.quantity - self.quantity_received).max(Decimal::ZERO)
    }

    pub fn is_fully_received(&self) -> bool {
        self.remaining_to_receive().is_zero()
    }
}

impl ProductKeyed for PrLineItem {
    fn product_id(&self) -> Option<i64> {
        self.product_id
    }

    fn product_name(&self) -> Option<&str> {
        self.product_name.as_deref()
    }
}

/// A Purchase Request with its ordered line items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub id: i64,
    pub pr_number: String,
    pub status: PrStatus,
    pub priority: Priority,
    /// Owner of the document
    pub requested_by: i64,
    pub requested_date: NaiveDate,
    pub required_date: Option<NaiveDate>,
    pub department: Option<String>,
    pub vendor_name: Option<String>,
    pub currency: Currency,
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
    pub items: Vec<PrLineItem>,
}

/// Line input for create/update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPrLine {
    pub product_id: Option<i64>,
    pub product_name: Option<String>,
    pub unit: Option<String>,
    pub quantity: Decimal,
    #[serde(default)]
    pub unit_price: Decimal,
    pub justification: Option<String>,
    pub specifications: Option<String>,
}

impl ProductKeyed for NewPrLine {
    fn product_id(&self) -> Option<i64> {
        self.product_id
    }

    fn product_name(&self) -> Option<&str> {
        self.product_name.as_deref()
    }
}

/// Input for creating a PR
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPurchaseRequest {
    pub priority: Option<Priority>,
    pub requested_date: Option<NaiveDate>,
    pub required_date: Option<NaiveDate>,
    pub department: Option<String>,
    pub vendor_name: Option<String>,
    pub currency: Option<Currency>,
    pub justification: Option<String>,
    #[serde(default)]
    pub items: Vec<NewPrLine>,
}

/// Partial update of a draft PR; `items`, when present, replaces every line
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PurchaseRequestChanges {
    pub priority: Option<Priority>,
    pub required_date: Option<NaiveDate>,
    pub department: Option<String>,
    pub vendor_name: Option<String>,
    pub currency: Option<Currency>,
    pub justification: Option<String>,
    pub items: Option<Vec<NewPrLine>>,
}

/// Quantity a verified Goods Receipt adds to one PR line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrReceiptIncrement {
    pub line_no: i32,
    pub quantity: Decimal,
}

fn build_lines(items: Vec<NewPrLine>) -> DomainResult<Vec<PrLineItem>> {
    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            let field = |name: &str| format!("items[{}].{}", idx, name);

            matching::product_ref(&item).map_err(|u| u.into_error(field("product")))?;
            validation::validate_quantity(item.quantity)
                .map_err(|m| DomainError::validation(field("quantity"), m))?;
            validation::validate_unit_price(item.unit_price)
                .map_err(|m| DomainError::validation(field("unit_price"), m))?;

            Ok(PrLineItem {
                line_no: idx as i32 + 1,
                product_id: item.product_id,
                product_name: item
                    .product_name
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty()),
                unit: item.unit,
                total_price: validation::line_total(item.quantity, item.unit_price),
                quantity: item.quantity,
                unit_price: item.unit_price,
                quantity_received: Decimal::ZERO,
                justification: item.justification,
                specifications: item.specifications,
            })
        })
        .collect()
}

impl PurchaseRequest {
    /// Create a draft owned by `actor`
    pub fn draft(
        actor: &Actor,
        pr_number: String,
        input: NewPurchaseRequest,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        actor.require(Capability::ModifyInventory, "create purchase requests")?;

        let items = build_lines(input.items)?;
        let mut pr = Self {
            id: 0,
            pr_number,
            status: PrStatus::Draft,
            priority: input.priority.unwrap_or_default(),
            requested_by: actor.id,
            requested_date: input.requested_date.unwrap_or_else(|| now.date_naive()),
            required_date: input.required_date,
            department: input.department,
            vendor_name: input.vendor_name,
            currency: input.currency.unwrap_or_default(),
            total_estimated_cost: Decimal::ZERO,
            justification: input.justification,
            rejection_reason: None,
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejected_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
            items,
        };
        pr.recompute_total();
        Ok(pr)
    }

    /// `total_estimated_cost = Σ line.total_price`
    pub fn recompute_total(&mut self) {
        self.total_estimated_cost = self.items.iter().map(|l| l.total_price).sum();
    }

    fn expect_status(&self, expected: &[PrStatus], action: &str) -> DomainResult<()> {
        if expected.contains(&self.status) {
            Ok(())
        } else {
            Err(DomainError::conflict(
                format!("Cannot {} a {} purchase request", action, self.status),
                self.status,
            ))
        }
    }

    /// draft -> pending
    pub fn submit(&mut self, actor: &Actor, now: DateTime<Utc>) -> DomainResult<()> {
        actor.require_owner(self.requested_by, "submit this purchase request")?;
        self.expect_status(&[PrStatus::Draft], "submit")?;
        if !self.items.iter().any(|l| l.quantity > Decimal::ZERO) {
            return Err(DomainError::validation(
                "items",
                "At least one line with a positive quantity is required",
            ));
        }
        self.status = PrStatus::Pending;
        self.updated_at = now;
        Ok(())
    }

    /// pending -> approved
    pub fn approve(&mut self, actor: &Actor, now: DateTime<Utc>) -> DomainResult<()> {
        actor.require(Capability::ApproveOrVerify, "approve purchase requests")?;
        self.expect_status(&[PrStatus::Pending], "approve")?;
        self.status = PrStatus::Approved;
        self.approved_by = Some(actor.id);
        self.approved_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// pending -> rejected
    pub fn reject(&mut self, actor: &Actor, reason: &str, now: DateTime<Utc>) -> DomainResult<()> {
        actor.require(Capability::ApproveOrVerify, "reject purchase requests")?;
        self.expect_status(&[PrStatus::Pending], "reject")?;
        validation::validate_reason(reason)
            .map_err(|m| DomainError::validation("rejection_reason", m))?;
        self.status = PrStatus::Rejected;
        self.rejection_reason = Some(reason.trim().to_string());
        self.rejected_by = Some(actor.id);
        self.rejected_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// draft | pending -> cancelled, by the owner
    pub fn cancel(&mut self, actor: &Actor, now: DateTime<Utc>) -> DomainResult<()> {
        actor.require_owner(self.requested_by, "cancel this purchase request")?;
        self.expect_status(&[PrStatus::Draft, PrStatus::Pending], "cancel")?;
        self.status = PrStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Edit a draft; totals are recomputed on every edit
    pub fn update(
        &mut self,
        actor: &Actor,
        changes: PurchaseRequestChanges,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        actor.require_owner(self.requested_by, "edit this purchase request")?;
        self.expect_status(&[PrStatus::Draft], "edit")?;

        if let Some(items) = changes.items {
            self.items = build_lines(items)?;
        }
        if let Some(priority) = changes.priority {
            self.priority = priority;
        }
        if let Some(currency) = changes.currency {
            self.currency = currency;
        }
        if changes.required_date.is_some() {
            self.required_date = changes.required_date;
        }
        if changes.department.is_some() {
            self.department = changes.department;
        }
        if changes.vendor_name.is_some() {
            self.vendor_name = changes.vendor_name;
        }
        if changes.justification.is_some() {
            self.justification = changes.justification;
        }

        self.recompute_total();
        self.updated_at = now;
        Ok(())
    }

    pub fn ensure_deletable(&self, actor: &Actor) -> DomainResult<()> {
        actor.require_owner(self.requested_by, "delete this purchase request")?;
        self.expect_status(&[PrStatus::Draft], "delete")
    }

    /// Goods Receipts may only be raised against an approved PR
    pub fn ensure_receivable(&self) -> DomainResult<()> {
        self.expect_status(&[PrStatus::Approved], "receive goods against")
    }

    pub fn has_remaining(&self) -> bool {
        self.items.iter().any(|l| l.remaining_to_receive() > Decimal::ZERO)
    }

    /// Add received quantities from a verified Goods Receipt
    pub fn apply_receipt(
        &mut self,
        increments: &[PrReceiptIncrement],
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        for inc in increments {
            if !self.items.iter().any(|l| l.line_no == inc.line_no) {
                return Err(DomainError::not_found(format!(
                    "Line {} of {}",
                    inc.line_no, self.pr_number
                )));
            }
        }
        for inc in increments {
            if let Some(line) = self.items.iter_mut().find(|l| l.line_no == inc.line_no) {
                line.quantity_received += inc.quantity;
            }
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn line(&self, line_no: i32) -> Option<&PrLineItem> {
        self.items.iter().find(|l| l.line_no == line_no)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn keeper() -> Actor {
        Actor::new(10, Role::StockKeeper)
    }

    fn manager() -> Actor {
        Actor::new(20, Role::StockManager)
    }

    fn line(name: &str, qty: Decimal, price: Decimal) -> NewPrLine {
        NewPrLine {
            product_id: None,
            product_name: Some(name.to_string()),
            unit: None,
            quantity: qty,
            unit_price: price,
            justification: None,
            specifications: None,
        }
    }

    fn input(items: Vec<NewPrLine>) -> NewPurchaseRequest {
        NewPurchaseRequest {
            priority: None,
            requested_date: None,
            required_date: None,
            department: Some("Maintenance".to_string()),
            vendor_name: Some("Kabul Supplies".to_string()),
            currency: None,
            justification: None,
            items,
        }
    }

    fn sample() -> PurchaseRequest {
        PurchaseRequest::draft(
            &keeper(),
            "PR-2026-00001".to_string(),
            input(vec![
                line("Cable", dec!(10), dec!(5)),
                line("Switch", dec!(5), dec!(20)),
            ]),
            Utc::now(),
        )
        .unwrap()
    }

    // ========================================================================
    // Creation & Totals
    // ========================================================================

    #[test]
    fn test_draft_derives_totals() {
        let pr = sample();
        assert_eq!(pr.status, PrStatus::Draft);
        assert_eq!(pr.requested_by, 10);
        assert_eq!(pr.total_estimated_cost, dec!(150));
        assert_eq!(pr.items[1].line_no, 2);
        assert_eq!(pr.items[1].total_price, dec!(100));
    }

    #[test]
    fn test_viewer_cannot_create() {
        let viewer = Actor::new(1, Role::Viewer);
        let err = PurchaseRequest::draft(&viewer, "PR".into(), input(vec![]), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn test_line_requires_product_reference() {
        let mut bad = line("  ", dec!(1), dec!(1));
        bad.product_name = Some("  ".to_string());
        let err = PurchaseRequest::draft(&keeper(), "PR".into(), input(vec![bad]), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation { ref field, .. } if field == "items[0].product"));
    }

    #[test]
    fn test_zero_quantity_line_rejected() {
        let err = PurchaseRequest::draft(
            &keeper(),
            "PR".into(),
            input(vec![line("Cable", Decimal::ZERO, dec!(1))]),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    #[test]
    fn test_submit_approve_path() {
        let mut pr = sample();
        pr.submit(&keeper(), Utc::now()).unwrap();
        assert_eq!(pr.status, PrStatus::Pending);
        pr.approve(&manager(), Utc::now()).unwrap();
        assert_eq!(pr.status, PrStatus::Approved);
        assert_eq!(pr.approved_by, Some(20));
        assert!(pr.approved_at.is_some());
    }

    #[test]
    fn test_direct_approve_from_draft_is_conflict() {
        let mut pr = sample();
        let err = pr.approve(&manager(), Utc::now()).unwrap_err();
        assert_eq!(
            err,
            DomainError::conflict("Cannot approve a draft purchase request", "draft")
        );
        assert_eq!(pr.status, PrStatus::Draft);
    }

    #[test]
    fn test_submit_empty_draft_rejected() {
        let mut pr =
            PurchaseRequest::draft(&keeper(), "PR".into(), input(vec![]), Utc::now()).unwrap();
        assert!(matches!(
            pr.submit(&keeper(), Utc::now()),
            Err(DomainError::Validation { .. })
        ));
    }

    #[test]
    fn test_only_owner_may_submit_update_delete() {
        let admin = Actor::new(1, Role::Admin);
        let mut pr = sample();
        assert!(matches!(
            pr.submit(&admin, Utc::now()),
            Err(DomainError::Forbidden(_))
        ));
        assert!(matches!(
            pr.update(&admin, PurchaseRequestChanges::default(), Utc::now()),
            Err(DomainError::Forbidden(_))
        ));
        assert!(matches!(
            pr.ensure_deletable(&admin),
            Err(DomainError::Forbidden(_))
        ));
        assert!(pr.ensure_deletable(&keeper()).is_ok());
    }

    #[test]
    fn test_reject_requires_reason() {
        let mut pr = sample();
        pr.submit(&keeper(), Utc::now()).unwrap();
        assert!(matches!(
            pr.reject(&manager(), " ", Utc::now()),
            Err(DomainError::Validation { .. })
        ));
        pr.reject(&manager(), "Over budget", Utc::now()).unwrap();
        assert_eq!(pr.status, PrStatus::Rejected);
        assert_eq!(pr.rejection_reason.as_deref(), Some("Over budget"));
        assert_eq!(pr.rejected_by, Some(20));
    }

    #[test]
    fn test_keeper_cannot_approve() {
        let mut pr = sample();
        pr.submit(&keeper(), Utc::now()).unwrap();
        assert!(matches!(
            pr.approve(&keeper(), Utc::now()),
            Err(DomainError::Forbidden(_))
        ));
    }

    #[test]
    fn test_cancel_from_pending_but_not_approved() {
        let mut pr = sample();
        pr.submit(&keeper(), Utc::now()).unwrap();
        pr.cancel(&keeper(), Utc::now()).unwrap();
        assert_eq!(pr.status, PrStatus::Cancelled);

        let mut approved = sample();
        approved.submit(&keeper(), Utc::now()).unwrap();
        approved.approve(&manager(), Utc::now()).unwrap();
        assert!(matches!(
            approved.cancel(&keeper(), Utc::now()),
            Err(DomainError::Conflict { .. })
        ));
    }

    #[test]
    fn test_update_replaces_lines_and_recomputes() {
        let mut pr = sample();
        let changes = PurchaseRequestChanges {
            items: Some(vec![line("Cable", dec!(3), dec!(2.5))]),
            priority: Some(Priority::Urgent),
            ..Default::default()
        };
        pr.update(&keeper(), changes, Utc::now()).unwrap();
        assert_eq!(pr.items.len(), 1);
        assert_eq!(pr.total_estimated_cost, dec!(7.5));
        assert_eq!(pr.priority, Priority::Urgent);
    }

    #[test]
    fn test_total_keeps_sub_cent_precision() {
        let items = vec![
            line("Washer", dec!(3), dec!(0.333)),
            line("Shim", dec!(1), dec!(0.005)),
            line("Pin", dec!(1), dec!(0.005)),
        ];
        let pr = PurchaseRequest::draft(&keeper(), "PR".into(), input(items), Utc::now()).unwrap();
        assert_eq!(pr.items[0].total_price, dec!(0.999));
        assert_eq!(pr.total_estimated_cost, dec!(1.009));
    }

    #[test]
    fn test_draft_rejects_five_decimal_quantity() {
        let items = vec![line("Washer", dec!(0.00001), dec!(1))];
        let result = PurchaseRequest::draft(&keeper(), "PR".into(), input(items), Utc::now());
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[test]
    fn test_update_after_submit_is_conflict() {
        let mut pr = sample();
        pr.submit(&keeper(), Utc::now()).unwrap();
        assert!(matches!(
            pr.update(&keeper(), PurchaseRequestChanges::default(), Utc::now()),
            Err(DomainError::Conflict { .. })
        ));
    }

    // ========================================================================
    // Receipt bookkeeping
    // ========================================================================

    #[test]
    fn test_apply_receipt_tracks_remaining() {
        let mut pr = sample();
        pr.apply_receipt(
            &[PrReceiptIncrement {
                line_no: 1,
                quantity: dec!(6),
            }],
            Utc::now(),
        )
        .unwrap();
        assert_eq!(pr.items[0].quantity_received, dec!(6));
        assert_eq!(pr.items[0].remaining_to_receive(), dec!(4));
        assert!(pr.has_remaining());
    }

    #[test]
    fn test_apply_receipt_unknown_line_applies_nothing() {
        let mut pr = sample();
        let result = pr.apply_receipt(
            &[
                PrReceiptIncrement {
                    line_no: 1,
                    quantity: dec!(2),
                },
                PrReceiptIncrement {
                    line_no: 9,
                    quantity: dec!(1),
                },
            ],
            Utc::now(),
        );
        assert!(matches!(result, Err(DomainError::NotFound(_))));
        assert_eq!(pr.items[0].quantity_received, Decimal::ZERO);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_total_is_sum_of_lines(
            lines in prop::collection::vec((1i64..10_000_000, 0i64..10_000_000), 1..12)
        ) {
            let items: Vec<NewPrLine> = lines
                .iter()
                .map(|(q, p)| line("Item", Decimal::new(*q, 4), Decimal::new(*p, 4)))
                .collect();
            let pr = PurchaseRequest::draft(&keeper(), "PR".into(), input(items), Utc::now()).unwrap();
            let expected: Decimal = lines
                .iter()
                .map(|(q, p)| Decimal::new(*q, 4) * Decimal::new(*p, 4))
                .sum();
            prop_assert_eq!(pr.total_estimated_cost, expected);
        }
    }
}
