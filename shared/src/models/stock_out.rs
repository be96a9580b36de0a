//! Stock Out records and their posting lifecycle
//!
//! `draft -> ready -> done`, with `draft | ready -> cancelled`. Ready and done records count
//! toward total-out. The requested quantity is checked against available stock when a
//! record is created and again whenever it becomes posted.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::ledger::LedgerDelta;
use crate::models::{Actor, Capability, Role};
use crate::validation;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StockOutStatus {
    Draft,
    Ready,
    Done,
    Cancelled,
}

impl StockOutStatus {
    /// Statuses that count toward total-out
    pub const POSTED: [StockOutStatus; 2] = [StockOutStatus::Ready, StockOutStatus::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            StockOutStatus::Draft => "draft",
            StockOutStatus::Ready => "ready",
            StockOutStatus::Done => "done",
            StockOutStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(StockOutStatus::Draft),
            "ready" => Some(StockOutStatus::Ready),
            "done" => Some(StockOutStatus::Done),
            "cancelled" => Some(StockOutStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_posted(&self) -> bool {
        Self::POSTED.contains(self)
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, StockOutStatus::Done | StockOutStatus::Cancelled)
    }

    pub fn initial_for(role: Role) -> Self {
        if role.can_approve_or_verify() {
            StockOutStatus::Ready
        } else {
            StockOutStatus::Draft
        }
    }
}

impl std::fmt::Display for StockOutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockOut {
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
    pub status: StockOutStatus,
    pub remarks: Option<String>,
    pub year: i32,
    pub month: u32,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStockOut {
    pub product_id: i64,
    pub date: Option<NaiveDate>,
    pub quantity: Decimal,
    pub issued_to_id: Option<i64>,
    pub technician_id: Option<i64>,
    pub site: Option<String>,
    pub location: Option<String>,
    pub request_number: Option<String>,
    pub destination_document: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub remarks: Option<String>,
}

/// Editable fields; the product of a record never changes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StockOutChanges {
    pub date: Option<NaiveDate>,
    pub quantity: Option<Decimal>,
    pub issued_to_id: Option<i64>,
    pub technician_id: Option<i64>,
    pub site: Option<String>,
    pub location: Option<String>,
    pub request_number: Option<String>,
    pub destination_document: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub remarks: Option<String>,
}

fn ensure_available(product_id: i64, requested: Decimal, available: Decimal) -> DomainResult<()> {
    if requested > available {
        return Err(DomainError::InsufficientStock {
            product_id,
            requested,
            available,
        });
    }
    Ok(())
}

impl StockOut {
    /// Create a record; `available` is the product's current available stock
    pub fn create(
        actor: &Actor,
        reference_number: String,
        input: NewStockOut,
        available: Decimal,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        actor.require(Capability::ModifyInventory, "create stock out records")?;
        validation::validate_quantity(input.quantity)
            .map_err(|m| DomainError::validation("quantity", m))?;
        ensure_available(input.product_id, input.quantity, available)?;

        let date = input.date.unwrap_or_else(|| now.date_naive());
        Ok(Self {
            id: 0,
            reference_number,
            product_id: input.product_id,
            date,
            quantity: input.quantity,
            issued_to_id: input.issued_to_id,
            technician_id: input.technician_id,
            site: input.site,
            location: input.location,
            request_number: input.request_number,
            destination_document: input.destination_document,
            scheduled_date: input.scheduled_date,
            status: StockOutStatus::initial_for(actor.role),
            remarks: input.remarks,
            year: date.year(),
            month: date.month(),
            created_by: actor.id,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn posted_delta(&self) -> Option<LedgerDelta> {
        self.status
            .is_posted()
            .then(|| LedgerDelta::stock_out(self.product_id, self.quantity))
    }

    fn conflict(&self, action: &str) -> DomainError {
        DomainError::conflict(
            format!("Cannot {} a {} stock out", action, self.status),
            self.status,
        )
    }

    /// draft -> ready; posts
    pub fn ready(
        &mut self,
        actor: &Actor,
        available: Decimal,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<LedgerDelta>> {
        actor.require(Capability::ApproveOrVerify, "release stock out records")?;
        if self.status != StockOutStatus::Draft {
            return Err(self.conflict("release"));
        }
        ensure_available(self.product_id, self.quantity, available)?;
        self.status = StockOutStatus::Ready;
        self.updated_at = now;
        Ok(self.posted_delta())
    }

    /// ready -> done without ledger change, or draft -> done (approvers only) which posts
    pub fn complete(
        &mut self,
        actor: &Actor,
        available: Decimal,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<LedgerDelta>> {
        actor.require(Capability::ModifyInventory, "complete stock out records")?;
        let delta = match self.status {
            StockOutStatus::Ready => None,
            StockOutStatus::Draft => {
                actor.require(Capability::ApproveOrVerify, "post draft stock out records")?;
                ensure_available(self.product_id, self.quantity, available)?;
                Some(LedgerDelta::stock_out(self.product_id, self.quantity))
            }
            _ => return Err(self.conflict("complete")),
        };
        self.status = StockOutStatus::Done;
        self.updated_at = now;
        Ok(delta)
    }

    /// draft | ready -> cancelled; cancelling a ready record returns its stock
    pub fn cancel(&mut self, actor: &Actor, now: DateTime<Utc>) -> DomainResult<Option<LedgerDelta>> {
        actor.require(Capability::ModifyInventory, "cancel stock out records")?;
        let delta = match self.status {
            StockOutStatus::Draft => None,
            StockOutStatus::Ready => {
                actor.require(Capability::ApproveOrVerify, "cancel ready stock out records")?;
                self.posted_delta().map(|d| d.reversed())
            }
            _ => return Err(self.conflict("cancel")),
        };
        self.status = StockOutStatus::Cancelled;
        self.updated_at = now;
        Ok(delta)
    }

    /// Edit a draft, or a ready record as an approver
    pub fn update(
        &mut self,
        actor: &Actor,
        changes: StockOutChanges,
        available: Decimal,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<LedgerDelta>> {
        actor.require(Capability::ModifyInventory, "edit stock out records")?;
        match self.status {
            StockOutStatus::Draft => {}
            StockOutStatus::Ready => {
                actor.require(Capability::ApproveOrVerify, "edit ready stock out records")?
            }
            _ => return Err(self.conflict("edit")),
        }

        let old_quantity = self.quantity;
        let quantity = changes.quantity.unwrap_or(old_quantity);
        validation::validate_quantity(quantity)
            .map_err(|m| DomainError::validation("quantity", m))?;
        if quantity != old_quantity {
            // A posted record already holds its old quantity out of `available`
            let headroom = if self.status.is_posted() {
                available + old_quantity
            } else {
                available
            };
            ensure_available(self.product_id, quantity, headroom)?;
        }

        self.quantity = quantity;
        if let Some(date) = changes.date {
            self.date = date;
            self.year = date.year();
            self.month = date.month();
        }
        if changes.issued_to_id.is_some() {
            self.issued_to_id = changes.issued_to_id;
        }
        if changes.technician_id.is_some() {
            self.technician_id = changes.technician_id;
        }
        if changes.site.is_some() {
            self.site = changes.site;
        }
        if changes.location.is_some() {
            self.location = changes.location;
        }
        if changes.request_number.is_some() {
            self.request_number = changes.request_number;
        }
        if changes.destination_document.is_some() {
            self.destination_document = changes.destination_document;
        }
        if changes.scheduled_date.is_some() {
            self.scheduled_date = changes.scheduled_date;
        }
        if changes.remarks.is_some() {
            self.remarks = changes.remarks;
        }
        self.updated_at = now;

        let delta = LedgerDelta::stock_out(self.product_id, quantity - old_quantity);
        Ok((self.status.is_posted() && !delta.is_zero()).then_some(delta))
    }

    pub fn ensure_deletable(&self, actor: &Actor) -> DomainResult<()> {
        actor.require(Capability::Delete, "delete stock out records")?;
        match self.status {
            StockOutStatus::Draft | StockOutStatus::Cancelled => Ok(()),
            _ => Err(self.conflict("delete")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::StockLedger;
    use rust_decimal_macros::dec;

    fn keeper() -> Actor {
        Actor::new(10, Role::StockKeeper)
    }

    fn manager() -> Actor {
        Actor::new(20, Role::StockManager)
    }

    fn request(quantity: Decimal) -> NewStockOut {
        NewStockOut {
            product_id: 1,
            date: None,
            quantity,
            issued_to_id: Some(44),
            technician_id: None,
            site: Some("Site A".to_string()),
            location: None,
            request_number: None,
            destination_document: None,
            scheduled_date: None,
            remarks: None,
        }
    }

    fn ledger(opening: Decimal) -> StockLedger {
        let mut ledger = StockLedger::new();
        ledger.register_product(1, opening);
        ledger
    }

    #[test]
    fn test_default_status_by_role() {
        let draft = StockOut::create(&keeper(), "SO-1".into(), request(dec!(2)), dec!(10), Utc::now())
            .unwrap();
        assert_eq!(draft.status, StockOutStatus::Draft);
        assert_eq!(draft.posted_delta(), None);

        let ready = StockOut::create(&manager(), "SO-2".into(), request(dec!(2)), dec!(10), Utc::now())
            .unwrap();
        assert_eq!(ready.status, StockOutStatus::Ready);
        assert_eq!(ready.posted_delta(), Some(LedgerDelta::stock_out(1, dec!(2))));
    }

    #[test]
    fn test_insufficient_stock_on_create() {
        let err = StockOut::create(&manager(), "SO-1".into(), request(dec!(11)), dec!(10), Utc::now())
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                product_id: 1,
                requested: dec!(11),
                available: dec!(10),
            }
        );
    }

    #[test]
    fn test_viewer_cannot_create() {
        let viewer = Actor::new(5, Role::Viewer);
        assert!(matches!(
            StockOut::create(&viewer, "SO-1".into(), request(dec!(1)), dec!(10), Utc::now()),
            Err(DomainError::Forbidden(_))
        ));
    }

    #[test]
    fn test_ready_rechecks_availability() {
        let mut ledger = ledger(dec!(10));
        let mut record =
            StockOut::create(&keeper(), "SO-1".into(), request(dec!(8)), ledger.available(1), Utc::now())
                .unwrap();

        // stock drained elsewhere in the meantime
        ledger.apply(LedgerDelta::stock_out(1, dec!(5))).unwrap();
        let err = record
            .ready(&manager(), ledger.available(1), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { .. }));
        assert_eq!(record.status, StockOutStatus::Draft);
        assert_eq!(ledger.available(1), dec!(5));
    }

    #[test]
    fn test_post_and_cancel_round_trip() {
        let mut ledger = ledger(dec!(10));
        let mut record =
            StockOut::create(&keeper(), "SO-1".into(), request(dec!(4)), ledger.available(1), Utc::now())
                .unwrap();
        ledger
            .apply_opt(record.ready(&manager(), ledger.available(1), Utc::now()).unwrap())
            .unwrap();
        assert_eq!(ledger.available(1), dec!(6));

        ledger
            .apply_opt(record.cancel(&manager(), Utc::now()).unwrap())
            .unwrap();
        assert_eq!(ledger.available(1), dec!(10));
        assert!(record.status.is_read_only());
    }

    #[test]
    fn test_keeper_cannot_cancel_ready() {
        let mut record =
            StockOut::create(&manager(), "SO-1".into(), request(dec!(4)), dec!(10), Utc::now()).unwrap();
        assert!(matches!(
            record.cancel(&keeper(), Utc::now()),
            Err(DomainError::Forbidden(_))
        ));
        record.complete(&keeper(), dec!(6), Utc::now()).unwrap();
        assert_eq!(record.status, StockOutStatus::Done);
    }

    #[test]
    fn test_update_ready_counts_own_quantity_as_headroom() {
        let mut ledger = ledger(dec!(10));
        let mut record =
            StockOut::create(&manager(), "SO-1".into(), request(dec!(4)), ledger.available(1), Utc::now())
                .unwrap();
        ledger.apply_opt(record.posted_delta()).unwrap();
        assert_eq!(ledger.available(1), dec!(6));

        let grow = StockOutChanges {
            quantity: Some(dec!(10)),
            ..Default::default()
        };
        let delta = record
            .update(&manager(), grow, ledger.available(1), Utc::now())
            .unwrap();
        ledger.apply_opt(delta).unwrap();
        assert_eq!(ledger.available(1), Decimal::ZERO);

        let too_much = StockOutChanges {
            quantity: Some(dec!(11)),
            ..Default::default()
        };
        assert!(matches!(
            record.update(&manager(), too_much, ledger.available(1), Utc::now()),
            Err(DomainError::InsufficientStock { .. })
        ));
        assert_eq!(record.quantity, dec!(10));
    }

    #[test]
    fn test_delete_only_unposted() {
        let record =
            StockOut::create(&manager(), "SO-1".into(), request(dec!(1)), dec!(10), Utc::now()).unwrap();
        assert!(matches!(
            record.ensure_deletable(&manager()),
            Err(DomainError::Conflict { .. })
        ));
        let draft =
            StockOut::create(&keeper(), "SO-2".into(), request(dec!(1)), dec!(10), Utc::now()).unwrap();
        assert!(draft.ensure_deletable(&manager()).is_ok());
        assert!(matches!(
            draft.ensure_deletable(&keeper()),
            Err(DomainError::Forbidden(_))
        ));
    }
}
