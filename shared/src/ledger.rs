//! In-memory stock ledger
//!
//! Stock In and Stock Out transitions return a [`LedgerDelta`] whenever a record enters or
//! leaves a posted status. Applying every delta in order keeps
//! `available = opening + total_in - total_out` for each product.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Change to a product's cumulative totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerDelta {
    pub product_id: i64,
    pub total_in: Decimal,
    pub total_out: Decimal,
}

impl LedgerDelta {
    pub fn stock_in(product_id: i64, quantity: Decimal) -> Self {
        Self {
            product_id,
            total_in: quantity,
            total_out: Decimal::ZERO,
        }
    }

    pub fn stock_out(product_id: i64, quantity: Decimal) -> Self {
        Self {
            product_id,
            total_in: Decimal::ZERO,
            total_out: quantity,
        }
    }

    /// The delta that undoes this one
    pub fn reversed(&self) -> Self {
        Self {
            product_id: self.product_id,
            total_in: -self.total_in,
            total_out: -self.total_out,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.total_in.is_zero() && self.total_out.is_zero()
    }

    /// Net effect on available stock
    pub fn net(&self) -> Decimal {
        self.total_in - self.total_out
    }
    /// Refuse a delta that would take `available` below zero
    pub fn ensure_covered(&self, available: Decimal) -> DomainResult<()> {
        let reduction = -self.net();
        if reduction > available {
            return Err(DomainError::InsufficientStock {
                product_id: self.product_id,
                requested: reduction,
                available,
            });
        }
        Ok(())
    }
}

/// Cumulative totals for one product
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductTotals {
    pub opening_stock: Decimal,
    pub total_in: Decimal,
    pub total_out: Decimal,
}

impl ProductTotals {
    pub fn available(&self) -> Decimal {
        self.opening_stock + self.total_in - self.total_out
    }
}

/// Product-keyed ledger of posted totals
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StockLedger {
    products: BTreeMap<i64, ProductTotals>,
}

impl StockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a product with its opening stock; re-registering resets the opening balance only
    pub fn register_product(&mut self, product_id: i64, opening_stock: Decimal) {
        self.products.entry(product_id).or_default().opening_stock = opening_stock;
    }

    pub fn apply(&mut self, delta: LedgerDelta) -> DomainResult<()> {
        let totals = self
            .products
            .get_mut(&delta.product_id)
            .ok_or_else(|| DomainError::not_found(format!("Product {}", delta.product_id)))?;
        totals.total_in += delta.total_in;
        totals.total_out += delta.total_out;
        Ok(())
    }

    /// Apply an optional delta, as returned by posting transitions
    pub fn apply_opt(&mut self, delta: Option<LedgerDelta>) -> DomainResult<()> {
        match delta {
            Some(delta) => self.apply(delta),
            None => Ok(()),
        }
    }

    pub fn totals(&self, product_id: i64) -> Option<ProductTotals> {
        self.products.get(&product_id).copied()
    }

    /// Available stock; unknown products have none
    pub fn available(&self, product_id: i64) -> Decimal {
        self.totals(product_id)
            .map(|t| t.available())
            .unwrap_or(Decimal::ZERO)
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &ProductTotals)> {
        self.products.iter().map(|(id, totals)| (*id, totals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reversal_must_be_covered() {
        let posted = LedgerDelta::stock_in(1, dec!(6));
        assert!(posted.ensure_covered(Decimal::ZERO).is_ok());
        assert!(posted.reversed().ensure_covered(dec!(6)).is_ok());

        let err = posted.reversed().ensure_covered(dec!(2)).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                product_id: 1,
                requested: dec!(6),
                available: dec!(2),
            }
        );
    }

    #[test]
    fn test_apply_and_reverse() {
        let mut ledger = StockLedger::new();
        ledger.register_product(1, dec!(20));

        let posted = LedgerDelta::stock_in(1, dec!(6));
        ledger.apply(posted).unwrap();
        assert_eq!(ledger.available(1), dec!(26));

        ledger.apply(LedgerDelta::stock_out(1, dec!(4))).unwrap();
        assert_eq!(ledger.available(1), dec!(22));

        ledger.apply(posted.reversed()).unwrap();
        let totals = ledger.totals(1).unwrap();
        assert_eq!(totals.total_in, Decimal::ZERO);
        assert_eq!(totals.total_out, dec!(4));
        assert_eq!(ledger.available(1), dec!(16));
    }

    #[test]
    fn test_unknown_product_is_not_found() {
        let mut ledger = StockLedger::new();
        let err = ledger.apply(LedgerDelta::stock_in(99, dec!(1))).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
        assert_eq!(ledger.available(99), Decimal::ZERO);
    }

    #[test]
    fn test_apply_opt_none_is_noop() {
        let mut ledger = StockLedger::new();
        ledger.register_product(1, dec!(5));
        ledger.apply_opt(None).unwrap();
        assert_eq!(ledger.available(1), dec!(5));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Posting then reversing any subset of deltas keeps the balance identity
        #[test]
        fn prop_balance_identity(
            opening in 0i64..1000,
            moves in prop::collection::vec((any::<bool>(), 1i64..100, any::<bool>()), 0..40)
        ) {
            let mut ledger = StockLedger::new();
            ledger.register_product(7, Decimal::from(opening));

            let mut expected_in = Decimal::ZERO;
            let mut expected_out = Decimal::ZERO;
            for (is_in, qty, cancel) in moves {
                let qty = Decimal::from(qty);
                let delta = if is_in {
                    LedgerDelta::stock_in(7, qty)
                } else {
                    LedgerDelta::stock_out(7, qty)
                };
                ledger.apply(delta).unwrap();
                if cancel {
                    ledger.apply(delta.reversed()).unwrap();
                } else if is_in {
                    expected_in += qty;
                } else {
                    expected_out += qty;
                }
            }

            let totals = ledger.totals(7).unwrap();
            prop_assert_eq!(totals.total_in, expected_in);
            prop_assert_eq!(totals.total_out, expected_out);
            prop_assert_eq!(
                ledger.available(7),
                Decimal::from(opening) + expected_in - expected_out
            );
        }
    }
}
