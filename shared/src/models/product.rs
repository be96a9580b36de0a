//! Product catalog model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::matching::ProductKeyed;
use crate::models::{Actor, Capability};
use crate::types::Currency;
use crate::validation;

/// A stocked product. `opening_stock` is the static baseline of the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub unit: String,
    pub opening_stock: Decimal,
    pub unit_price: Decimal,
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
}

/// Input for registering a product
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    pub unit: String,
    #[serde(default)]
    pub opening_stock: Decimal,
    #[serde(default)]
    pub unit_price: Decimal,
    pub currency: Option<Currency>,
}

impl Product {
    /// Build a product from input; the id is assigned on insert
    pub fn register(actor: &Actor, input: NewProduct, now: DateTime<Utc>) -> DomainResult<Self> {
        actor.require(Capability::ApproveOrVerify, "register products")?;

        let name = input.name.trim().to_string();
        validation::validate_product_name(&name)
            .map_err(|m| DomainError::validation("name", m))?;
        if input.category.trim().is_empty() {
            return Err(DomainError::validation("category", "Category is required"));
        }
        if input.unit.trim().is_empty() {
            return Err(DomainError::validation("unit", "Unit is required"));
        }
        if input.opening_stock < Decimal::ZERO {
            return Err(DomainError::validation(
                "opening_stock",
                "Opening stock cannot be negative",
            ));
        }
        if validation::exceeds_scale(input.opening_stock) {
            return Err(DomainError::validation(
                "opening_stock",
                "Opening stock must have at most 4 decimal places",
            ));
        }
        validation::validate_unit_price(input.unit_price)
            .map_err(|m| DomainError::validation("unit_price", m))?;

        Ok(Self {
            id: 0,
            name,
            category: input.category.trim().to_string(),
            unit: input.unit.trim().to_string(),
            opening_stock: input.opening_stock,
            unit_price: input.unit_price,
            currency: input.currency.unwrap_or_default(),
            created_at: now,
        })
    }
}

impl ProductKeyed for Product {
    fn product_id(&self) -> Option<i64> {
        Some(self.id)
    }

    fn product_name(&self) -> Option<&str> {
        Some(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use rust_decimal_macros::dec;

    fn input() -> NewProduct {
        NewProduct {
            name: "  Cement 50kg ".to_string(),
            category: "Construction".to_string(),
            unit: "bag".to_string(),
            opening_stock: dec!(12),
            unit_price: dec!(450),
            currency: None,
        }
    }

    #[test]
    fn test_register_trims_and_defaults_currency() {
        let manager = Actor::new(2, Role::StockManager);
        let product = Product::register(&manager, input(), Utc::now()).unwrap();
        assert_eq!(product.name, "Cement 50kg");
        assert_eq!(product.currency, Currency::Afn);
    }

    #[test]
    fn test_keeper_cannot_register() {
        let keeper = Actor::new(3, Role::StockKeeper);
        assert!(matches!(
            Product::register(&keeper, input(), Utc::now()),
            Err(DomainError::Forbidden(_))
        ));
    }

    #[test]
    fn test_negative_opening_stock_rejected() {
        let admin = Actor::new(1, Role::Admin);
        let mut bad = input();
        bad.opening_stock = dec!(-1);
        let err = Product::register(&admin, bad, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation { ref field, .. } if field == "opening_stock"));
    }

    #[test]
    fn test_sub_ten_thousandth_price_rejected() {
        let admin = Actor::new(1, Role::Admin);
        let mut bad = input();
        bad.unit_price = dec!(0.00001);
        let err = Product::register(&admin, bad, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation { ref field, .. } if field == "unit_price"));
    }
}
