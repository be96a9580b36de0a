//! Derived stock summary
//!
//! Per product: `available = opening + total_in - total_out`, where the totals count only
//! posted Stock In (validated, done) and Stock Out (ready, done) records. Nothing here is
//! stored; every figure is recomputed from the documents.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::ProductTotals;
use crate::models::{Product, StockIn, StockOut};
use crate::types::{Currency, CurrencyConverter};

pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 10;

/// Stock status band
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StockBand {
    OutOfStock,
    Low,
    InStock,
}

impl StockBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockBand::OutOfStock => "out_of_stock",
            StockBand::Low => "low",
            StockBand::InStock => "in_stock",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "out_of_stock" => Some(StockBand::OutOfStock),
            "low" => Some(StockBand::Low),
            "in_stock" => Some(StockBand::InStock),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StockBand::OutOfStock => "Out of Stock",
            StockBand::Low => "Low",
            StockBand::InStock => "In Stock",
        }
    }
}

impl std::fmt::Display for StockBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// `<= 0` is out of stock, below `threshold` is low
pub fn stock_band(available: Decimal, threshold: Decimal) -> StockBand {
    if available <= Decimal::ZERO {
        StockBand::OutOfStock
    } else if available < threshold {
        StockBand::Low
    } else {
        StockBand::InStock
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockSummary {
    pub product_id: i64,
    pub product_name: String,
    pub category: String,
    pub unit: String,
    pub unit_price: Decimal,
    pub currency: Currency,
    pub opening_stock: Decimal,
    pub total_in: Decimal,
    pub total_out: Decimal,
    pub available_stock: Decimal,
    pub status: StockBand,
    /// `available_stock × unit_price`, in `currency`
    pub stock_value: Decimal,
}

impl StockSummary {
    pub fn compute(product: &Product, total_in: Decimal, total_out: Decimal, threshold: Decimal) -> Self {
        let totals = ProductTotals {
            opening_stock: product.opening_stock,
            total_in,
            total_out,
        };
        let available = totals.available();
        Self {
            product_id: product.id,
            product_name: product.name.clone(),
            category: product.category.clone(),
            unit: product.unit.clone(),
            unit_price: product.unit_price,
            currency: product.currency,
            opening_stock: product.opening_stock,
            total_in,
            total_out,
            available_stock: available,
            status: stock_band(available, threshold),
            stock_value: (available * product.unit_price).round_dp(2),
        }
    }
}

/// Summaries for every product from the raw documents
pub fn summarize(
    products: &[Product],
    stock_ins: &[StockIn],
    stock_outs: &[StockOut],
    threshold: Decimal,
) -> Vec<StockSummary> {
    let mut totals: BTreeMap<i64, (Decimal, Decimal)> = BTreeMap::new();
    for si in stock_ins.iter().filter(|si| si.status.is_posted()) {
        totals.entry(si.product_id).or_default().0 += si.quantity;
    }
    for so in stock_outs.iter().filter(|so| so.status.is_posted()) {
        totals.entry(so.product_id).or_default().1 += so.quantity;
    }

    products
        .iter()
        .map(|p| {
            let (total_in, total_out) = totals.get(&p.id).copied().unwrap_or_default();
            StockSummary::compute(p, total_in, total_out, threshold)
        })
        .collect()
}

/// Summary query filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryFilter {
    pub category: Option<String>,
    pub status: Option<StockBand>,
}

impl SummaryFilter {
    pub fn matches(&self, row: &StockSummary) -> bool {
        let category_ok = self
            .category
            .as_ref()
            .map(|c| c.trim().eq_ignore_ascii_case(row.category.trim()))
            .unwrap_or(true);
        let status_ok = self.status.map(|s| s == row.status).unwrap_or(true);
        category_ok && status_ok
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryTotals {
    pub category: String,
    pub product_count: usize,
    pub opening_stock: Decimal,
    pub total_in: Decimal,
    pub total_out: Decimal,
    pub available_stock: Decimal,
    /// Value in the reporting currency
    pub stock_value: Decimal,
    pub out_of_stock: usize,
    pub low_stock: usize,
}

impl CategoryTotals {
    fn add(&mut self, row: &StockSummary, value: Decimal) {
        self.product_count += 1;
        self.opening_stock += row.opening_stock;
        self.total_in += row.total_in;
        self.total_out += row.total_out;
        self.available_stock += row.available_stock;
        self.stock_value += value;
        match row.status {
            StockBand::OutOfStock => self.out_of_stock += 1,
            StockBand::Low => self.low_stock += 1,
            StockBand::InStock => {}
        }
    }
}

/// Category and grand totals with values converted into one reporting currency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryTotals {
    pub currency: Currency,
    pub categories: Vec<CategoryTotals>,
    pub grand_total: CategoryTotals,
}

impl SummaryTotals {
    pub fn aggregate(
        rows: &[StockSummary],
        converter: &CurrencyConverter,
        currency: Currency,
    ) -> Self {
        let mut categories: BTreeMap<String, CategoryTotals> = BTreeMap::new();
        let mut grand_total = CategoryTotals {
            category: "All".to_string(),
            ..Default::default()
        };

        for row in rows {
            let value = converter
                .convert(row.stock_value, row.currency, currency)
                .round_dp(2);
            categories
                .entry(row.category.clone())
                .or_insert_with(|| CategoryTotals {
                    category: row.category.clone(),
                    ..Default::default()
                })
                .add(row, value);
            grand_total.add(row, value);
        }

        Self {
            currency,
            categories: categories.into_values().collect(),
            grand_total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn product(id: i64, category: &str, opening: Decimal, price: Decimal, currency: Currency) -> Product {
        Product {
            id,
            name: format!("Product {}", id),
            category: category.to_string(),
            unit: "pcs".to_string(),
            opening_stock: opening,
            unit_price: price,
            currency,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_bands() {
        let threshold = Decimal::from(DEFAULT_LOW_STOCK_THRESHOLD);
        assert_eq!(stock_band(dec!(-2), threshold), StockBand::OutOfStock);
        assert_eq!(stock_band(Decimal::ZERO, threshold), StockBand::OutOfStock);
        assert_eq!(stock_band(dec!(9.5), threshold), StockBand::Low);
        assert_eq!(stock_band(dec!(10), threshold), StockBand::InStock);
        assert_eq!(StockBand::OutOfStock.to_string(), "Out of Stock");
    }

    #[test]
    fn test_compute_balance() {
        let p = product(1, "Tools", dec!(20), dec!(3), Currency::Afn);
        let row = StockSummary::compute(&p, dec!(6), dec!(4), dec!(10));
        assert_eq!(row.available_stock, dec!(22));
        assert_eq!(row.status, StockBand::InStock);
        assert_eq!(row.stock_value, dec!(66));
    }

    #[test]
    fn test_filter() {
        let p = product(1, "Tools", dec!(5), dec!(1), Currency::Afn);
        let row = StockSummary::compute(&p, Decimal::ZERO, Decimal::ZERO, dec!(10));
        let by_category = SummaryFilter {
            category: Some(" tools".to_string()),
            status: None,
        };
        assert!(by_category.matches(&row));
        let by_status = SummaryFilter {
            category: None,
            status: Some(StockBand::InStock),
        };
        assert!(!by_status.matches(&row));
    }

    #[test]
    fn test_aggregate_converts_currencies() {
        let converter = CurrencyConverter::new(dec!(70)).unwrap();
        let rows = vec![
            StockSummary::compute(
                &product(1, "Tools", dec!(10), dec!(7), Currency::Afn),
                Decimal::ZERO,
                Decimal::ZERO,
                dec!(10),
            ),
            StockSummary::compute(
                &product(2, "Tools", dec!(2), dec!(1), Currency::Usd),
                Decimal::ZERO,
                Decimal::ZERO,
                dec!(10),
            ),
            StockSummary::compute(
                &product(3, "Cables", Decimal::ZERO, dec!(5), Currency::Afn),
                Decimal::ZERO,
                Decimal::ZERO,
                dec!(10),
            ),
        ];

        let totals = SummaryTotals::aggregate(&rows, &converter, Currency::Afn);
        assert_eq!(totals.categories.len(), 2);
        let tools = totals
            .categories
            .iter()
            .find(|c| c.category == "Tools")
            .unwrap();
        // 10 × 7 AFN + 2 × 1 USD at 70
        assert_eq!(tools.stock_value, dec!(210));
        assert_eq!(tools.low_stock, 1);
        assert_eq!(totals.grand_total.product_count, 3);
        assert_eq!(totals.grand_total.out_of_stock, 1);

        let in_usd = SummaryTotals::aggregate(&rows, &converter, Currency::Usd);
        assert_eq!(in_usd.grand_total.stock_value, dec!(3));
    }
}
