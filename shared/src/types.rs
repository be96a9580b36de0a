//! Common types used across the platform

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Currencies documents may be priced in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Afn,
    Usd,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Afn => "AFN",
            Currency::Usd => "USD",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AFN" => Some(Currency::Afn),
            "USD" => Some(Currency::Usd),
            _ => None,
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-rate AFN/USD converter used by reporting aggregates
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CurrencyConverter {
    /// Afghani per one US dollar
    pub afn_per_usd: Decimal,
}

impl CurrencyConverter {
    pub fn new(afn_per_usd: Decimal) -> DomainResult<Self> {
        if afn_per_usd <= Decimal::ZERO {
            return Err(DomainError::validation(
                "afn_per_usd",
                "Exchange rate must be positive",
            ));
        }
        Ok(Self { afn_per_usd })
    }

    /// Convert `amount` expressed in `from` into `to`
    pub fn convert(&self, amount: Decimal, from: Currency, to: Currency) -> Decimal {
        match (from, to) {
            (Currency::Afn, Currency::Usd) => amount / self.afn_per_usd,
            (Currency::Usd, Currency::Afn) => amount * self.afn_per_usd,
            _ => amount,
        }
    }
}

/// Pagination parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    pub const MAX_PER_PAGE: u32 = 200;

    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        let defaults = Self::default();
        Self {
            page: page.unwrap_or(defaults.page).max(1),
            per_page: per_page
                .unwrap_or(defaults.per_page)
                .clamp(1, Self::MAX_PER_PAGE),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.per_page)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

/// Date range for queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRange {
    pub start: chrono::NaiveDate,
    pub end: chrono::NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: chrono::NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_currency_round_trip_names() {
        assert_eq!(Currency::from_str("afn"), Some(Currency::Afn));
        assert_eq!(Currency::from_str(" USD "), Some(Currency::Usd));
        assert_eq!(Currency::from_str("EUR"), None);
    }

    #[test]
    fn test_convert_between_afn_and_usd() {
        let converter = CurrencyConverter::new(dec!(70)).unwrap();
        assert_eq!(converter.convert(dec!(140), Currency::Afn, Currency::Usd), dec!(2));
        assert_eq!(converter.convert(dec!(2), Currency::Usd, Currency::Afn), dec!(140));
        assert_eq!(converter.convert(dec!(5), Currency::Usd, Currency::Usd), dec!(5));
    }

    #[test]
    fn test_converter_rejects_non_positive_rate() {
        assert!(CurrencyConverter::new(Decimal::ZERO).is_err());
    }

    #[test]
    fn test_pagination_bounds() {
        let p = Pagination::new(Some(0), Some(1000));
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, Pagination::MAX_PER_PAGE);
        assert_eq!(Pagination::new(Some(3), Some(20)).offset(), 40);
    }
}
