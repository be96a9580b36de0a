//! Product resolution between linked document lines
//!
//! PR lines, GR lines and Stock In records identify products either by catalog id or,
//! for ad-hoc purchases, by free-text name. The matching policy lives here and nowhere else:
//!
//! - a line carrying a `product_id` matches only candidates with the same id;
//! - a line without an id matches on its name, trimmed and compared case-insensitively;
//! - among several matching candidates the first one in sequence order wins.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Anything that names a product by id and/or name
pub trait ProductKeyed {
    fn product_id(&self) -> Option<i64>;
    fn product_name(&self) -> Option<&str>;
}

/// Resolved identity of a product reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum ProductRef {
    Id(i64),
    /// Normalized (trimmed, lowercase) product name
    Name(String),
}

/// A reference that names no product, or names one absent from the candidates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unresolved {
    pub product_id: Option<i64>,
    pub product_name: Option<String>,
}

impl Unresolved {
    fn of<K: ProductKeyed + ?Sized>(item: &K) -> Self {
        Self {
            product_id: item.product_id(),
            product_name: item.product_name().map(str::to_string),
        }
    }

    /// Describe the reference for error messages
    pub fn describe(&self) -> String {
        match (&self.product_id, &self.product_name) {
            (Some(id), _) => format!("product #{}", id),
            (None, Some(name)) if !name.trim().is_empty() => format!("product '{}'", name.trim()),
            _ => "unnamed product".to_string(),
        }
    }

    /// Convert into a validation error on `field`
    pub fn into_error(self, field: impl Into<String>) -> DomainError {
        DomainError::validation(field, format!("Cannot resolve {}", self.describe()))
    }
}

impl std::fmt::Display for Unresolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Normalize a product name for comparison
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Derive the reference an item carries: its id when present, else its non-empty name
pub fn product_ref<K: ProductKeyed + ?Sized>(item: &K) -> Result<ProductRef, Unresolved> {
    if let Some(id) = item.product_id() {
        return Ok(ProductRef::Id(id));
    }
    match item.product_name().map(normalize_name) {
        Some(name) if !name.is_empty() => Ok(ProductRef::Name(name)),
        _ => Err(Unresolved::of(item)),
    }
}

impl ProductRef {
    pub fn matches<K: ProductKeyed + ?Sized>(&self, candidate: &K) -> bool {
        match self {
            ProductRef::Id(id) => candidate.product_id() == Some(*id),
            ProductRef::Name(name) => candidate
                .product_name()
                .map(|n| normalize_name(n) == *name)
                .unwrap_or(false),
        }
    }
}

/// Index of the first candidate matching `item`
pub fn resolve_index<K, C>(item: &K, candidates: &[C]) -> Result<usize, Unresolved>
where
    K: ProductKeyed + ?Sized,
    C: ProductKeyed,
{
    let reference = product_ref(item)?;
    candidates
        .iter()
        .position(|c| reference.matches(c))
        .ok_or_else(|| Unresolved::of(item))
}

/// Index of the first candidate matching `item` that also satisfies `accept`
pub fn resolve_index_where<K, C, F>(
    item: &K,
    candidates: &[C],
    mut accept: F,
) -> Result<usize, Unresolved>
where
    K: ProductKeyed + ?Sized,
    C: ProductKeyed,
    F: FnMut(&C) -> bool,
{
    let reference = product_ref(item)?;
    candidates
        .iter()
        .position(|c| reference.matches(c) && accept(c))
        .ok_or_else(|| Unresolved::of(item))
}

/// Plain key used for ad-hoc lookups
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductKey {
    pub product_id: Option<i64>,
    pub product_name: Option<String>,
}

impl ProductKeyed for ProductKey {
    fn product_id(&self) -> Option<i64> {
        self.product_id
    }

    fn product_name(&self) -> Option<&str> {
        self.product_name.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: Option<i64>, name: Option<&str>) -> ProductKey {
        ProductKey {
            product_id: id,
            product_name: name.map(str::to_string),
        }
    }

    #[test]
    fn test_id_takes_precedence_over_name() {
        let candidates = vec![key(Some(4), Some("Bolt")), key(Some(5), Some("bolt"))];
        let idx = resolve_index(&key(Some(5), Some("Bolt")), &candidates).unwrap();
        assert_eq!(idx, 1);
    }

    #[test]
    fn test_name_fallback_is_trimmed_and_case_insensitive() {
        let candidates = vec![key(None, Some("Steel Pipe 2in")), key(None, Some("Cable"))];
        let idx = resolve_index(&key(None, Some("  steel pipe 2IN ")), &candidates).unwrap();
        assert_eq!(idx, 0);
    }

    #[test]
    fn test_id_does_not_fall_back_to_name() {
        let candidates = vec![key(None, Some("Cable"))];
        let err = resolve_index(&key(Some(9), Some("Cable")), &candidates).unwrap_err();
        assert_eq!(err.product_id, Some(9));
    }

    #[test]
    fn test_first_match_wins() {
        let candidates = vec![key(None, Some("Cable")), key(None, Some("cable"))];
        assert_eq!(resolve_index(&key(None, Some("CABLE")), &candidates), Ok(0));
        assert_eq!(
            resolve_index_where(&key(None, Some("CABLE")), &candidates, |c| {
                c.product_name == Some("cable".to_string())
            }),
            Ok(1)
        );
    }

    #[test]
    fn test_blank_reference_is_unresolved() {
        let err = product_ref(&key(None, Some("   "))).unwrap_err();
        assert_eq!(err.describe(), "unnamed product");
    }
}
