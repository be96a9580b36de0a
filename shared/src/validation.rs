//! Validation utilities for inventory documents

use rust_decimal::Decimal;

// ============================================================================
// Quantity & Price Validations
// ============================================================================

/// Decimal places stored for quantities and unit prices
pub const MAX_SCALE: u32 = 4;

pub fn exceeds_scale(value: Decimal) -> bool {
    value.normalize().scale() > MAX_SCALE
}

/// Quantities on document lines must be strictly positive
pub fn validate_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be greater than zero");
    }
    if exceeds_scale(quantity) {
        return Err("Quantity must have at most 4 decimal places");
    }
    Ok(())
}

/// Received quantities may be zero but never negative
pub fn validate_received_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity < Decimal::ZERO {
        return Err("Received quantity cannot be negative");
    }
    if exceeds_scale(quantity) {
        return Err("Received quantity must have at most 4 decimal places");
    }
    Ok(())
}

pub fn validate_unit_price(price: Decimal) -> Result<(), &'static str> {
    if price < Decimal::ZERO {
        return Err("Unit price cannot be negative");
    }
    if exceeds_scale(price) {
        return Err("Unit price must have at most 4 decimal places");
    }
    Ok(())
}

/// Line total as the exact product `quantity × unit_price`
pub fn line_total(quantity: Decimal, unit_price: Decimal) -> Decimal {
    quantity * unit_price
}

// ============================================================================
// Text Validations
// ============================================================================

/// Rejection reasons must carry some text
pub fn validate_reason(reason: &str) -> Result<(), &'static str> {
    if reason.trim().is_empty() {
        return Err("A reason is required");
    }
    if reason.len() > 1000 {
        return Err("Reason must be at most 1000 characters");
    }
    Ok(())
}

pub fn validate_product_name(name: &str) -> Result<(), &'static str> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Product name is required");
    }
    if name.len() > 200 {
        return Err("Product name must be at most 200 characters");
    }
    Ok(())
}

/// Validate username format (3-50 chars, lowercase alphanumeric, `_`, `.`)
pub fn validate_username(username: &str) -> Result<(), &'static str> {
    if username.len() < 3 {
        return Err("Username must be at least 3 characters");
    }
    if username.len() > 50 {
        return Err("Username must be at most 50 characters");
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.')
    {
        return Err("Username may contain only lowercase letters, digits, '_' and '.'");
    }
    Ok(())
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // ========================================================================
    // Quantity & Price Tests
    // ========================================================================

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(dec!(1)).is_ok());
        assert!(validate_quantity(dec!(0.5)).is_ok());
        assert!(validate_quantity(Decimal::ZERO).is_err());
        assert!(validate_quantity(dec!(-3)).is_err());
    }

    #[test]
    fn test_validate_quantity_rejects_extra_decimal_places() {
        assert!(validate_quantity(dec!(1.2345)).is_ok());
        assert!(validate_quantity(dec!(2.50000)).is_ok());
        assert!(validate_quantity(dec!(0.00001)).is_err());
        assert!(validate_quantity(dec!(1.00005)).is_err());
        assert!(validate_received_quantity(dec!(0.00001)).is_err());
    }

    #[test]
    fn test_validate_received_quantity_allows_zero() {
        assert!(validate_received_quantity(Decimal::ZERO).is_ok());
        assert!(validate_received_quantity(dec!(-0.01)).is_err());
    }

    #[test]
    fn test_validate_unit_price() {
        assert!(validate_unit_price(Decimal::ZERO).is_ok());
        assert!(validate_unit_price(dec!(-1)).is_err());
        assert!(validate_unit_price(dec!(0.0001)).is_ok());
        assert!(validate_unit_price(dec!(0.00015)).is_err());
    }

    #[test]
    fn test_line_total_is_exact() {
        assert_eq!(line_total(dec!(10), dec!(5)), dec!(50));
        assert_eq!(line_total(dec!(3), dec!(0.333)), dec!(0.999));
        assert_eq!(line_total(dec!(1.2345), dec!(0.0001)), dec!(0.00012345));
    }

    // ========================================================================
    // Text Tests
    // ========================================================================

    #[test]
    fn test_validate_reason() {
        assert!(validate_reason("Budget exceeded").is_ok());
        assert!(validate_reason("   ").is_err());
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("keeper.one").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("Admin").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("password123").is_ok());
        assert!(validate_password("short").is_err());
    }
}
