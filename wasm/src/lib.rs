//! WebAssembly module for the Inventory Ledger client
//!
//! Lets the browser preview what the server will compute before a form is submitted:
//! - Purchase request line and document totals
//! - Goods receipt status from received quantities
//! - Stock bands and currency conversion for the summary screen
//! - Role capability checks for hiding actions the caller cannot take

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

use shared::numbering::{format_document_number, DocumentKind};

#[derive(Deserialize)]
struct PreviewLine {
    quantity: Decimal,
    #[serde(default)]
    unit_price: Decimal,
}

#[derive(Deserialize)]
struct ReceiptLine {
    quantity_received: Decimal,
    quantity_expected: Decimal,
}

fn parse_decimal(value: &str, field: &str) -> Result<Decimal, String> {
    Decimal::from_str(value.trim()).map_err(|e| format!("Invalid {}: {}", field, e))
}

fn parse_currency(value: &str) -> Result<Currency, String> {
    Currency::from_str(value).ok_or_else(|| format!("Unknown currency: {}", value))
}

fn lines_total(lines_json: &str) -> Result<Decimal, String> {
    let lines: Vec<PreviewLine> =
        serde_json::from_str(lines_json).map_err(|e| format!("Invalid lines JSON: {}", e))?;
    Ok(lines
        .iter()
        .map(|l| line_total(l.quantity, l.unit_price))
        .sum())
}

fn receipt_status(lines_json: &str) -> Result<GrStatus, String> {
    let lines: Vec<ReceiptLine> =
        serde_json::from_str(lines_json).map_err(|e| format!("Invalid lines JSON: {}", e))?;
    Ok(derive_status(
        lines
            .iter()
            .map(|l| (l.quantity_received, l.quantity_expected)),
    ))
}

fn band(available: &str, threshold: &str) -> Result<StockBand, String> {
    Ok(stock_band(
        parse_decimal(available, "available")?,
        parse_decimal(threshold, "threshold")?,
    ))
}

fn convert(amount: &str, from: &str, to: &str, afn_per_usd: &str) -> Result<Decimal, String> {
    let converter = CurrencyConverter::new(parse_decimal(afn_per_usd, "afn_per_usd")?)
        .map_err(|e| e.to_string())?;
    Ok(converter.convert(
        parse_decimal(amount, "amount")?,
        parse_currency(from)?,
        parse_currency(to)?,
    ))
}

/// Line total (`quantity × unit_price`, 2 dp) as a decimal string
#[wasm_bindgen]
pub fn calculate_line_total(quantity: &str, unit_price: &str) -> Result<String, JsValue> {
    let quantity = parse_decimal(quantity, "quantity").map_err(|e| JsValue::from_str(&e))?;
    let unit_price = parse_decimal(unit_price, "unit_price").map_err(|e| JsValue::from_str(&e))?;
    Ok(line_total(quantity, unit_price).to_string())
}

/// Estimated cost of a purchase request from `[{quantity, unit_price}]`
#[wasm_bindgen]
pub fn calculate_purchase_request_total(lines_json: &str) -> Result<String, JsValue> {
    lines_total(lines_json)
        .map(|t| t.to_string())
        .map_err(|e| JsValue::from_str(&e))
}

/// Goods receipt status from `[{quantity_received, quantity_expected}]`
#[wasm_bindgen]
pub fn goods_receipt_status(lines_json: &str) -> Result<String, JsValue> {
    receipt_status(lines_json)
        .map(|s| s.as_str().to_string())
        .map_err(|e| JsValue::from_str(&e))
}

/// Stock band label for an available quantity
#[wasm_bindgen]
pub fn classify_stock(available: &str, threshold: &str) -> Result<String, JsValue> {
    band(available, threshold)
        .map(|b| b.label().to_string())
        .map_err(|e| JsValue::from_str(&e))
}

/// Convert an amount between AFN and USD at a fixed rate
#[wasm_bindgen]
pub fn convert_currency(
    amount: &str,
    from: &str,
    to: &str,
    afn_per_usd: &str,
) -> Result<String, JsValue> {
    convert(amount, from, to, afn_per_usd)
        .map(|v| v.round_dp(2).to_string())
        .map_err(|e| JsValue::from_str(&e))
}

/// Whether `role` holds `capability`; unknown names are never granted
#[wasm_bindgen]
pub fn role_can(role: &str, capability: &str) -> bool {
    match (Role::from_str(role), Capability::from_str(capability)) {
        (Some(role), Some(capability)) => capability.granted_to(role),
        _ => false,
    }
}

/// Validation message for a username, or `None` when acceptable
#[wasm_bindgen]
pub fn check_username(username: &str) -> Option<String> {
    validate_username(username).err().map(str::to_string)
}

#[wasm_bindgen]
pub fn check_password(password: &str) -> Option<String> {
    validate_password(password).err().map(str::to_string)
}

/// Preview a document number such as `PR-2026-00012`
#[wasm_bindgen]
pub fn preview_document_number(kind: &str, year: i32, sequence: i64) -> Option<String> {
    let kind = match kind {
        "purchase_request" => DocumentKind::PurchaseRequest,
        "goods_receipt" => DocumentKind::GoodsReceipt,
        "stock_in" => DocumentKind::StockIn,
        "stock_out" => DocumentKind::StockOut,
        _ => return None,
    };
    Some(format_document_number(kind, year, sequence))
}
