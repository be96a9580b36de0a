//! Document number formatting

use serde::{Deserialize, Serialize};

/// Document types that receive a system-generated number
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    PurchaseRequest,
    GoodsReceipt,
    StockIn,
    StockOut,
}

impl DocumentKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::PurchaseRequest => "PR",
            DocumentKind::GoodsReceipt => "GRN",
            DocumentKind::StockIn => "SI",
            DocumentKind::StockOut => "SO",
        }
    }
}

/// Format `PREFIX-YYYY-NNNNN`; sequences beyond five digits widen rather than wrap
pub fn format_document_number(kind: DocumentKind, year: i32, sequence: i64) -> String {
    format!("{}-{:04}-{:05}", kind.prefix(), year, sequence)
}
