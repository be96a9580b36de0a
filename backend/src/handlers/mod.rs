//! HTTP request handlers

pub mod auth;
pub mod goods_receipts;
pub mod health;
pub mod products;
pub mod purchase_requests;
pub mod reporting;
pub mod stock_ins;
pub mod stock_outs;
pub mod stock_summary;
pub mod users;

pub use auth::*;
pub use goods_receipts::*;
pub use health::*;
pub use products::*;
pub use purchase_requests::*;
pub use reporting::*;
pub use stock_ins::*;
pub use stock_outs::*;
pub use stock_summary::*;
pub use users::*;
