//! Domain models for the inventory document ledger

mod goods_receipt;
mod product;
mod purchase_request;
mod stock_in;
mod stock_out;
mod stock_summary;
mod user;

pub use goods_receipt::*;
pub use product::*;
pub use purchase_request::*;
pub use stock_in::*;
pub use stock_out::*;
pub use stock_summary::*;
pub use user::*;
