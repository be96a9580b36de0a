//! Business logic services for the inventory ledger server

pub mod auth;
pub mod goods_receipt;
pub mod numbering;
pub mod product;
pub mod purchase_request;
pub mod reporting;
pub mod stock_in;
pub mod stock_out;
pub mod stock_summary;
pub mod user;

pub use auth::AuthService;
pub use goods_receipt::GoodsReceiptService;
pub use product::ProductService;
pub use purchase_request::PurchaseRequestService;
pub use reporting::ReportingService;
pub use stock_in::StockInService;
pub use stock_out::StockOutService;
pub use stock_summary::StockSummaryService;
pub use user::UserService;
