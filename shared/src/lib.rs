//! Shared types and models for the inventory document ledger
//!
//! This crate holds the document lifecycle engine: roles, the Purchase Request,
//! Goods Receipt, Stock In and Stock Out state machines, product matching and the
//! derived stock summary. It performs no I/O and is shared by the backend and the
//! WASM bindings.

pub mod error;
pub mod ledger;
pub mod matching;
pub mod models;
pub mod numbering;
pub mod types;
pub mod validation;

pub use error::*;
pub use ledger::*;
pub use models::*;
pub use numbering::*;
pub use types::*;
pub use validation::*;
