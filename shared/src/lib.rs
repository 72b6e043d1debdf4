//! Shared types and models for the Agarbatti ERP ledger
//!
//! This crate contains the domain records and the pure stock and batch rules
//! shared between the backend engine and the browser (via WASM).

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
