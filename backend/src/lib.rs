//! Agarbatti ERP inventory ledger and batch-costing engine
//!
//! Movement logs, stock resolution, batch planning and the production
//! auto-deduction protocol, over a pluggable persistence backend.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod services;
pub mod storage;

pub use config::Config;
pub use engine::LedgerEngine;
pub use error::{AppError, AppResult, ErrorKind};
