//! Ledger services for the Agarbatti ERP

pub mod entries;
pub mod ledger;
pub mod planner;
pub mod production;
pub mod reporting;
pub mod stock;

pub use entries::EntryService;
pub use ledger::LedgerStore;
pub use planner::BatchPlanner;
pub use production::ProductionProtocol;
pub use reporting::ReportingService;
pub use stock::StockResolver;
