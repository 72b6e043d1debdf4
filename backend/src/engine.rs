//! Wiring of the ledger services over one backend and clock

use std::sync::Arc;

use crate::catalog::{FormulationStore, ItemCatalog};
use crate::clock::Clock;
use crate::error::AppResult;
use crate::services::{
    BatchPlanner, EntryService, LedgerStore, ProductionProtocol, ReportingService, StockResolver,
};
use crate::storage::LedgerBackend;

/// All ledger services, sharing one store
pub struct LedgerEngine {
    pub store: Arc<LedgerStore>,
    pub resolver: StockResolver,
    pub planner: Arc<BatchPlanner>,
    pub production: Arc<ProductionProtocol>,
    pub entries: Arc<EntryService>,
    pub reporting: Arc<ReportingService>,
    pub catalog: Arc<dyn ItemCatalog>,
}

impl LedgerEngine {
    /// Load persisted state from `backend` and build every service
    pub async fn open(
        backend: Arc<dyn LedgerBackend>,
        clock: Arc<dyn Clock>,
        catalog: Arc<dyn ItemCatalog>,
        formulations: Arc<dyn FormulationStore>,
        usage_window_days: u32,
    ) -> AppResult<Self> {
        let store = Arc::new(LedgerStore::open(backend.clone(), clock.clone()).await?);
        let resolver = StockResolver::new(store.clone(), clock.clone()).with_usage_window(usage_window_days);
        let planner = Arc::new(BatchPlanner::open(resolver.clone(), formulations, backend, clock.clone()).await?);
        let production = Arc::new(ProductionProtocol::new(
            store.clone(),
            planner.clone(),
            catalog.clone(),
            clock.clone(),
        ));
        let entries = Arc::new(EntryService::new(store.clone(), catalog.clone(), clock));
        let reporting = Arc::new(ReportingService::new(store.clone(), resolver.clone(), planner.clone()));

        Ok(Self {
            store,
            resolver,
            planner,
            production,
            entries,
            reporting,
            catalog,
        })
    }
}
