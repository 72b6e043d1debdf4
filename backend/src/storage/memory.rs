//! In-memory backend

use std::collections::HashMap;

use async_trait::async_trait;
use shared::{LedgerLog, ProductionBatch};
use tokio::sync::RwLock;

use super::{LedgerBackend, LogDelta, LogSnapshot};
use crate::error::AppResult;

#[derive(Default)]
pub struct MemoryBackend {
    logs: RwLock<HashMap<LedgerLog, LogSnapshot>>,
    batches: RwLock<Vec<ProductionBatch>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerBackend for MemoryBackend {
    async fn load_logs(&self) -> AppResult<Vec<LogSnapshot>> {
        let logs = self.logs.read().await;
        let mut snapshots: Vec<_> = logs.values().cloned().collect();
        snapshots.sort_by_key(|s| s.log);
        Ok(snapshots)
    }

    async fn apply_logs(&self, deltas: &[LogDelta]) -> AppResult<()> {
        let mut logs = self.logs.write().await;
        for delta in deltas {
            logs.entry(delta.log)
                .or_insert_with(|| LogSnapshot::empty(delta.log))
                .apply(delta);
        }
        Ok(())
    }

    async fn load_batches(&self) -> AppResult<Vec<ProductionBatch>> {
        Ok(self.batches.read().await.clone())
    }

    async fn save_batch(&self, batch: &ProductionBatch) -> AppResult<()> {
        let mut batches = self.batches.write().await;
        match batches.iter_mut().find(|b| b.id == batch.id) {
            Some(existing) => *existing = batch.clone(),
            None => batches.push(batch.clone()),
        }
        Ok(())
    }
}
