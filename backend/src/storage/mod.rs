//! Persistence backends for the ledger
//!
//! The store keeps its working state in memory and hands every change to a
//! [`LedgerBackend`] as a set of per-log deltas before publishing it. A
//! backend write must be all-or-nothing across every delta passed in one
//! call, and should cost in proportion to the delta rather than the log.

mod file;
mod memory;
mod postgres;

pub use file::JsonFileBackend;
pub use memory::MemoryBackend;
pub use postgres::PgBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::{LedgerLog, Movement, ProductionBatch};
use uuid::Uuid;

use crate::error::AppResult;

/// Full contents of one log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogSnapshot {
    pub log: LedgerLog,
    /// Sequence the next appended movement receives
    pub next_sequence: i64,
    pub movements: Vec<Movement>,
}

impl LogSnapshot {
    pub fn empty(log: LedgerLog) -> Self {
        Self {
            log,
            next_sequence: 1,
            movements: Vec::new(),
        }
    }

    /// Fold one delta into this snapshot. Removals apply before insertions.
    pub fn apply(&mut self, delta: &LogDelta) {
        if !delta.removed.is_empty() {
            self.movements.retain(|m| !delta.removed.contains(&m.id));
        }
        self.movements.extend(delta.inserted.iter().cloned());
        self.next_sequence = self.next_sequence.max(delta.next_sequence);
    }
}

/// Changes one write makes to one log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogDelta {
    pub log: LedgerLog,
    /// Sequence counter after the write
    pub next_sequence: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inserted: Vec<Movement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<Uuid>,
}

impl LogDelta {
    pub fn new(log: LedgerLog, next_sequence: i64) -> Self {
        Self {
            log,
            next_sequence,
            inserted: Vec::new(),
            removed: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.removed.is_empty()
    }
}

#[async_trait]
pub trait LedgerBackend: Send + Sync {
    /// Load every persisted log. Logs never written may be absent.
    async fn load_logs(&self) -> AppResult<Vec<LogSnapshot>>;

    /// Apply the given deltas as one atomic unit
    async fn apply_logs(&self, deltas: &[LogDelta]) -> AppResult<()>;

    async fn load_batches(&self) -> AppResult<Vec<ProductionBatch>>;

    /// Insert or overwrite one batch by id
    async fn save_batch(&self, batch: &ProductionBatch) -> AppResult<()>;
}
