//! JSON-lines journal backend
//!
//! Every write appends one self-contained JSON record to the journal and
//! syncs it, so the cost of a write tracks the size of the change. Opening
//! replays the journal from the start. A torn final line left by a crash
//! mid-append is cut off on replay; a bad line anywhere else is corruption.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::{LedgerLog, ProductionBatch};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{LedgerBackend, LogDelta, LogSnapshot};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum JournalRecord {
    Logs { deltas: Vec<LogDelta> },
    Batch { batch: ProductionBatch },
}

#[derive(Default)]
struct Replayed {
    logs: BTreeMap<LedgerLog, LogSnapshot>,
    batches: Vec<ProductionBatch>,
}

pub struct JsonFileBackend {
    path: PathBuf,
    // Keeps appends whole and ordered
    lock: Mutex<()>,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn replay(&self) -> AppResult<Replayed> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Replayed::default()),
            Err(e) => return Err(e.into()),
        };

        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        let complete = text.ends_with('\n');
        let mut replayed = Replayed::default();

        for (index, line) in lines.iter().enumerate() {
            let record: JournalRecord = match serde_json::from_str(line) {
                Ok(record) => record,
                Err(e) if index + 1 == lines.len() && !complete => {
                    tracing::warn!("Dropping torn journal record at end of {}: {}", self.path.display(), e);
                    let valid_len = text.rfind('\n').map(|i| i + 1).unwrap_or(0);
                    self.truncate(valid_len as u64).await?;
                    break;
                }
                Err(e) => {
                    return Err(AppError::Storage(format!(
                        "Corrupt journal record {} in {}: {}",
                        index + 1,
                        self.path.display(),
                        e
                    )))
                }
            };

            match record {
                JournalRecord::Logs { deltas } => {
                    for delta in &deltas {
                        replayed
                            .logs
                            .entry(delta.log)
                            .or_insert_with(|| LogSnapshot::empty(delta.log))
                            .apply(delta);
                    }
                }
                JournalRecord::Batch { batch } => match replayed.batches.iter_mut().find(|b| b.id == batch.id) {
                    Some(existing) => *existing = batch,
                    None => replayed.batches.push(batch),
                },
            }
        }

        Ok(replayed)
    }

    async fn truncate(&self, len: u64) -> AppResult<()> {
        let file = tokio::fs::OpenOptions::new().write(true).open(&self.path).await?;
        file.set_len(len).await?;
        file.sync_data().await?;
        Ok(())
    }

    async fn append(&self, record: &JournalRecord) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.sync_data().await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerBackend for JsonFileBackend {
    async fn load_logs(&self) -> AppResult<Vec<LogSnapshot>> {
        let _guard = self.lock.lock().await;
        Ok(self.replay().await?.logs.into_values().collect())
    }

    async fn apply_logs(&self, deltas: &[LogDelta]) -> AppResult<()> {
        let _guard = self.lock.lock().await;
        self.append(&JournalRecord::Logs {
            deltas: deltas.to_vec(),
        })
        .await
    }

    async fn load_batches(&self) -> AppResult<Vec<ProductionBatch>> {
        let _guard = self.lock.lock().await;
        Ok(self.replay().await?.batches)
    }

    async fn save_batch(&self, batch: &ProductionBatch) -> AppResult<()> {
        let _guard = self.lock.lock().await;
        self.append(&JournalRecord::Batch { batch: batch.clone() }).await
    }
}
