//! Ledger store: append-only movement logs with grouped rollback
//!
//! Readers work on immutable per-log snapshots, so a query never observes a
//! half-applied write. Writers are serialized; each write is handed to the
//! backend as per-log deltas and published only once the backend accepts it.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard};

use serde::Serialize;
use shared::{validate_item_name, LedgerLog, Movement, NewMovement, TransactionGroupId};
use tokio::sync::Mutex;
use uuid::Uuid;
use validator::Validate;

use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::storage::{LedgerBackend, LogDelta};

/// Movement store partitioned into named logs
pub struct LedgerStore {
    backend: Arc<dyn LedgerBackend>,
    clock: Arc<dyn Clock>,
    state: RwLock<LedgerState>,
    writer: Mutex<()>,
}

#[derive(Default)]
struct LedgerState {
    logs: HashMap<LedgerLog, LogState>,
}

#[derive(Clone)]
struct LogState {
    next_sequence: i64,
    movements: Arc<Vec<Movement>>,
}

impl Default for LogState {
    fn default() -> Self {
        Self {
            next_sequence: 1,
            movements: Arc::new(Vec::new()),
        }
    }
}

/// A movement with its 1-based position in its log
#[derive(Debug, Clone, Serialize)]
pub struct RankedMovement {
    pub rank: usize,
    pub movement: Movement,
}

/// Point-in-time view across all logs
#[derive(Clone, Default)]
pub struct LedgerView {
    logs: Vec<Arc<Vec<Movement>>>,
}

impl LedgerView {
    pub fn iter(&self) -> impl Iterator<Item = &Movement> {
        self.logs.iter().flat_map(|log| log.iter())
    }
}

/// Lazy, filtered walk over one or more log snapshots
pub struct MovementQuery<P> {
    logs: Vec<Arc<Vec<Movement>>>,
    log_index: usize,
    index: usize,
    predicate: P,
}

impl<P> Iterator for MovementQuery<P>
where
    P: FnMut(&Movement) -> bool,
{
    type Item = Movement;

    fn next(&mut self) -> Option<Movement> {
        while self.log_index < self.logs.len() {
            let log = &self.logs[self.log_index];
            while self.index < log.len() {
                let movement = &log[self.index];
                self.index += 1;
                if (self.predicate)(movement) {
                    return Some(movement.clone());
                }
            }
            self.log_index += 1;
            self.index = 0;
        }
        None
    }
}

impl LedgerStore {
    /// Open a store over `backend`, loading whatever it already holds
    pub async fn open(backend: Arc<dyn LedgerBackend>, clock: Arc<dyn Clock>) -> AppResult<Self> {
        let snapshots = backend.load_logs().await?;

        let mut state = LedgerState::default();
        let mut total = 0;
        for snapshot in snapshots {
            let highest = snapshot.movements.iter().map(|m| m.sequence).max().unwrap_or(0);
            total += snapshot.movements.len();
            state.logs.insert(
                snapshot.log,
                LogState {
                    next_sequence: snapshot.next_sequence.max(highest + 1),
                    movements: Arc::new(snapshot.movements),
                },
            );
        }

        tracing::info!("Ledger opened with {} movements", total);

        Ok(Self {
            backend,
            clock,
            state: RwLock::new(state),
            writer: Mutex::new(()),
        })
    }

    fn read_state(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn log_state(&self, log: LedgerLog) -> LogState {
        self.read_state().logs.get(&log).cloned().unwrap_or_default()
    }

    /// Snapshot of every log, taken atomically
    pub fn view(&self) -> LedgerView {
        let state = self.read_state();
        let logs = LedgerLog::ALL
            .iter()
            .filter_map(|log| state.logs.get(log).map(|s| s.movements.clone()))
            .collect();
        LedgerView { logs }
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Append one movement to `log`
    pub async fn append(&self, log: LedgerLog, input: NewMovement) -> AppResult<Movement> {
        let mut stored = self.append_all(vec![(log, input)]).await?;
        stored
            .pop()
            .ok_or_else(|| AppError::Internal("Append produced no movement".to_string()))
    }

    /// Append several movements, possibly across logs, as one unit.
    ///
    /// Either every movement is stored or none is.
    pub async fn append_all(&self, entries: Vec<(LedgerLog, NewMovement)>) -> AppResult<Vec<Movement>> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }
        for (log, input) in &entries {
            check_entry(*log, input)?;
        }

        let _writer = self.writer.lock().await;
        let now = self.clock.now();

        let mut deltas: Vec<LogDelta> = Vec::new();
        let mut stored = Vec::with_capacity(entries.len());
        for (log, input) in entries {
            let delta = match deltas.iter().position(|d| d.log == log) {
                Some(i) => &mut deltas[i],
                None => {
                    deltas.push(LogDelta::new(log, self.log_state(log).next_sequence));
                    let last = deltas.len() - 1;
                    &mut deltas[last]
                }
            };
            let movement = Movement::from_new(input, log, delta.next_sequence, now);
            delta.next_sequence += 1;
            delta.inserted.push(movement.clone());
            stored.push(movement);
        }

        self.commit(deltas).await?;

        tracing::info!(
            "Appended {} movement(s), group {:?}",
            stored.len(),
            stored.first().and_then(|m| m.transaction_group_id)
        );
        Ok(stored)
    }

    /// Delete one movement. Missing ids are a no-op.
    ///
    /// A movement that belongs to a transaction group takes the whole group
    /// with it, across every log, so no half of a group is ever left behind.
    pub async fn remove(&self, log: LedgerLog, movement_id: Uuid) -> AppResult<Vec<Movement>> {
        let _writer = self.writer.lock().await;

        let state = self.log_state(log);
        let Some(target) = state.movements.iter().find(|m| m.id == movement_id) else {
            tracing::debug!("Remove of unknown movement {} in {}", movement_id, log);
            return Ok(Vec::new());
        };

        if let Some(group) = target.transaction_group_id {
            tracing::debug!("Movement {} is in group {}; removing the group", movement_id, group);
            return self.remove_groups(&HashSet::from([group])).await;
        }

        let removed = target.clone();
        let mut delta = LogDelta::new(log, state.next_sequence);
        delta.removed.push(movement_id);
        self.commit(vec![delta]).await?;

        tracing::info!("Removed movement {} from {}", movement_id, log);
        Ok(vec![removed])
    }

    /// Delete every movement, in any log, belonging to one of `groups`
    pub async fn remove_by_transaction_group(&self, groups: &[TransactionGroupId]) -> AppResult<Vec<Movement>> {
        if groups.is_empty() {
            return Ok(Vec::new());
        }
        let wanted: HashSet<TransactionGroupId> = groups.iter().copied().collect();

        let _writer = self.writer.lock().await;
        self.remove_groups(&wanted).await
    }

    /// Caller holds the writer lock.
    async fn remove_groups(&self, wanted: &HashSet<TransactionGroupId>) -> AppResult<Vec<Movement>> {
        let in_groups = |m: &Movement| m.transaction_group_id.is_some_and(|g| wanted.contains(&g));

        let mut deltas = Vec::new();
        let mut removed = Vec::new();
        for log in LedgerLog::ALL {
            let state = self.log_state(log);
            let gone: Vec<Movement> = state.movements.iter().filter(|m| in_groups(m)).cloned().collect();
            if gone.is_empty() {
                continue;
            }
            let mut delta = LogDelta::new(log, state.next_sequence);
            delta.removed = gone.iter().map(|m| m.id).collect();
            deltas.push(delta);
            removed.extend(gone);
        }

        if deltas.is_empty() {
            tracing::debug!("No movements found for groups {:?}", wanted);
            return Ok(removed);
        }

        self.commit(deltas).await?;

        tracing::info!("Removed {} movement(s) for groups {:?}", removed.len(), wanted);
        Ok(removed)
    }

    /// Swap one movement for a new one in the same log as a single write
    pub async fn replace(
        &self,
        log: LedgerLog,
        movement_id: Uuid,
        input: NewMovement,
    ) -> AppResult<(Movement, Movement)> {
        check_entry(log, &input)?;

        let _writer = self.writer.lock().await;

        let state = self.log_state(log);
        let previous = state
            .movements
            .iter()
            .find(|m| m.id == movement_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Movement {}", movement_id)))?;

        let replacement = Movement::from_new(input, log, state.next_sequence, self.clock.now());
        let mut delta = LogDelta::new(log, state.next_sequence + 1);
        delta.removed.push(previous.id);
        delta.inserted.push(replacement.clone());

        self.commit(vec![delta]).await?;

        tracing::info!("Replaced movement {} with {} in {}", previous.id, replacement.id, log);
        Ok((previous, replacement))
    }

    /// Persist, then publish. Caller holds the writer lock.
    async fn commit(&self, deltas: Vec<LogDelta>) -> AppResult<()> {
        self.backend.apply_logs(&deltas).await?;

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        for delta in deltas {
            let current = state.logs.entry(delta.log).or_default();
            let mut movements = current.movements.as_ref().clone();
            movements.retain(|m| !delta.removed.contains(&m.id));
            movements.extend(delta.inserted);
            *current = LogState {
                next_sequence: current.next_sequence.max(delta.next_sequence),
                movements: Arc::new(movements),
            };
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Matching movements in `log`, evaluated against the state at call time
    pub fn query<P>(&self, log: LedgerLog, predicate: P) -> MovementQuery<P>
    where
        P: FnMut(&Movement) -> bool,
    {
        MovementQuery {
            logs: vec![self.log_state(log).movements],
            log_index: 0,
            index: 0,
            predicate,
        }
    }

    /// Matching movements across every log
    pub fn query_all<P>(&self, predicate: P) -> MovementQuery<P>
    where
        P: FnMut(&Movement) -> bool,
    {
        MovementQuery {
            logs: self.view().logs,
            log_index: 0,
            index: 0,
            predicate,
        }
    }

    /// All movements of one log in append order
    pub fn log(&self, log: LedgerLog) -> Vec<Movement> {
        self.log_state(log).movements.as_ref().clone()
    }

    pub fn find(&self, movement_id: Uuid) -> Option<Movement> {
        self.view().iter().find(|m| m.id == movement_id).cloned()
    }

    /// Movements of `log` with a contiguous 1..N display rank
    pub fn ranked(&self, log: LedgerLog) -> Vec<RankedMovement> {
        let mut movements = self.log(log);
        movements.sort_by_key(|m| m.sequence);
        movements
            .into_iter()
            .enumerate()
            .map(|(i, movement)| RankedMovement { rank: i + 1, movement })
            .collect()
    }

    pub fn len(&self, log: LedgerLog) -> usize {
        self.log_state(log).movements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view().iter().next().is_none()
    }

    /// Distinct item names present anywhere in the ledger, by first spelling seen
    pub fn item_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        for movement in self.view().iter() {
            if seen.insert(movement.item_key()) {
                names.push(movement.item_name.trim().to_string());
            }
        }
        names
    }
}

fn check_entry(log: LedgerLog, input: &NewMovement) -> AppResult<()> {
    input.validate()?;
    validate_item_name(&input.item_name).map_err(|m| AppError::validation("item_name", m))?;
    if !log.accepts(input.kind) {
        return Err(AppError::validation(
            "kind",
            format!("{} movements cannot be written to the {} log", input.kind, log),
        ));
    }
    Ok(())
}
