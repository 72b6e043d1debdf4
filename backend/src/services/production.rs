//! Production auto-deduction protocol
//!
//! Recording finished-goods output against a batch writes the output
//! movement and the proportional raw-material consumption as one transaction
//! group. Deleting the output removes the whole group.
//!
//! Two points need a human decision: a packed quantity that misses the batch
//! target, and a batch that has reached its completion threshold. Both are
//! returned as data; nothing here accepts or closes on the caller's behalf.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    format_yield, is_completion_eligible, is_mutable_on, is_quantity_mismatch, validate_entry_date,
    validate_item_name, validate_quantity, yield_percent, BatchStatus, Item, LedgerLog, Movement,
    MovementKind, NewMovement, ProductionBatch, TransactionGroupId, DEFAULT_UNIT,
};
use uuid::Uuid;

use crate::catalog::ItemCatalog;
use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::services::ledger::LedgerStore;
use crate::services::planner::BatchPlanner;

/// A finished-goods packing entry as submitted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputEntry {
    /// Matched against the item catalog
    pub item_name: String,
    pub total_packed_kg: Decimal,
    pub date: NaiveDate,
    /// `None` records against general stock
    pub batch_id: Option<String>,
    pub notes: Option<String>,
}

impl OutputEntry {
    pub fn new(item_name: impl Into<String>, total_packed_kg: Decimal, date: NaiveDate) -> Self {
        Self {
            item_name: item_name.into(),
            total_packed_kg,
            date,
            batch_id: None,
            notes: None,
        }
    }

    pub fn for_batch(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }
}

/// Packed quantity differs from the batch target beyond tolerance
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QuantityMismatchWarning {
    pub batch_id: String,
    pub planned: Decimal,
    pub actual: Decimal,
    pub difference: Decimal,
    pub message: String,
}

/// Cumulative output has reached the completion threshold
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CompletionEligibleNotice {
    pub batch_id: String,
    pub target_quantity: Decimal,
    pub cumulative_output: Decimal,
    pub yield_percent: Decimal,
    /// One-decimal rendering stored on the batch if confirmed
    pub actual_yield: String,
    pub message: String,
}

/// A legacy output had no group, so its consumption could not be rolled back
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RollbackIncompleteWarning {
    pub movement_id: Uuid,
    pub batch_id: Option<String>,
    pub message: String,
}

/// A validated output entry waiting to be written
#[derive(Debug, Clone)]
pub struct PreparedOutput {
    entry: OutputEntry,
    item: Item,
    batch: Option<ProductionBatch>,
    mismatch: Option<QuantityMismatchWarning>,
}

impl PreparedOutput {
    pub fn entry(&self) -> &OutputEntry {
        &self.entry
    }

    /// Catalog item the output is recorded against
    pub fn item(&self) -> &Item {
        &self.item
    }

    pub fn batch(&self) -> Option<&ProductionBatch> {
        self.batch.as_ref()
    }

    pub fn mismatch(&self) -> Option<&QuantityMismatchWarning> {
        self.mismatch.as_ref()
    }

    pub fn requires_confirmation(&self) -> bool {
        self.mismatch.is_some()
    }
}

/// Everything written by one output entry
#[derive(Debug, Clone, Serialize)]
pub struct OutputRecorded {
    pub transaction_group_id: TransactionGroupId,
    pub output: Movement,
    pub consumption: Vec<Movement>,
    pub completion: Option<CompletionEligibleNotice>,
}

/// Result of submitting an output entry in one call
#[derive(Debug, Clone)]
pub enum OutputDecision {
    /// Written; inspect `completion` for a closure decision
    Recorded(OutputRecorded),
    /// Nothing written yet. Pass the value to
    /// [`ProductionProtocol::commit_output`] to proceed, or drop it.
    NeedsConfirmation(PreparedOutput),
}

/// What a delete removed
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeletionOutcome {
    pub removed: Vec<Movement>,
    pub rollback_warning: Option<RollbackIncompleteWarning>,
}

impl DeletionOutcome {
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty()
    }
}

/// Output progress of one batch
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BatchProgress {
    pub batch_id: String,
    pub status: BatchStatus,
    pub target_quantity: Decimal,
    pub cumulative_output: Decimal,
    pub yield_percent: Decimal,
    pub completion_eligible: bool,
}

pub struct ProductionProtocol {
    store: Arc<LedgerStore>,
    planner: Arc<BatchPlanner>,
    catalog: Arc<dyn ItemCatalog>,
    clock: Arc<dyn Clock>,
}

impl ProductionProtocol {
    pub fn new(
        store: Arc<LedgerStore>,
        planner: Arc<BatchPlanner>,
        catalog: Arc<dyn ItemCatalog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            planner,
            catalog,
            clock,
        }
    }

    /// Validate an entry and compute the mismatch decision point
    pub fn prepare_output(&self, entry: OutputEntry) -> AppResult<PreparedOutput> {
        validate_item_name(&entry.item_name).map_err(|m| AppError::validation("item_name", m))?;
        validate_quantity(entry.total_packed_kg).map_err(|m| AppError::validation("total_packed_kg", m))?;
        validate_entry_date(entry.date, self.clock.today()).map_err(|m| AppError::validation("date", m))?;

        let item = self.resolve_item(&entry.item_name)?;

        let batch = match entry.batch_id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(id) => Some(self.open_batch(id)?),
        };

        let mismatch = batch.as_ref().and_then(|b| {
            if !is_quantity_mismatch(entry.total_packed_kg, b.target_quantity) {
                return None;
            }
            let difference = entry.total_packed_kg - b.target_quantity;
            Some(QuantityMismatchWarning {
                batch_id: b.id.clone(),
                planned: b.target_quantity,
                actual: entry.total_packed_kg,
                difference,
                message: format!(
                    "Packed quantity {} kg differs from batch {} target {} kg by {} kg",
                    entry.total_packed_kg, b.id, b.target_quantity, difference
                ),
            })
        });

        if let Some(warning) = &mismatch {
            tracing::warn!("{}", warning.message);
        }

        Ok(PreparedOutput {
            entry,
            item,
            batch,
            mismatch,
        })
    }

    /// Write a prepared entry: output plus auto-deducted consumption under
    /// one fresh transaction group
    pub async fn commit_output(&self, prepared: PreparedOutput) -> AppResult<OutputRecorded> {
        let PreparedOutput { entry, item, batch, .. } = prepared;

        // The batch may have been closed since preparation
        let batch = match batch {
            Some(b) => Some(self.open_batch(&b.id)?),
            None => None,
        };

        let group = TransactionGroupId::new();
        let batch_id = batch.as_ref().map(|b| b.id.clone());

        let mut output = NewMovement {
            item_id: Some(item.id),
            item_name: item.name.clone(),
            kind: MovementKind::FinishedGoodsOutput,
            quantity: entry.total_packed_kg,
            unit: DEFAULT_UNIT.to_string(),
            date: entry.date,
            transaction_group_id: Some(group),
            batch_id: None,
            notes: entry.notes.clone(),
        };
        if let Some(id) = &batch_id {
            output = output.with_batch(id.clone());
        }

        let mut writes = vec![(LedgerLog::FinishedGoods, output)];
        if let Some(b) = &batch {
            let out_of_range = || {
                AppError::validation(
                    "total_packed_kg",
                    format!("Packed quantity {} is out of range for batch {}", entry.total_packed_kg, b.id),
                )
            };
            let ratio = entry
                .total_packed_kg
                .checked_div(b.target_quantity)
                .ok_or_else(out_of_range)?;
            for requirement in &b.requirements {
                let ingredient = self.resolve_item(&requirement.item_name)?;
                let quantity = requirement.required_qty.checked_mul(ratio).ok_or_else(out_of_range)?;
                let consumption = NewMovement::new(ingredient.name.clone(), MovementKind::ProductionOut, quantity, entry.date)
                    .with_item_id(ingredient.id)
                    .with_group(group)
                    .with_batch(b.id.clone())
                    .with_notes(format!("Auto-deducted for batch {}", b.id));
                writes.push((LedgerLog::Consumption, consumption));
            }
        }

        let mut stored = self.store.append_all(writes).await?;
        if stored.is_empty() {
            return Err(AppError::Internal("Output entry was not stored".to_string()));
        }
        let output = stored.remove(0);
        let consumption = stored;

        let completion = match &batch {
            Some(b) => {
                if b.status == BatchStatus::Planned {
                    self.start_production(&b.id, group).await?;
                }
                self.completion_notice(b)
            }
            None => None,
        };

        tracing::info!(
            "Recorded {} kg of {} (batch {:?}) with {} auto-deduction(s)",
            output.quantity,
            output.item_name,
            batch_id,
            consumption.len()
        );

        Ok(OutputRecorded {
            transaction_group_id: group,
            output,
            consumption,
            completion,
        })
    }

    /// Prepare and, when no confirmation is needed, commit in one call
    pub async fn record_finished_goods_output(&self, entry: OutputEntry) -> AppResult<OutputDecision> {
        let prepared = self.prepare_output(entry)?;
        if prepared.requires_confirmation() {
            return Ok(OutputDecision::NeedsConfirmation(prepared));
        }
        Ok(OutputDecision::Recorded(self.commit_output(prepared).await?))
    }

    /// Close a batch after the caller accepted a completion notice
    pub async fn confirm_completion(&self, notice: &CompletionEligibleNotice) -> AppResult<ProductionBatch> {
        let batch = self
            .planner
            .batch(&notice.batch_id)
            .ok_or_else(|| AppError::NotFound(format!("Batch {}", notice.batch_id)))?;
        if batch.status.is_terminal() {
            return Err(AppError::InvalidStateTransition(format!(
                "Batch {} is already completed",
                batch.id
            )));
        }

        // Output may have been deleted since the notice was issued
        let cumulative = self.cumulative_output(&batch.id);
        if !is_completion_eligible(cumulative, batch.target_quantity) {
            return Err(AppError::InvalidStateTransition(format!(
                "Batch {} is no longer eligible for completion ({} of {} kg)",
                batch.id, cumulative, batch.target_quantity
            )));
        }

        let actual_yield = format_yield(yield_percent(cumulative, batch.target_quantity));
        let completed_at = self.clock.now();
        let closed = self
            .planner
            .update_batch(&batch.id, |b| {
                b.transition(BatchStatus::Completed)
                    .map_err(|m| AppError::InvalidStateTransition(format!("{}: {} -> Completed", m, b.status)))?;
                b.actual_yield = Some(actual_yield.clone());
                b.completed_at = Some(completed_at);
                Ok(())
            })
            .await?;

        tracing::info!("Batch {} completed with yield {}%", closed.id, actual_yield);
        Ok(closed)
    }

    /// Delete a today-dated output entry and everything in its group
    pub async fn delete_output_entry(&self, entry_id: Uuid) -> AppResult<DeletionOutcome> {
        let Some(movement) = self.store.query(LedgerLog::FinishedGoods, |m| m.id == entry_id).next() else {
            tracing::debug!("Output entry {} already gone", entry_id);
            return Ok(DeletionOutcome::default());
        };

        ensure_mutable(&movement, self.clock.today())?;

        match movement.transaction_group_id {
            Some(group) => {
                let removed = self.store.remove_by_transaction_group(&[group]).await?;
                tracing::info!("Rolled back output {} and {} linked movement(s)", entry_id, removed.len().saturating_sub(1));
                Ok(DeletionOutcome {
                    removed,
                    rollback_warning: None,
                })
            }
            None => {
                let removed = self.store.remove(LedgerLog::FinishedGoods, entry_id).await?;
                let warning = RollbackIncompleteWarning {
                    movement_id: entry_id,
                    batch_id: movement.batch_id.clone(),
                    message: "Output entry had no transaction group; raw material consumption was not rolled back"
                        .to_string(),
                };
                tracing::warn!("{} ({})", warning.message, entry_id);
                Ok(DeletionOutcome {
                    removed,
                    rollback_warning: Some(warning),
                })
            }
        }
    }

    /// Total output recorded against `batch_id`
    pub fn cumulative_output(&self, batch_id: &str) -> Decimal {
        self.store
            .query(LedgerLog::FinishedGoods, |m| m.batch_id.as_deref() == Some(batch_id))
            .map(|m| m.quantity)
            .sum()
    }

    pub fn batch_progress(&self, batch_id: &str) -> AppResult<BatchProgress> {
        let batch = self
            .planner
            .batch(batch_id)
            .ok_or_else(|| AppError::NotFound(format!("Batch {}", batch_id)))?;
        let cumulative = self.cumulative_output(batch_id);

        Ok(BatchProgress {
            batch_id: batch.id,
            status: batch.status,
            target_quantity: batch.target_quantity,
            cumulative_output: cumulative,
            yield_percent: yield_percent(cumulative, batch.target_quantity),
            completion_eligible: batch.status != BatchStatus::Completed
                && is_completion_eligible(cumulative, batch.target_quantity),
        })
    }

    fn resolve_item(&self, name: &str) -> AppResult<Item> {
        self.catalog
            .find_item(name)
            .ok_or_else(|| AppError::NotFound(format!("Item '{}'", name.trim())))
    }

    fn open_batch(&self, batch_id: &str) -> AppResult<ProductionBatch> {
        let batch = self
            .planner
            .batch(batch_id)
            .ok_or_else(|| AppError::NotFound(format!("Batch {}", batch_id)))?;
        if batch.status.is_terminal() {
            return Err(AppError::InvalidStateTransition(format!(
                "Batch {} is completed and accepts no further output",
                batch.id
            )));
        }
        Ok(batch)
    }

    async fn start_production(&self, batch_id: &str, group: TransactionGroupId) -> AppResult<()> {
        let started = self
            .planner
            .update_batch(batch_id, |b| {
                b.transition(BatchStatus::InProduction)
                    .map_err(|m| AppError::InvalidStateTransition(m.to_string()))
            })
            .await;

        if let Err(e) = started {
            // Keep ledger and batch book consistent
            tracing::error!("Failed to start batch {}: {}; rolling back group {}", batch_id, e, group);
            self.store.remove_by_transaction_group(&[group]).await?;
            return Err(e);
        }
        Ok(())
    }

    fn completion_notice(&self, batch: &ProductionBatch) -> Option<CompletionEligibleNotice> {
        let cumulative = self.cumulative_output(&batch.id);
        if !is_completion_eligible(cumulative, batch.target_quantity) {
            return None;
        }

        let percent = yield_percent(cumulative, batch.target_quantity);
        let actual_yield = format_yield(percent);
        tracing::info!("Batch {} reached {}% of target", batch.id, actual_yield);

        Some(CompletionEligibleNotice {
            batch_id: batch.id.clone(),
            target_quantity: batch.target_quantity,
            cumulative_output: cumulative,
            yield_percent: percent,
            message: format!(
                "Batch {} has produced {} of {} kg ({}%). Mark it completed?",
                batch.id, cumulative, batch.target_quantity, actual_yield
            ),
            actual_yield,
        })
    }
}

/// Enforce the today-only rule for changes to an existing movement
pub fn ensure_mutable(movement: &Movement, today: NaiveDate) -> AppResult<()> {
    if !is_mutable_on(movement.date, today) {
        return Err(AppError::ImmutableRecord {
            movement_id: movement.id,
            date: movement.date,
        });
    }
    Ok(())
}
