//! Manual movement entries: receipts, store consumption, dispatch and spare parts

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{validate_entry_date, validate_quantity, LedgerLog, Movement, MovementKind, NewMovement, DEFAULT_UNIT};
use uuid::Uuid;

use crate::catalog::ItemCatalog;
use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::services::ledger::LedgerStore;
use crate::services::production::{ensure_mutable, DeletionOutcome};

/// Input for recording a manual movement
#[derive(Debug, Clone, Deserialize)]
pub struct RecordMovementInput {
    pub item_name: String,
    pub kind: MovementKind,
    pub quantity: Decimal,
    pub unit: Option<String>,
    pub date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl RecordMovementInput {
    pub fn new(item_name: impl Into<String>, kind: MovementKind, quantity: Decimal) -> Self {
        Self {
            item_name: item_name.into(),
            kind,
            quantity,
            unit: None,
            date: None,
            notes: None,
        }
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
}

pub struct EntryService {
    store: Arc<LedgerStore>,
    catalog: Arc<dyn ItemCatalog>,
    clock: Arc<dyn Clock>,
}

impl EntryService {
    pub fn new(store: Arc<LedgerStore>, catalog: Arc<dyn ItemCatalog>, clock: Arc<dyn Clock>) -> Self {
        Self { store, catalog, clock }
    }

    /// Record a manual movement in `log`
    pub async fn record_movement(&self, log: LedgerLog, input: RecordMovementInput) -> AppResult<Movement> {
        if matches!(input.kind, MovementKind::ProductionOut | MovementKind::FinishedGoodsOutput) {
            return Err(AppError::validation(
                "kind",
                "Production output and auto-deductions are recorded through the production protocol",
            ));
        }
        if !log.accepts(input.kind) {
            return Err(AppError::validation(
                "kind",
                format!("{} entries belong in the {} log, not {}", input.kind, input.kind.log(), log),
            ));
        }
        validate_quantity(input.quantity).map_err(|m| AppError::validation("quantity", m))?;

        let today = self.clock.today();
        let date = input.date.unwrap_or(today);
        validate_entry_date(date, today).map_err(|m| AppError::validation("date", m))?;

        let item = self
            .catalog
            .find_item(&input.item_name)
            .ok_or_else(|| AppError::NotFound(format!("Item '{}'", input.item_name.trim())))?;

        let mut movement = NewMovement::new(item.name.clone(), input.kind, input.quantity, date).with_item_id(item.id);
        movement.unit = input.unit.unwrap_or_else(|| DEFAULT_UNIT.to_string());
        movement.notes = input.notes;

        self.store.append(log, movement).await
    }

    /// Change the quantity of a today-dated manual entry
    pub async fn amend_quantity(&self, log: LedgerLog, movement_id: Uuid, quantity: Decimal) -> AppResult<Movement> {
        validate_quantity(quantity).map_err(|m| AppError::validation("quantity", m))?;

        let existing = self
            .store
            .query(log, |m| m.id == movement_id)
            .next()
            .ok_or_else(|| AppError::NotFound(format!("Movement {}", movement_id)))?;

        ensure_mutable(&existing, self.clock.today())?;

        if existing.transaction_group_id.is_some() {
            return Err(AppError::validation(
                "movement_id",
                "Grouped entries must be deleted and recorded again",
            ));
        }

        let replacement = NewMovement {
            item_id: existing.item_id,
            item_name: existing.item_name.clone(),
            kind: existing.kind,
            quantity,
            unit: existing.unit.clone(),
            date: existing.date,
            transaction_group_id: None,
            batch_id: existing.batch_id.clone(),
            notes: existing.notes.clone(),
        };

        let (_, amended) = self.store.replace(log, movement_id, replacement).await?;
        Ok(amended)
    }

    /// Delete a today-dated entry; grouped entries take their group with them
    pub async fn delete_entry(&self, log: LedgerLog, movement_id: Uuid) -> AppResult<DeletionOutcome> {
        if log == LedgerLog::FinishedGoods {
            return Err(AppError::validation(
                "log",
                "Finished goods output is deleted through the production protocol",
            ));
        }

        let Some(existing) = self.store.query(log, |m| m.id == movement_id).next() else {
            return Ok(DeletionOutcome::default());
        };

        ensure_mutable(&existing, self.clock.today())?;

        let removed = self.store.remove(log, movement_id).await?;

        Ok(DeletionOutcome {
            removed,
            rollback_warning: None,
        })
    }
}
