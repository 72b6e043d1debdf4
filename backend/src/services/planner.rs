//! Batch planner: material plans and committed production batches

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{
    build_material_plan, generate_batch_id, validate_formulation, validate_target_quantity, BatchStatus,
    Formulation, MaterialPlan, ProductionBatch,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::catalog::FormulationStore;
use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::services::stock::StockResolver;
use crate::storage::LedgerBackend;

pub struct BatchPlanner {
    resolver: StockResolver,
    formulations: Arc<dyn FormulationStore>,
    backend: Arc<dyn LedgerBackend>,
    clock: Arc<dyn Clock>,
    batches: RwLock<BTreeMap<String, ProductionBatch>>,
    writer: Mutex<()>,
}

/// Short view of a batch for listings
#[derive(Debug, Clone, Serialize)]
pub struct BatchListing {
    pub id: String,
    pub formulation_name: String,
    pub target_quantity: Decimal,
    pub status: BatchStatus,
}

impl BatchPlanner {
    pub async fn open(
        resolver: StockResolver,
        formulations: Arc<dyn FormulationStore>,
        backend: Arc<dyn LedgerBackend>,
        clock: Arc<dyn Clock>,
    ) -> AppResult<Self> {
        let loaded = backend.load_batches().await?;
        tracing::info!("Loaded {} production batches", loaded.len());

        let batches = loaded.into_iter().map(|b| (b.id.clone(), b)).collect();
        Ok(Self {
            resolver,
            formulations,
            backend,
            clock,
            batches: RwLock::new(batches),
            writer: Mutex::new(()),
        })
    }

    pub fn resolver(&self) -> &StockResolver {
        &self.resolver
    }

    /// Requirement and stock check per ingredient. Pure; safe to call on
    /// every keystroke while a target is being edited.
    pub fn calculate_plan(&self, formulation: &Formulation, target_quantity: Decimal) -> MaterialPlan {
        build_material_plan(formulation, target_quantity, |name| {
            self.resolver.balance_of(name, None)
        })
    }

    /// Fetch a formulation by id and plan it
    pub fn plan_for(&self, formulation_id: Uuid, target_quantity: Decimal) -> AppResult<MaterialPlan> {
        let formulation = self
            .formulations
            .get_formulation(formulation_id)
            .ok_or_else(|| AppError::NotFound(format!("Formulation {}", formulation_id)))?;

        validate_formulation(&formulation).map_err(|m| AppError::validation("formulation", m))?;

        let plan = self.calculate_plan(&formulation, target_quantity);
        tracing::debug!(
            "Planned {} x {}: {} shortage(s)",
            plan.formulation_name,
            target_quantity,
            plan.shortages().count()
        );
        Ok(plan)
    }

    /// Create a batch from a confirmed plan, freezing its requirements
    pub async fn commit_batch(&self, plan: &MaterialPlan, batch_id: &str) -> AppResult<ProductionBatch> {
        validate_target_quantity(plan.target_quantity).map_err(|m| AppError::validation("target_quantity", m))?;

        let batch_id = batch_id.trim();
        if batch_id.is_empty() {
            return Err(AppError::validation("batch_id", "Batch id is required"));
        }

        let _writer = self.writer.lock().await;

        if self.read().contains_key(batch_id) {
            return Err(AppError::DuplicateEntry(format!("batch {}", batch_id)));
        }

        let batch = ProductionBatch {
            id: batch_id.to_string(),
            formulation_id: plan.formulation_id,
            formulation_name: plan.formulation_name.clone(),
            output_item: plan.output_item.clone(),
            target_quantity: plan.target_quantity,
            status: BatchStatus::Planned,
            requirements: plan.frozen_requirements(),
            actual_yield: None,
            planned_on: self.clock.today(),
            created_at: self.clock.now(),
            completed_at: None,
        };
        self.commit(batch.clone()).await?;

        if !plan.is_feasible() {
            tracing::warn!(
                "Batch {} committed with {} ingredient shortage(s)",
                batch.id,
                plan.shortages().count()
            );
        }
        tracing::info!("Committed batch {} for {} {}", batch.id, batch.target_quantity, plan.output_unit);
        Ok(batch)
    }

    /// Next free id of the form `B-YYYYMMDD-NNN` for `date`
    pub fn next_batch_id(&self, date: NaiveDate) -> String {
        let batches = self.read();
        let mut sequence = 1;
        loop {
            let candidate = generate_batch_id(date, sequence);
            if !batches.contains_key(&candidate) {
                return candidate;
            }
            sequence += 1;
        }
    }

    pub fn batch(&self, batch_id: &str) -> Option<ProductionBatch> {
        self.read().get(batch_id).cloned()
    }

    /// Every batch, ordered by id
    pub fn batches(&self) -> Vec<ProductionBatch> {
        self.read().values().cloned().collect()
    }

    pub fn listings(&self) -> Vec<BatchListing> {
        self.read()
            .values()
            .map(|b| BatchListing {
                id: b.id.clone(),
                formulation_name: b.formulation_name.clone(),
                target_quantity: b.target_quantity,
                status: b.status,
            })
            .collect()
    }

    /// Apply `change` to one batch and persist it
    pub(crate) async fn update_batch<F>(&self, batch_id: &str, change: F) -> AppResult<ProductionBatch>
    where
        F: FnOnce(&mut ProductionBatch) -> AppResult<()>,
    {
        let _writer = self.writer.lock().await;

        let mut batch = self
            .batch(batch_id)
            .ok_or_else(|| AppError::NotFound(format!("Batch {}", batch_id)))?;
        change(&mut batch)?;

        self.commit(batch.clone()).await?;
        Ok(batch)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, ProductionBatch>> {
        self.batches.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Persist one batch, then publish it. Caller holds the writer lock.
    async fn commit(&self, batch: ProductionBatch) -> AppResult<()> {
        self.backend.save_batch(&batch).await?;
        self.batches
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(batch.id.clone(), batch);
        Ok(())
    }
}
