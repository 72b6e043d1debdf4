//! Reporting queries for dashboards and exports
//! Returns plain records; formatting belongs to the presentation layer

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{yield_percent, BatchStatus, DateRange, Item, ItemCategory, MovementKind, StockAlertLevel, StockPosition};

use crate::services::ledger::LedgerStore;
use crate::services::planner::BatchPlanner;
use crate::services::stock::StockResolver;

pub struct ReportingService {
    store: Arc<LedgerStore>,
    resolver: StockResolver,
    planner: Arc<BatchPlanner>,
}

/// Stock report row for one catalog item
#[derive(Debug, Clone, Serialize)]
pub struct StockReportRow {
    pub item_name: String,
    pub category: ItemCategory,
    pub position: StockPosition,
}

/// Quantity moved on one day for one kind
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub kind: MovementKind,
    pub quantity: Decimal,
    pub entries: usize,
}

/// Batch row for the production dashboard
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub batch_id: String,
    pub formulation_name: String,
    pub status: BatchStatus,
    pub target_quantity: Decimal,
    pub produced: Decimal,
    pub yield_percent: Decimal,
    pub actual_yield: Option<String>,
}

/// Dashboard headline numbers
#[derive(Debug, Clone, Serialize)]
pub struct DashboardMetrics {
    pub critical_items: usize,
    pub warning_items: usize,
    pub overstock_items: usize,
    pub open_batches: usize,
    pub completed_batches: usize,
    pub output_today: Decimal,
    pub dispatched_today: Decimal,
}

impl ReportingService {
    pub fn new(store: Arc<LedgerStore>, resolver: StockResolver, planner: Arc<BatchPlanner>) -> Self {
        Self { store, resolver, planner }
    }

    /// Position of every catalog item, in catalog order
    pub fn stock_report(&self, items: &[Item]) -> Vec<StockReportRow> {
        items
            .iter()
            .map(|item| StockReportRow {
                item_name: item.name.clone(),
                category: item.category.clone(),
                position: self.resolver.position(&item.name),
            })
            .collect()
    }

    /// Per-day totals of one movement kind over `range`, days without
    /// movements included as zero
    pub fn daily_totals(&self, range: DateRange, kind: MovementKind) -> Vec<DailyTotal> {
        let mut by_day: BTreeMap<NaiveDate, (Decimal, usize)> =
            range.days().map(|d| (d, (Decimal::ZERO, 0))).collect();

        for movement in self
            .store
            .query(kind.log(), |m| m.kind == kind && range.contains(m.date))
        {
            let slot = by_day.entry(movement.date).or_default();
            slot.0 += movement.quantity;
            slot.1 += 1;
        }

        by_day
            .into_iter()
            .map(|(date, (quantity, entries))| DailyTotal {
                date,
                kind,
                quantity,
                entries,
            })
            .collect()
    }

    pub fn batch_summaries(&self) -> Vec<BatchSummary> {
        let mut produced: BTreeMap<String, Decimal> = BTreeMap::new();
        for output in self
            .store
            .query(MovementKind::FinishedGoodsOutput.log(), |m| m.batch_id.is_some())
        {
            if let Some(batch_id) = output.batch_id {
                *produced.entry(batch_id).or_default() += output.quantity;
            }
        }

        self.planner
            .batches()
            .into_iter()
            .map(|b| {
                let total = produced.get(&b.id).copied().unwrap_or_default();
                BatchSummary {
                    yield_percent: yield_percent(total, b.target_quantity),
                    batch_id: b.id,
                    formulation_name: b.formulation_name,
                    status: b.status,
                    target_quantity: b.target_quantity,
                    produced: total,
                    actual_yield: b.actual_yield,
                }
            })
            .collect()
    }

    pub fn dashboard(&self, items: &[Item], today: NaiveDate) -> DashboardMetrics {
        let alerts = self.resolver.alerts(items.iter().map(|i| i.name.as_str()));
        let count = |level: StockAlertLevel| alerts.iter().filter(|p| p.level == level).count();

        let batches = self.planner.batches();
        let completed = batches.iter().filter(|b| b.status == BatchStatus::Completed).count();

        let day = DateRange::day(today);
        let sum_of = |kind: MovementKind| -> Decimal {
            self.daily_totals(day, kind).iter().map(|t| t.quantity).sum()
        };

        DashboardMetrics {
            critical_items: count(StockAlertLevel::Critical),
            warning_items: count(StockAlertLevel::Warning),
            overstock_items: count(StockAlertLevel::Overstock),
            open_batches: batches.len() - completed,
            completed_batches: completed,
            output_today: sum_of(MovementKind::FinishedGoodsOutput),
            dispatched_today: sum_of(MovementKind::Dispatch),
        }
    }
}
