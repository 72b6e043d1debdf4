//! Manual entry and reporting tests
//!
//! Tests for day-to-day bookkeeping including:
//! - Recording receipts, consumption and dispatch against the catalog
//! - Today-only amendments and deletes
//! - Daily totals, stock report and batch summaries

use std::str::FromStr;
use std::sync::Arc;

use agarbatti_ledger::catalog::{InMemoryCatalog, InMemoryFormulations};
use agarbatti_ledger::clock::FixedClock;
use agarbatti_ledger::error::ErrorKind;
use agarbatti_ledger::services::entries::RecordMovementInput;
use agarbatti_ledger::services::production::OutputEntry;
use agarbatti_ledger::storage::MemoryBackend;
use agarbatti_ledger::{AppError, LedgerEngine};
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use shared::{
    BatchStatus, DateRange, Formulation, Item, ItemCategory, LedgerLog, MovementKind, StockAlertLevel,
    DEFAULT_USAGE_WINDOW_DAYS,
};
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
}

fn items() -> Vec<Item> {
    vec![
        Item::new("Charcoal", ItemCategory::RawMaterial),
        Item::new("Jigat", ItemCategory::RawMaterial),
        Item::new("Raw Agarbatti", ItemCategory::FinishedGood),
        Item::new("Cutter Blade", ItemCategory::SparePart),
    ]
}

struct Fixture {
    engine: LedgerEngine,
    clock: Arc<FixedClock>,
    items: Vec<Item>,
}

async fn setup() -> Fixture {
    let clock = Arc::new(FixedClock::on(today()));
    let items = items();
    let engine = LedgerEngine::open(
        Arc::new(MemoryBackend::new()),
        clock.clone(),
        Arc::new(InMemoryCatalog::new(items.clone())),
        Arc::new(InMemoryFormulations::new()),
        DEFAULT_USAGE_WINDOW_DAYS,
    )
    .await
    .unwrap();

    Fixture { engine, clock, items }
}

fn input(name: &str, kind: MovementKind, qty: &str) -> RecordMovementInput {
    RecordMovementInput::new(name, kind, dec(qty))
}

// ============================================================================
// Entry Service
// ============================================================================

#[cfg(test)]
mod entry_tests {
    use super::*;

    #[tokio::test]
    async fn test_record_receipt_defaults() {
        let f = setup().await;

        let movement = f
            .engine
            .entries
            .record_movement(LedgerLog::Receipts, input(" charcoal", MovementKind::GoodsReceived, "50"))
            .await
            .unwrap();

        assert_eq!(movement.item_name, "Charcoal");
        assert_eq!(movement.item_id, Some(f.items[0].id));
        assert_eq!(movement.unit, "kg");
        assert_eq!(movement.date, today());
        assert!(movement.transaction_group_id.is_none());
    }

    #[tokio::test]
    async fn test_record_backdated_entry() {
        let f = setup().await;
        let earlier = today() - Duration::days(3);

        let movement = f
            .engine
            .entries
            .record_movement(
                LedgerLog::Dispatch,
                input("Raw Agarbatti", MovementKind::Dispatch, "5").on(earlier),
            )
            .await
            .unwrap();

        assert_eq!(movement.date, earlier);
    }

    #[tokio::test]
    async fn test_record_rejects_future_date() {
        let f = setup().await;

        let err = f
            .engine
            .entries
            .record_movement(
                LedgerLog::Receipts,
                input("Charcoal", MovementKind::GoodsReceived, "5").on(today() + Duration::days(1)),
            )
            .await
            .unwrap_err();

        assert_eq!(err.field(), Some("date"));
    }

    #[tokio::test]
    async fn test_record_rejects_unknown_item() {
        let f = setup().await;

        let err = f
            .engine
            .entries
            .record_movement(LedgerLog::Receipts, input("Camphor", MovementKind::GoodsReceived, "5"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Reference);
        assert!(f.engine.store.is_empty());
    }

    #[tokio::test]
    async fn test_record_rejects_protocol_kinds() {
        let f = setup().await;

        for kind in [MovementKind::ProductionOut, MovementKind::FinishedGoodsOutput] {
            let err = f
                .engine
                .entries
                .record_movement(kind.log(), input("Charcoal", kind, "5"))
                .await
                .unwrap_err();
            assert_eq!(err.field(), Some("kind"));
        }
    }

    #[tokio::test]
    async fn test_record_rejects_wrong_log() {
        let f = setup().await;

        let err = f
            .engine
            .entries
            .record_movement(LedgerLog::Receipts, input("Charcoal", MovementKind::Dispatch, "5"))
            .await
            .unwrap_err();

        assert_eq!(err.field(), Some("kind"));
    }

    #[tokio::test]
    async fn test_record_rejects_non_positive_quantity() {
        let f = setup().await;

        for qty in ["0", "-3"] {
            let err = f
                .engine
                .entries
                .record_movement(LedgerLog::Receipts, input("Charcoal", MovementKind::GoodsReceived, qty))
                .await
                .unwrap_err();
            assert_eq!(err.field(), Some("quantity"));
        }
    }

    #[tokio::test]
    async fn test_amend_todays_entry() {
        let f = setup().await;
        let original = f
            .engine
            .entries
            .record_movement(LedgerLog::Receipts, input("Charcoal", MovementKind::GoodsReceived, "50"))
            .await
            .unwrap();

        let amended = f
            .engine
            .entries
            .amend_quantity(LedgerLog::Receipts, original.id, dec("45"))
            .await
            .unwrap();

        assert_eq!(amended.quantity, dec("45"));
        assert_eq!(amended.item_id, original.item_id);
        assert_eq!(f.engine.store.len(LedgerLog::Receipts), 1);
        assert_eq!(f.engine.resolver.balance_of("Charcoal", None), dec("45"));
    }

    #[tokio::test]
    async fn test_amend_yesterdays_entry_is_rejected() {
        let f = setup().await;
        let original = f
            .engine
            .entries
            .record_movement(LedgerLog::Receipts, input("Charcoal", MovementKind::GoodsReceived, "50"))
            .await
            .unwrap();
        f.clock.advance_days(1);

        let err = f
            .engine
            .entries
            .amend_quantity(LedgerLog::Receipts, original.id, dec("45"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ImmutableRecord { .. }));
        assert_eq!(f.engine.resolver.balance_of("Charcoal", None), dec("50"));
    }

    #[tokio::test]
    async fn test_amend_unknown_entry() {
        let f = setup().await;

        let err = f
            .engine
            .entries
            .amend_quantity(LedgerLog::Receipts, Uuid::new_v4(), dec("1"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Reference);
    }

    #[tokio::test]
    async fn test_delete_todays_entry() {
        let f = setup().await;
        let movement = f
            .engine
            .entries
            .record_movement(LedgerLog::Consumption, input("Jigat", MovementKind::StoreConsumption, "5"))
            .await
            .unwrap();

        let outcome = f.engine.entries.delete_entry(LedgerLog::Consumption, movement.id).await.unwrap();

        assert_eq!(outcome.removed.len(), 1);
        assert!(f.engine.store.is_empty());

        let again = f.engine.entries.delete_entry(LedgerLog::Consumption, movement.id).await.unwrap();
        assert!(again.is_noop());
    }

    #[tokio::test]
    async fn test_delete_backdated_entry_is_rejected() {
        let f = setup().await;
        let movement = f
            .engine
            .entries
            .record_movement(
                LedgerLog::Receipts,
                input("Charcoal", MovementKind::GoodsReceived, "5").on(today() - Duration::days(1)),
            )
            .await
            .unwrap();

        let err = f
            .engine
            .entries
            .delete_entry(LedgerLog::Receipts, movement.id)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ImmutableRecord);
    }

    #[tokio::test]
    async fn test_delete_finished_goods_goes_through_protocol() {
        let f = setup().await;
        let recorded = f
            .engine
            .production
            .prepare_output(OutputEntry::new("Raw Agarbatti", dec("10"), today()))
            .unwrap();
        let recorded = f.engine.production.commit_output(recorded).await.unwrap();

        let err = f
            .engine
            .entries
            .delete_entry(LedgerLog::FinishedGoods, recorded.output.id)
            .await
            .unwrap_err();

        assert_eq!(err.field(), Some("log"));
        assert_eq!(f.engine.store.len(LedgerLog::FinishedGoods), 1);
    }

    #[tokio::test]
    async fn test_delete_grouped_consumption_removes_group() {
        let f = setup().await;
        let formulation = Formulation::new("Masala Base", "Raw Agarbatti")
            .with_ingredient("Charcoal", dec("0.5"))
            .with_ingredient("Jigat", dec("0.5"));
        let plan = f.engine.planner.calculate_plan(&formulation, dec("10"));
        f.engine.planner.commit_batch(&plan, "B-1").await.unwrap();

        let prepared = f
            .engine
            .production
            .prepare_output(OutputEntry::new("Raw Agarbatti", dec("10"), today()).for_batch("B-1"))
            .unwrap();
        let recorded = f.engine.production.commit_output(prepared).await.unwrap();

        let outcome = f
            .engine
            .entries
            .delete_entry(LedgerLog::Consumption, recorded.consumption[0].id)
            .await
            .unwrap();

        assert_eq!(outcome.removed.len(), 3);
        assert!(f.engine.store.is_empty());
    }

    #[tokio::test]
    async fn test_amend_grouped_entry_is_rejected() {
        let f = setup().await;
        let formulation = Formulation::new("Masala Base", "Raw Agarbatti").with_ingredient("Charcoal", dec("1"));
        let plan = f.engine.planner.calculate_plan(&formulation, dec("10"));
        f.engine.planner.commit_batch(&plan, "B-1").await.unwrap();
        let prepared = f
            .engine
            .production
            .prepare_output(OutputEntry::new("Raw Agarbatti", dec("10"), today()).for_batch("B-1"))
            .unwrap();
        let recorded = f.engine.production.commit_output(prepared).await.unwrap();

        let err = f
            .engine
            .entries
            .amend_quantity(LedgerLog::Consumption, recorded.consumption[0].id, dec("2"))
            .await
            .unwrap_err();

        assert_eq!(err.field(), Some("movement_id"));
    }
}

// ============================================================================
// Reporting
// ============================================================================

#[cfg(test)]
mod reporting_tests {
    use super::*;

    #[tokio::test]
    async fn test_daily_totals_zero_filled() {
        let f = setup().await;
        let two_days_ago = today() - Duration::days(2);
        for (qty, date) in [("10", two_days_ago), ("5", two_days_ago), ("7", today())] {
            f.engine
                .entries
                .record_movement(
                    LedgerLog::Receipts,
                    input("Charcoal", MovementKind::GoodsReceived, qty).on(date),
                )
                .await
                .unwrap();
        }

        let totals = f
            .engine
            .reporting
            .daily_totals(DateRange::new(two_days_ago, today()), MovementKind::GoodsReceived);

        let quantities: Vec<_> = totals.iter().map(|t| t.quantity).collect();
        assert_eq!(quantities, vec![dec("15"), Decimal::ZERO, dec("7")]);
        assert_eq!(totals[0].entries, 2);
        assert_eq!(totals[1].entries, 0);
    }

    #[tokio::test]
    async fn test_stock_report_follows_catalog() {
        let f = setup().await;
        f.engine
            .entries
            .record_movement(LedgerLog::Receipts, input("Jigat", MovementKind::GoodsReceived, "12"))
            .await
            .unwrap();

        let report = f.engine.reporting.stock_report(&f.items);

        assert_eq!(report.len(), 4);
        assert_eq!(report[0].item_name, "Charcoal");
        assert_eq!(report[0].position.level, StockAlertLevel::Critical);
        assert_eq!(report[1].position.balance, dec("12"));
        assert_eq!(report[3].category, ItemCategory::SparePart);
    }

    #[tokio::test]
    async fn test_batch_summaries_and_dashboard() {
        let f = setup().await;
        let formulation = Formulation::new("Masala Base", "Raw Agarbatti").with_ingredient("Charcoal", dec("1"));
        let plan = f.engine.planner.calculate_plan(&formulation, dec("80"));
        f.engine.planner.commit_batch(&plan, "B-1").await.unwrap();
        f.engine.planner.commit_batch(&plan, "B-2").await.unwrap();

        let prepared = f
            .engine
            .production
            .prepare_output(OutputEntry::new("Raw Agarbatti", dec("40"), today()).for_batch("B-1"))
            .unwrap();
        f.engine.production.commit_output(prepared).await.unwrap();

        let summaries = f.engine.reporting.batch_summaries();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].batch_id, "B-1");
        assert_eq!(summaries[0].status, BatchStatus::InProduction);
        assert_eq!(summaries[0].produced, dec("40"));
        assert_eq!(summaries[0].yield_percent, dec("50"));
        assert_eq!(summaries[1].produced, Decimal::ZERO);

        let metrics = f.engine.reporting.dashboard(&f.items, today());
        assert_eq!(metrics.open_batches, 2);
        assert_eq!(metrics.completed_batches, 0);
        assert_eq!(metrics.output_today, dec("40"));
        assert_eq!(metrics.dispatched_today, Decimal::ZERO);
        // Charcoal went negative, Jigat and the blade were never received
        assert_eq!(metrics.critical_items, 3);
    }
}
